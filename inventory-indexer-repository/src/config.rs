//! Configuration types for the IndexSynchronizer.

use std::collections::HashMap;

use crate::errors::IndexSyncError;

/// Prefix used when no environment is configured.
pub const DEFAULT_ENVIRONMENT_PREFIX: &str = "dev";

/// Number of records requested per record store page during a rebuild.
pub const DEFAULT_SCAN_PAGE_SIZE: usize = 500;

/// Configuration for the IndexSynchronizer.
///
/// Index names are resolved from an explicit binding of entity kind to base
/// table name, prefixed with the environment. The same prefixed name is used
/// for the record store table and the search index.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Deployment environment (e.g. "prod"). Unset or empty means "dev".
    pub environment: Option<String>,
    /// Entity kind to base table name.
    pub index_bindings: HashMap<String, String>,
    /// Records requested per page when scanning the record store.
    pub scan_page_size: usize,
    /// Maximum operations per bulk request during a rebuild.
    ///
    /// `None` submits the whole rebuild as a single bulk request.
    pub max_bulk_size: Option<usize>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        let mut index_bindings = HashMap::new();
        index_bindings.insert("inventory_item".to_string(), "vehicle_inventory".to_string());

        Self {
            environment: None,
            index_bindings,
            scan_page_size: DEFAULT_SCAN_PAGE_SIZE,
            max_bulk_size: None,
        }
    }
}

impl SyncConfig {
    /// Set the deployment environment.
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    /// Bind an entity kind to a base table name.
    pub fn with_binding(mut self, entity_kind: impl Into<String>, table: impl Into<String>) -> Self {
        self.index_bindings.insert(entity_kind.into(), table.into());
        self
    }

    /// Split rebuild bulk writes into chunks of at most `max_bulk_size` operations.
    pub fn with_max_bulk_size(mut self, max_bulk_size: usize) -> Self {
        self.max_bulk_size = Some(max_bulk_size);
        self
    }

    pub fn with_scan_page_size(mut self, scan_page_size: usize) -> Self {
        self.scan_page_size = scan_page_size;
        self
    }

    /// The environment prefix, `"dev"` when the environment is unset or empty.
    pub fn environment_prefix(&self) -> &str {
        match self.environment.as_deref() {
            Some(env) if !env.is_empty() => env,
            _ => DEFAULT_ENVIRONMENT_PREFIX,
        }
    }

    /// Prefix a base table name with the environment: `{prefix}_{table}`.
    pub fn prefixed_name(&self, table: &str) -> String {
        format!("{}_{}", self.environment_prefix(), table)
    }
}

/// Binding of an entity kind to its resolved index name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDescriptor {
    entity_kind: String,
    index_name: String,
}

impl IndexDescriptor {
    /// Resolve the index name for an entity kind.
    ///
    /// # Returns
    ///
    /// * `Ok(IndexDescriptor)` - The resolved binding
    /// * `Err(IndexSyncError::ConfigurationError)` - If the kind has no binding
    ///   or the binding is empty
    pub fn resolve(config: &SyncConfig, entity_kind: &str) -> Result<Self, IndexSyncError> {
        let table = config
            .index_bindings
            .get(entity_kind)
            .ok_or_else(|| {
                IndexSyncError::configuration(format!(
                    "No index binding configured for entity kind '{}'",
                    entity_kind
                ))
            })?;

        if table.trim().is_empty() {
            return Err(IndexSyncError::configuration(format!(
                "Index binding for entity kind '{}' is empty",
                entity_kind
            )));
        }

        Ok(Self {
            entity_kind: entity_kind.to_string(),
            index_name: config.prefixed_name(table),
        })
    }

    pub fn entity_kind(&self) -> &str {
        &self.entity_kind
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prefix_is_dev() {
        let config = SyncConfig::default();
        let descriptor = IndexDescriptor::resolve(&config, "inventory_item").unwrap();
        assert_eq!(descriptor.index_name(), "dev_vehicle_inventory");
        assert_eq!(descriptor.entity_kind(), "inventory_item");
    }

    #[test]
    fn test_empty_environment_falls_back_to_dev() {
        let config = SyncConfig::default().with_environment("");
        assert_eq!(config.environment_prefix(), "dev");
        assert_eq!(config.prefixed_name("vehicle_inventory"), "dev_vehicle_inventory");
    }

    #[test]
    fn test_environment_prefix() {
        let config = SyncConfig::default().with_environment("prod");
        let descriptor = IndexDescriptor::resolve(&config, "inventory_item").unwrap();
        assert_eq!(descriptor.index_name(), "prod_vehicle_inventory");
    }

    #[test]
    fn test_missing_binding_is_configuration_error() {
        let config = SyncConfig::default();
        let result = IndexDescriptor::resolve(&config, "dealer");
        assert!(matches!(
            result.unwrap_err(),
            IndexSyncError::ConfigurationError(_)
        ));
    }

    #[test]
    fn test_empty_binding_is_configuration_error() {
        let config = SyncConfig::default().with_binding("dealer", "  ");
        let result = IndexDescriptor::resolve(&config, "dealer");
        assert!(matches!(
            result.unwrap_err(),
            IndexSyncError::ConfigurationError(_)
        ));
    }

    #[test]
    fn test_custom_binding() {
        let config = SyncConfig::default()
            .with_environment("qa")
            .with_binding("dealer", "dealers");
        let descriptor = IndexDescriptor::resolve(&config, "dealer").unwrap();
        assert_eq!(descriptor.index_name(), "qa_dealers");
    }

    #[test]
    fn test_builders() {
        let config = SyncConfig::default()
            .with_max_bulk_size(250)
            .with_scan_page_size(100);
        assert_eq!(config.max_bulk_size, Some(250));
        assert_eq!(config.scan_page_size, 100);
    }
}
