//! Utility functions for the inventory indexer repository.

use crate::errors::IndexSyncError;

/// Validate that a document identifier is usable as a search index ID.
///
/// # Arguments
///
/// * `id` - The document identifier
///
/// # Returns
///
/// * `Ok(())` - If the identifier is non-empty
/// * `Err(IndexSyncError)` - If the identifier is empty or only whitespace
///
/// # Example
///
/// ```
/// use inventory_indexer_repository::validate_document_id;
///
/// assert!(validate_document_id("1HGCM82633A004352").is_ok());
/// assert!(validate_document_id("").is_err());
/// ```
pub fn validate_document_id(id: &str) -> Result<(), IndexSyncError> {
    if id.trim().is_empty() {
        return Err(IndexSyncError::validation(
            "Document identifier must not be empty",
        ));
    }
    Ok(())
}

/// Validate a SQL table name before it is interpolated into a query.
///
/// Table names must start with a letter or underscore and contain only ASCII
/// alphanumeric characters and underscores.
pub fn validate_table_name(table: &str) -> Result<(), IndexSyncError> {
    let mut chars = table.chars();
    let valid_start = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);

    if !valid_start || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(IndexSyncError::configuration(format!(
            "Table name '{}' contains invalid characters. Only alphanumeric characters and underscores are allowed",
            table
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_document_id() {
        assert!(validate_document_id("VIN123").is_ok());
        assert!(matches!(
            validate_document_id("").unwrap_err(),
            IndexSyncError::ValidationError(_)
        ));
        assert!(matches!(
            validate_document_id("   ").unwrap_err(),
            IndexSyncError::ValidationError(_)
        ));
    }

    #[test]
    fn test_validate_table_name_valid() {
        for table in ["dev_vehicle_inventory", "_private", "Inventory2"] {
            assert!(validate_table_name(table).is_ok(), "{} should be valid", table);
        }
    }

    #[test]
    fn test_validate_table_name_invalid() {
        let test_cases = vec![
            ("", "empty"),
            ("2fast", "starts with digit"),
            ("dev-vehicle", "contains dash"),
            ("dev.vehicle", "contains dot"),
            ("dev vehicle", "contains space"),
            ("inventory;drop", "contains semicolon"),
            ("inventory\"", "contains quote"),
        ];

        for (table, description) in test_cases {
            let result = validate_table_name(table);
            assert!(
                matches!(result, Err(IndexSyncError::ConfigurationError(_))),
                "Expected ConfigurationError for '{}' ({})",
                table,
                description
            );
        }
    }
}
