//! Index synchronization error types.
//!
//! This module defines the unified error type for all store and synchronizer
//! operations, including both low-level backend errors and high-level
//! lifecycle errors.

use std::fmt;

use thiserror::Error;

/// Index-level operation that the document store can reject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOperation {
    Create,
    Delete,
}

impl fmt::Display for IndexOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexOperation::Create => f.write_str("create"),
            IndexOperation::Delete => f.write_str("delete"),
        }
    }
}

/// Phase of a full rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildPhase {
    /// Dropping the existing index.
    Delete,
    /// Creating the fresh index.
    Create,
    /// Paging through the record store.
    Scan,
    /// Submitting the bulk write.
    Bulk,
}

impl fmt::Display for RebuildPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RebuildPhase::Delete => "delete",
            RebuildPhase::Create => "create",
            RebuildPhase::Scan => "scan",
            RebuildPhase::Bulk => "bulk",
        };
        f.write_str(name)
    }
}

/// Unified errors from index synchronization.
///
/// Used by the `DocumentStore` and `RecordStore` traits and by the
/// `IndexSynchronizer`. Per-item bulk write failures are not errors: they are
/// collected into the `BulkResponse` so the batch completes.
#[derive(Debug, Clone, Error)]
pub enum IndexSyncError {
    /// The index name could not be resolved from configuration.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// The document store reported an index create or delete as invalid.
    #[error("Index provisioning error: could not {operation} index: {diagnostic}")]
    IndexProvisioningError {
        operation: IndexOperation,
        diagnostic: String,
    },

    /// A rebuild failed; `phase` names the step that failed.
    #[error("Rebuild failed during {phase} phase: {source}")]
    RebuildError {
        phase: RebuildPhase,
        source: Box<IndexSyncError>,
    },

    /// Transient I/O failure talking to a store.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// The referenced document or record does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input, or a document write the store rejected.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Failed to serialize or deserialize an entity.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Failed to parse a response from a store.
    #[error("Parse error: {0}")]
    ParseError(String),
}

impl IndexSyncError {
    /// Create a configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::ConfigurationError(msg.into())
    }

    /// Create an index provisioning error.
    pub fn index_provisioning(operation: IndexOperation, diagnostic: impl Into<String>) -> Self {
        Self::IndexProvisioningError {
            operation,
            diagnostic: diagnostic.into(),
        }
    }

    /// Create a store unavailable error.
    pub fn store_unavailable(msg: impl Into<String>) -> Self {
        Self::StoreUnavailable(msg.into())
    }

    /// Create a not found error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    /// Create a serialization error.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::SerializationError(msg.into())
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Attribute this error to a rebuild phase.
    pub fn during(self, phase: RebuildPhase) -> Self {
        Self::RebuildError {
            phase,
            source: Box::new(self),
        }
    }

    /// The underlying error, looking through rebuild phase wrappers.
    pub fn root(&self) -> &IndexSyncError {
        match self {
            Self::RebuildError { source, .. } => source.root(),
            other => other,
        }
    }

    /// Short machine-friendly name of the failure kind, used in reports and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConfigurationError(_) => "configuration",
            Self::IndexProvisioningError { .. } => "index_provisioning",
            Self::RebuildError { .. } => "rebuild",
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::NotFound(_) => "not_found",
            Self::ValidationError(_) => "validation",
            Self::SerializationError(_) => "serialization",
            Self::ParseError(_) => "parse",
        }
    }
}

impl From<serde_json::Error> for IndexSyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rebuild_error_reports_phase_and_diagnostic() {
        let err = IndexSyncError::index_provisioning(IndexOperation::Delete, "index locked")
            .during(RebuildPhase::Delete);

        assert_eq!(
            err.to_string(),
            "Rebuild failed during delete phase: Index provisioning error: could not delete index: index locked"
        );
        assert!(matches!(
            err.root(),
            IndexSyncError::IndexProvisioningError {
                operation: IndexOperation::Delete,
                ..
            }
        ));
    }

    #[test]
    fn test_root_of_plain_error_is_itself() {
        let err = IndexSyncError::not_found("VIN123");
        assert!(matches!(err.root(), IndexSyncError::NotFound(_)));
    }

    #[test]
    fn test_kind() {
        assert_eq!(IndexSyncError::validation("x").kind(), "validation");
        assert_eq!(IndexSyncError::not_found("x").kind(), "not_found");
        assert_eq!(
            IndexSyncError::store_unavailable("x").kind(),
            "store_unavailable"
        );
        assert_eq!(
            IndexSyncError::parse("x").during(RebuildPhase::Bulk).kind(),
            "rebuild"
        );
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: IndexSyncError = json_err.into();
        assert!(matches!(err, IndexSyncError::SerializationError(_)));
    }
}
