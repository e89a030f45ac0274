//! Full refresh processor implementation.
//!
//! Rebuilds the search index from the record store when triggered by the
//! refresh schedule.

use std::fmt;
use std::sync::Arc;

use inventory_indexer_repository::{BulkResponse, IndexSyncError, IndexSynchronizer};
use inventory_indexer_shared::IndexedEntity;
use tracing::{error, info, instrument, warn};

/// Summary of a full refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshSummary {
    /// Number of items submitted to the index.
    pub total: usize,
    /// Number of items the index rejected.
    pub failed: usize,
    /// Whether the bulk response reported any per-item error.
    pub errors: bool,
    /// Identifiers of the rejected items.
    pub failed_ids: Vec<String>,
}

impl RefreshSummary {
    pub fn from_bulk_response(response: &BulkResponse) -> Self {
        let failed_ids: Vec<String> = response.failed_items().map(|i| i.id.clone()).collect();
        Self {
            total: response.items.len(),
            failed: failed_ids.len(),
            errors: response.errors || !failed_ids.is_empty(),
            failed_ids,
        }
    }

    pub fn succeeded(&self) -> usize {
        self.total - self.failed
    }

    pub fn is_success(&self) -> bool {
        !self.errors
    }
}

impl fmt::Display for RefreshSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors {
            write!(
                f,
                "{} of {} items failed to index",
                self.failed, self.total
            )
        } else {
            write!(f, "{} items have been indexed", self.total)
        }
    }
}

/// Processor that rebuilds the index on each refresh trigger.
///
/// There is no partial retry: items rejected during the rebuild stay out of
/// the index until the next refresh or a change event touches them.
pub struct FullRefreshProcessor<E: IndexedEntity> {
    synchronizer: Arc<IndexSynchronizer<E>>,
}

impl<E: IndexedEntity> FullRefreshProcessor<E> {
    pub fn new(synchronizer: Arc<IndexSynchronizer<E>>) -> Self {
        Self { synchronizer }
    }

    /// Rebuild the index and summarize the result.
    ///
    /// # Returns
    ///
    /// * `Ok(RefreshSummary)` - The rebuild ran to completion, possibly with
    ///   per-item failures
    /// * `Err(IndexSyncError::RebuildError)` - A rebuild phase failed
    #[instrument(skip(self), fields(index = %self.synchronizer.index_name()))]
    pub async fn refresh(&self) -> Result<RefreshSummary, IndexSyncError> {
        let response = self.synchronizer.rebuild().await.map_err(|e| {
            error!(error = %e, kind = e.kind(), "Full refresh failed");
            e
        })?;

        let summary = RefreshSummary::from_bulk_response(&response);
        if summary.errors {
            warn!(
                total = summary.total,
                failed = summary.failed,
                failed_ids = ?summary.failed_ids,
                "Full refresh completed with errors"
            );
        } else {
            info!(total = summary.total, "Full refresh completed");
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inventory_indexer_repository::{
        InMemoryDocumentStore, InMemoryRecordStore, ItemResponse, RebuildPhase, SyncConfig,
        WriteOutcome,
    };
    use inventory_indexer_shared::InventoryItem;
    use serde_json::json;

    fn refresh_processor(
        records: Vec<InventoryItem>,
    ) -> (
        Arc<InMemoryDocumentStore>,
        Arc<InMemoryRecordStore<InventoryItem>>,
        FullRefreshProcessor<InventoryItem>,
    ) {
        let documents = Arc::new(InMemoryDocumentStore::new());
        let store = Arc::new(InMemoryRecordStore::with_records(records));
        let synchronizer = Arc::new(
            IndexSynchronizer::new(documents.clone(), store.clone(), SyncConfig::default())
                .unwrap(),
        );
        (documents, store, FullRefreshProcessor::new(synchronizer))
    }

    #[test]
    fn test_summary_display_success() {
        let response = BulkResponse::from_items(vec![
            ItemResponse::success("VIN1", WriteOutcome::Created),
            ItemResponse::success("VIN2", WriteOutcome::Created),
        ]);

        let summary = RefreshSummary::from_bulk_response(&response);

        assert!(summary.is_success());
        assert_eq!(summary.succeeded(), 2);
        assert_eq!(summary.to_string(), "2 items have been indexed");
    }

    #[test]
    fn test_summary_display_never_hides_errors() {
        let response = BulkResponse::from_items(vec![
            ItemResponse::success("VIN1", WriteOutcome::Created),
            ItemResponse::failure("VIN2", "mapper_parsing_exception"),
        ]);

        let summary = RefreshSummary::from_bulk_response(&response);

        assert!(!summary.is_success());
        assert_eq!(summary.failed_ids, vec!["VIN2".to_string()]);
        assert_eq!(summary.to_string(), "1 of 2 items failed to index");
    }

    #[test]
    fn test_summary_of_empty_rebuild() {
        let summary = RefreshSummary::from_bulk_response(&BulkResponse::empty());
        assert!(summary.is_success());
        assert_eq!(summary.to_string(), "0 items have been indexed");
    }

    #[tokio::test]
    async fn test_refresh_indexes_every_record() {
        let records = vec![
            InventoryItem::new("client-1", "VIN1").with_doors(4),
            InventoryItem::new("client-1", "VIN2").with_doors(2),
        ];
        let (documents, _, processor) = refresh_processor(records);

        let summary = processor.refresh().await.unwrap();

        assert_eq!(summary.total, 2);
        assert!(summary.is_success());
        assert_eq!(
            documents.document_ids("dev_vehicle_inventory").await,
            vec!["VIN1".to_string(), "VIN2".to_string()]
        );
    }

    #[tokio::test]
    async fn test_refresh_reports_rejected_items() {
        let records = vec![
            InventoryItem::new("client-1", "VIN1").with_doors(4),
            InventoryItem::new("client-1", "VIN2").with_doors(2),
        ];
        let (documents, _, processor) = refresh_processor(records);
        documents
            .reject_documents_where(|_, doc| {
                (doc["doors"] == json!(2)).then(|| "rejected".to_string())
            })
            .await;

        let summary = processor.refresh().await.unwrap();

        assert!(summary.errors);
        assert_eq!(summary.failed_ids, vec!["VIN2".to_string()]);
    }

    #[tokio::test]
    async fn test_refresh_propagates_phase_failure() {
        let (_, store, processor) = refresh_processor(vec![]);
        store.set_unavailable(true).await;

        let err = processor.refresh().await.unwrap_err();

        assert!(matches!(
            err,
            IndexSyncError::RebuildError {
                phase: RebuildPhase::Scan,
                ..
            }
        ));
    }
}
