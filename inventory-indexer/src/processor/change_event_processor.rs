//! Change event processor implementation.
//!
//! Applies change events from the record store's change feed to the search
//! index, one synchronizer call per event.

use std::sync::Arc;

use inventory_indexer_repository::{IndexSyncError, IndexSynchronizer, ItemResponse};
use inventory_indexer_shared::{ChangeEvent, ChangeOperation, IndexedEntity};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::processor::RawChangeRecord;

/// Result of applying a single change event.
#[derive(Debug, Clone)]
pub struct EventOutcome {
    /// The operation, `None` when the record named an unknown operation.
    pub operation: Option<ChangeOperation>,
    /// The document identifier, empty when it could not be determined.
    pub identifier: String,
    pub result: Result<ItemResponse, IndexSyncError>,
}

impl EventOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Outcomes of a batch of change events, in input order.
#[derive(Debug, Clone, Default)]
pub struct EventBatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub outcomes: Vec<EventOutcome>,
}

impl EventBatchSummary {
    pub fn from_outcomes(outcomes: Vec<EventOutcome>) -> Self {
        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        Self {
            total: outcomes.len(),
            succeeded,
            failed: outcomes.len() - succeeded,
            outcomes,
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &EventOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }
}

/// Processor that dispatches change events to the index synchronizer.
///
/// - Insert events index the new snapshot
/// - Modify events replace the indexed document with the new snapshot
/// - Remove events delete the document, succeeding if it is already gone
///
/// Every event in a batch is attempted. A failure is recorded in the event's
/// outcome and processing moves on to the next event.
pub struct ChangeEventProcessor<E: IndexedEntity> {
    synchronizer: Arc<IndexSynchronizer<E>>,
}

impl<E: IndexedEntity> ChangeEventProcessor<E> {
    pub fn new(synchronizer: Arc<IndexSynchronizer<E>>) -> Self {
        Self { synchronizer }
    }

    /// Decode and apply a batch of undecoded change records.
    ///
    /// Each record is decoded on its own, so a malformed record yields a
    /// failed outcome without affecting its neighbours.
    #[instrument(skip(self, records), fields(record_count = records.len()))]
    pub async fn process_records(&self, records: Vec<Value>) -> EventBatchSummary {
        let mut outcomes = Vec::with_capacity(records.len());

        for value in records {
            let outcome = match RawChangeRecord::from_value(value.clone()) {
                Ok(record) => match record.decode::<E>() {
                    Ok(event) => self.process_event(event).await,
                    Err(e) => EventOutcome {
                        operation: record.operation().ok(),
                        identifier: record.identifier_hint(E::ID_ATTRIBUTE),
                        result: Err(e),
                    },
                },
                Err(e) => {
                    let (operation, identifier) =
                        RawChangeRecord::describe_undecoded(&value, E::ID_ATTRIBUTE);
                    EventOutcome {
                        operation,
                        identifier,
                        result: Err(e),
                    }
                }
            };
            outcomes.push(outcome);
        }

        self.summarize(outcomes)
    }

    /// Apply a batch of already decoded change events.
    #[instrument(skip(self, events), fields(event_count = events.len()))]
    pub async fn process_events(&self, events: Vec<ChangeEvent<E>>) -> EventBatchSummary {
        let mut outcomes = Vec::with_capacity(events.len());
        for event in events {
            outcomes.push(self.process_event(event).await);
        }
        self.summarize(outcomes)
    }

    /// Apply a single change event.
    pub async fn process_event(&self, event: ChangeEvent<E>) -> EventOutcome {
        let ChangeEvent {
            operation,
            entity,
            identifier,
        } = event;

        let result = match (operation, entity) {
            (ChangeOperation::Insert, Some(entity)) => self.synchronizer.insert(&entity).await,
            (ChangeOperation::Modify, Some(entity)) => {
                self.synchronizer
                    .update(&entity, &entity.document_id())
                    .await
            }
            (ChangeOperation::Remove, _) => self.synchronizer.delete(&identifier).await,
            (_, None) => Err(IndexSyncError::validation(format!(
                "{} event for '{}' carries no entity",
                operation, identifier
            ))),
        };

        EventOutcome {
            operation: Some(operation),
            identifier,
            result,
        }
    }

    fn summarize(&self, outcomes: Vec<EventOutcome>) -> EventBatchSummary {
        let summary = EventBatchSummary::from_outcomes(outcomes);

        for failure in summary.failures() {
            if let Err(e) = &failure.result {
                warn!(
                    identifier = %failure.identifier,
                    operation = ?failure.operation,
                    kind = e.kind(),
                    error = %e,
                    "Change event failed"
                );
            }
        }

        debug!(
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Processed change event batch"
        );
        summary
    }
}
