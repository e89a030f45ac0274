//! Processor module for the inventory indexer ingest.
//!
//! Decodes change records and applies them to the search index, and rebuilds
//! the index on refresh triggers.

mod change_event_processor;
mod record_decoder;
mod refresh_processor;

pub use change_event_processor::{ChangeEventProcessor, EventBatchSummary, EventOutcome};
pub use record_decoder::{
    flatten_image, parse_change_payload, AttributeMap, AttributeValue, RawChangeRecord,
    StreamRecord,
};
pub use refresh_processor::{FullRefreshProcessor, RefreshSummary};
