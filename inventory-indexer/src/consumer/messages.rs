//! Message types for the consumer.
//!
//! Defines the messages that flow between the change feed and the orchestrator.

use serde_json::Value;

/// Position of a consumed message: topic, partition and offset.
pub type MessageOffset = (String, i32, i64);

/// Messages that flow through the ingest.
#[derive(Debug)]
pub enum StreamMessage {
    /// A batch of undecoded change records with associated offsets for
    /// acknowledgment. Offsets of messages that yielded no records are
    /// included so they are committed together with the batch.
    Records {
        records: Vec<Value>,
        offsets: Vec<MessageOffset>,
    },
    /// Acknowledgment that a batch was processed.
    Acknowledgment {
        offsets: Vec<MessageOffset>,
        success: bool,
        error: Option<String>,
    },
    /// Stream has ended.
    End,
    /// An error occurred.
    Error(String),
}
