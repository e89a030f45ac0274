//! Consumer module for the inventory indexer ingest.
//!
//! Provides the change feed abstraction and its Kafka implementation.

mod change_feed;
mod kafka_consumer;
mod messages;

pub use change_feed::ChangeFeed;
pub use kafka_consumer::KafkaChangeFeed;
pub use messages::{MessageOffset, StreamMessage};
