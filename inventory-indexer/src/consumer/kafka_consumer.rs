//! Kafka change feed implementation.
//!
//! Consumes change records from a Kafka topic and forwards them to the ingest
//! in batches.

use async_trait::async_trait;
use rdkafka::{
    config::ClientConfig,
    consumer::{CommitMode, Consumer, StreamConsumer},
    message::{BorrowedMessage, Message as KafkaMessage},
    Offset, TopicPartitionList,
};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, instrument};

use crate::consumer::change_feed::ChangeFeed;
use crate::consumer::messages::{MessageOffset, StreamMessage};
use crate::errors::IngestError;
use crate::processor::parse_change_payload;

/// Default batch size for Kafka message batching.
const DEFAULT_BATCH_SIZE: usize = 50;

/// Default batch timeout in milliseconds.
const DEFAULT_BATCH_TIMEOUT_MS: u64 = 1000;

/// Messages consumed but not yet handed to the orchestrator.
///
/// Every consumed offset is held here, including messages that carried no
/// usable records. Offsets are only committed once the orchestrator has
/// acknowledged the batch they were sent in, so a commit never runs ahead of
/// records that are still unprocessed on the same partition.
#[derive(Debug, Default)]
struct PendingBatch {
    records: Vec<Value>,
    offsets: Vec<MessageOffset>,
}

impl PendingBatch {
    /// Add a consumed message and its parse result.
    fn accept(&mut self, offset: MessageOffset, parsed: Result<Option<Vec<Value>>, IngestError>) {
        match parsed {
            Ok(Some(records)) => {
                debug!(
                    topic = %offset.0,
                    partition = offset.1,
                    offset = offset.2,
                    record_count = records.len(),
                    "Received change records"
                );
                self.records.extend(records);
            }
            Ok(None) => {}
            Err(e) => {
                error!(
                    topic = %offset.0,
                    partition = offset.1,
                    offset = offset.2,
                    error = %e,
                    "Failed to parse change record message, skipping"
                );
            }
        }
        self.offsets.push(offset);
    }

    fn message_count(&self) -> usize {
        self.offsets.len()
    }

    fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    fn take(&mut self) -> Self {
        std::mem::take(self)
    }
}

/// Kafka change feed.
pub struct KafkaChangeFeed {
    consumer: StreamConsumer,
    topics: Vec<String>,
    batch_size: usize,
    batch_timeout: Duration,
}

impl KafkaChangeFeed {
    /// Create a new Kafka change feed.
    ///
    /// # Arguments
    ///
    /// * `brokers` - Kafka broker addresses (comma-separated)
    /// * `group_id` - Consumer group ID
    /// * `topic` - Topic carrying the change records
    ///
    /// # Returns
    ///
    /// * `Ok(KafkaChangeFeed)` - A new feed instance
    /// * `Err(IngestError)` - If consumer creation fails
    pub fn new(brokers: &str, group_id: &str, topic: &str) -> Result<Self, IngestError> {
        Self::with_batch_config(
            brokers,
            group_id,
            topic,
            DEFAULT_BATCH_SIZE,
            DEFAULT_BATCH_TIMEOUT_MS,
        )
    }

    /// Create a new Kafka change feed with custom batch configuration.
    ///
    /// # Arguments
    ///
    /// * `brokers` - Kafka broker addresses (comma-separated)
    /// * `group_id` - Consumer group ID
    /// * `topic` - Topic carrying the change records
    /// * `batch_size` - Number of messages to batch before sending
    /// * `batch_timeout_ms` - Maximum time to wait before flushing a partial batch (milliseconds)
    pub fn with_batch_config(
        brokers: &str,
        group_id: &str,
        topic: &str,
        batch_size: usize,
        batch_timeout_ms: u64,
    ) -> Result<Self, IngestError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("group.id", group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "6000")
            .create()
            .map_err(|e| IngestError::kafka(e.to_string()))?;

        info!(
            brokers = %brokers,
            group_id = %group_id,
            topic = %topic,
            batch_size = batch_size,
            batch_timeout_ms = batch_timeout_ms,
            "Created Kafka change feed with batching"
        );

        Ok(Self {
            consumer,
            topics: vec![topic.to_string()],
            batch_size: batch_size.max(1),
            batch_timeout: Duration::from_millis(batch_timeout_ms),
        })
    }

    /// Flush a batch of pending messages to the channel.
    async fn flush_batch(
        &self,
        batch: PendingBatch,
        sender: &mpsc::Sender<StreamMessage>,
    ) -> Result<(), IngestError> {
        if batch.is_empty() {
            return Ok(());
        }

        info!(
            record_count = batch.records.len(),
            message_count = batch.message_count(),
            "Sending batch of change records to processor"
        );
        sender
            .send(StreamMessage::Records {
                records: batch.records,
                offsets: batch.offsets,
            })
            .await
            .map_err(|e| IngestError::channel(e.to_string()))
    }

    /// Commit offsets for a batch of messages.
    fn commit_offsets(&self, offsets: &[MessageOffset]) -> Result<(), IngestError> {
        if offsets.is_empty() {
            return Ok(());
        }

        let mut tpl = TopicPartitionList::new();
        for (topic, partition, offset) in offsets {
            tpl.add_partition_offset(topic, *partition, Offset::Offset(offset + 1))
                .map_err(|e| IngestError::kafka(e.to_string()))?;
        }

        self.consumer
            .commit(&tpl, CommitMode::Async)
            .map_err(|e| IngestError::kafka(e.to_string()))?;

        Ok(())
    }

    /// Parse a Kafka message into change records.
    ///
    /// Returns `Ok(None)` for messages without a payload.
    fn parse_message(
        &self,
        msg: &BorrowedMessage<'_>,
    ) -> Result<Option<Vec<Value>>, IngestError> {
        let payload = match msg.payload() {
            Some(p) => p,
            None => {
                debug!("Received message with empty payload");
                return Ok(None);
            }
        };

        let records = parse_change_payload(payload)?;
        if records.is_empty() {
            return Ok(None);
        }
        Ok(Some(records))
    }
}

#[async_trait]
impl ChangeFeed for KafkaChangeFeed {
    /// Subscribe to configured topics.
    fn subscribe(&self) -> Result<(), IngestError> {
        let topics: Vec<&str> = self.topics.iter().map(|s| s.as_str()).collect();
        self.consumer
            .subscribe(&topics)
            .map_err(|e| IngestError::kafka(e.to_string()))?;

        info!(topics = ?self.topics, "Subscribed to Kafka topics");
        Ok(())
    }

    /// Start consuming messages and send them through the channel.
    ///
    /// Messages are batched before being sent. Offsets are committed only
    /// after the orchestrator acknowledges the batch.
    #[instrument(skip(self, sender, ack_receiver, shutdown))]
    async fn run(
        &self,
        sender: mpsc::Sender<StreamMessage>,
        mut ack_receiver: mpsc::Receiver<StreamMessage>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), IngestError> {
        use futures::StreamExt;

        let mut message_stream = self.consumer.stream();
        let mut pending = PendingBatch::default();
        let mut flush_timer = tokio::time::interval(self.batch_timeout);
        flush_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // Skip the first tick immediately
        flush_timer.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Change feed received shutdown signal");
                    // Pending messages are not committed and will be re-read on restart
                    let _ = sender.send(StreamMessage::End).await;
                    break;
                }
                ack_msg = ack_receiver.recv() => {
                    match ack_msg {
                        Some(StreamMessage::Acknowledgment { offsets, success, error }) => {
                            if success {
                                if let Err(e) = self.commit_offsets(&offsets) {
                                    error!(error = %e, "Failed to commit offsets after acknowledgment");
                                } else {
                                    debug!(offset_count = offsets.len(), "Committed offsets after processing");
                                }
                            } else {
                                error!(
                                    offset_count = offsets.len(),
                                    error = error.as_deref().unwrap_or("Unknown error"),
                                    "Not committing offsets due to processing failure"
                                );
                            }
                        }
                        Some(StreamMessage::End) | None => {
                            info!("Acknowledgment channel closed");
                            break;
                        }
                        _ => {}
                    }
                }
                message = message_stream.next() => {
                    match message {
                        Some(Ok(msg)) => {
                            let offset: MessageOffset = (msg.topic().to_string(), msg.partition(), msg.offset());
                            pending.accept(offset, self.parse_message(&msg));

                            if pending.message_count() >= self.batch_size {
                                self.flush_batch(pending.take(), &sender).await?;
                            }
                        }
                        Some(Err(e)) => {
                            error!(error = %e, "Kafka error");
                            let _ = sender.send(StreamMessage::Error(e.to_string())).await;
                        }
                        None => {
                            info!("Kafka stream ended");
                            self.flush_batch(pending.take(), &sender).await?;
                            let _ = sender.send(StreamMessage::End).await;
                            break;
                        }
                    }
                }
                _ = flush_timer.tick() => {
                    if !pending.is_empty() {
                        debug!(count = pending.message_count(), "Flushing batch due to timeout");
                        self.flush_batch(pending.take(), &sender).await?;
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert_eq!(DEFAULT_BATCH_SIZE, 50);
        assert_eq!(DEFAULT_BATCH_TIMEOUT_MS, 1000);
    }

    fn offset(n: i64) -> MessageOffset {
        ("inventory.changes".to_string(), 0, n)
    }

    #[tokio::test]
    async fn test_flush_batch_sends_records() {
        let feed = KafkaChangeFeed::new("localhost:9092", "test-group", "inventory.changes").unwrap();
        let (sender, mut receiver) = mpsc::channel(1);
        let mut batch = PendingBatch::default();
        batch.accept(
            offset(7),
            parse_change_payload(
                br#"{"eventName": "REMOVE", "dynamodb": {"Keys": {"vin": {"S": "VIN1"}}}}"#,
            )
            .map(Some),
        );

        feed.flush_batch(batch, &sender).await.unwrap();

        match receiver.recv().await {
            Some(StreamMessage::Records { records, offsets }) => {
                assert_eq!(records.len(), 1);
                assert_eq!(offsets, vec![offset(7)]);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_skipped_messages_wait_for_the_batch_acknowledgment() {
        let mut batch = PendingBatch::default();

        batch.accept(
            offset(10),
            parse_change_payload(
                br#"{"eventName": "REMOVE", "dynamodb": {"Keys": {"vin": {"S": "VIN1"}}}}"#,
            )
            .map(Some),
        );
        batch.accept(offset(11), parse_change_payload(b"not json").map(Some));
        batch.accept(offset(12), Ok(None));

        // Unparseable and empty messages keep their offsets in the batch
        assert_eq!(batch.message_count(), 3);
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.offsets, vec![offset(10), offset(11), offset(12)]);

        let taken = batch.take();
        assert_eq!(taken.message_count(), 3);
        assert!(batch.is_empty());
    }

    #[tokio::test]
    async fn test_batch_of_only_skipped_messages_is_still_sent() {
        let feed = KafkaChangeFeed::new("localhost:9092", "test-group", "inventory.changes").unwrap();
        let (sender, mut receiver) = mpsc::channel(1);
        let mut batch = PendingBatch::default();
        batch.accept(offset(3), parse_change_payload(b"[]").map(Some));

        feed.flush_batch(batch, &sender).await.unwrap();

        match receiver.recv().await {
            Some(StreamMessage::Records { records, offsets }) => {
                assert!(records.is_empty());
                assert_eq!(offsets, vec![offset(3)]);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_flush_empty_batch_sends_nothing() {
        let feed = KafkaChangeFeed::new("localhost:9092", "test-group", "inventory.changes").unwrap();
        let (sender, mut receiver) = mpsc::channel(1);

        feed.flush_batch(PendingBatch::default(), &sender).await.unwrap();
        drop(sender);

        assert!(receiver.recv().await.is_none());
    }
}
