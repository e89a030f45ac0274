//! Change feed trait definition.

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};

use crate::consumer::messages::StreamMessage;
use crate::errors::IngestError;

/// A source of change record batches.
///
/// The orchestrator subscribes the feed, then runs it in a background task.
/// The feed sends `StreamMessage::Records` batches on `sender` and receives
/// `StreamMessage::Acknowledgment`s on `ack_receiver` once each batch has
/// been processed. It sends `StreamMessage::End` when it stops.
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// Subscribe to the underlying source.
    fn subscribe(&self) -> Result<(), IngestError>;

    /// Deliver batches until the source ends or shutdown is signalled.
    async fn run(
        &self,
        sender: mpsc::Sender<StreamMessage>,
        ack_receiver: mpsc::Receiver<StreamMessage>,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), IngestError>;
}
