//! Orchestrator module for the inventory indexer ingest.
//!
//! Coordinates the change feed, the change event processor, and the full
//! refresh processor.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, interval_at, Duration, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

use inventory_indexer_shared::IndexedEntity;

use crate::consumer::{ChangeFeed, StreamMessage};
use crate::errors::IngestError;
use crate::processor::{ChangeEventProcessor, FullRefreshProcessor, RefreshSummary};

/// Configuration for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Size of the message channel buffer.
    pub channel_buffer_size: usize,
    /// Period of the full refresh, `None` disables it.
    pub refresh_interval: Option<Duration>,
    /// Run a full refresh before consuming the change feed.
    pub refresh_on_startup: bool,
    /// Period of the progress log line.
    pub progress_interval: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            channel_buffer_size: 1000,
            refresh_interval: None,
            refresh_on_startup: false,
            progress_interval: Duration::from_secs(10),
        }
    }
}

/// Counters accumulated since startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrchestratorStats {
    pub events_processed: u64,
    pub events_failed: u64,
    pub refreshes_completed: u64,
    pub refreshes_failed: u64,
}

/// Orchestrator that coordinates the ingest components.
///
/// The orchestrator:
/// - Runs the change feed in a background task
/// - Applies each batch of change records and acknowledges it
/// - Fires the full refresh on its interval
/// - Handles shutdown signals
pub struct Orchestrator<E: IndexedEntity> {
    feed: Arc<dyn ChangeFeed>,
    change_processor: ChangeEventProcessor<E>,
    refresh_processor: FullRefreshProcessor<E>,
    config: OrchestratorConfig,
    shutdown_tx: broadcast::Sender<()>,
    events_processed: AtomicU64,
    events_failed: AtomicU64,
    refreshes_completed: AtomicU64,
    refreshes_failed: AtomicU64,
}

impl<E: IndexedEntity> Orchestrator<E> {
    /// Create a new orchestrator with the given components.
    pub fn new(
        feed: Arc<dyn ChangeFeed>,
        change_processor: ChangeEventProcessor<E>,
        refresh_processor: FullRefreshProcessor<E>,
    ) -> Self {
        Self::with_config(
            feed,
            change_processor,
            refresh_processor,
            OrchestratorConfig::default(),
        )
    }

    /// Create a new orchestrator with custom configuration.
    pub fn with_config(
        feed: Arc<dyn ChangeFeed>,
        change_processor: ChangeEventProcessor<E>,
        refresh_processor: FullRefreshProcessor<E>,
        config: OrchestratorConfig,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            feed,
            change_processor,
            refresh_processor,
            config,
            shutdown_tx,
            events_processed: AtomicU64::new(0),
            events_failed: AtomicU64::new(0),
            refreshes_completed: AtomicU64::new(0),
            refreshes_failed: AtomicU64::new(0),
        }
    }

    /// Run the orchestrator.
    ///
    /// Starts the change feed and processes batches until the feed ends, a
    /// shutdown is triggered, or ctrl-c is received.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<(), IngestError> {
        info!("Starting inventory indexer orchestrator");

        self.feed.subscribe()?;

        if self.config.refresh_on_startup {
            self.run_refresh().await;
        }

        let (record_transmitter, mut record_receiver) =
            mpsc::channel::<StreamMessage>(self.config.channel_buffer_size);
        let (ack_transmitter, ack_receiver) =
            mpsc::channel::<StreamMessage>(self.config.channel_buffer_size);

        let feed = Arc::clone(&self.feed);
        let shutdown_rx = self.shutdown_tx.subscribe();
        let feed_handle = tokio::spawn(async move {
            if let Err(e) = feed.run(record_transmitter, ack_receiver, shutdown_rx).await {
                error!(error = %e, "Change feed error");
            }
        });

        info!(
            refresh_interval_secs = self.config.refresh_interval.map(|d| d.as_secs()),
            "Ready to process change records"
        );

        let mut refresh_timer = self.config.refresh_interval.map(|period| {
            let mut timer = interval_at(Instant::now() + period, period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
            timer
        });

        let mut progress_timer = interval(self.config.progress_interval);
        progress_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut prev_events: u64 = 0;
        let mut prev_time = std::time::Instant::now();

        loop {
            tokio::select! {
                msg = record_receiver.recv() => {
                    match msg {
                        Some(StreamMessage::Records { records, offsets }) => {
                            debug!(
                                record_count = records.len(),
                                offset_count = offsets.len(),
                                "Received change records from feed"
                            );

                            let summary = self.change_processor.process_records(records).await;
                            self.events_processed.fetch_add(summary.total as u64, Ordering::Relaxed);
                            self.events_failed.fetch_add(summary.failed as u64, Ordering::Relaxed);

                            if summary.failed > 0 {
                                warn!(
                                    total = summary.total,
                                    failed = summary.failed,
                                    "Batch processed with failed events"
                                );
                            }

                            // Every event was attempted; failures are reported, not retried
                            let _ = ack_transmitter.send(StreamMessage::Acknowledgment {
                                offsets,
                                success: true,
                                error: None,
                            }).await;
                        }
                        Some(StreamMessage::Error(e)) => {
                            error!(error = %e, "Received error from change feed");
                        }
                        Some(StreamMessage::End) | None => {
                            info!("Change feed ended");
                            break;
                        }
                        Some(StreamMessage::Acknowledgment { .. }) => {
                            warn!("Received acknowledgment on record channel (should be on ack channel)");
                        }
                    }
                }
                _ = next_tick(&mut refresh_timer) => {
                    self.run_refresh().await;
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal");
                    let _ = self.shutdown_tx.send(());
                    break;
                }
                _ = progress_timer.tick() => {
                    let events = self.events_processed.load(Ordering::Relaxed);

                    let now = std::time::Instant::now();
                    let elapsed_secs = now.duration_since(prev_time).as_secs_f64();
                    let events_per_sec = if elapsed_secs > 0.0 {
                        (events.saturating_sub(prev_events) as f64) / elapsed_secs
                    } else {
                        0.0
                    };

                    info!(
                        events_processed = events,
                        events_failed = self.events_failed.load(Ordering::Relaxed),
                        refreshes_completed = self.refreshes_completed.load(Ordering::Relaxed),
                        events_per_sec = format!("{:.2}", events_per_sec),
                        "Processing progress"
                    );

                    prev_events = events;
                    prev_time = now;
                }
            }
        }

        // Unacknowledged batches are re-consumed on next startup
        drop(ack_transmitter);
        let _ = feed_handle.await;

        let stats = self.stats();
        info!(
            total_events_processed = stats.events_processed,
            total_events_failed = stats.events_failed,
            total_refreshes = stats.refreshes_completed,
            "Orchestrator shutdown complete"
        );
        Ok(())
    }

    /// Run one full refresh, logging its outcome.
    pub async fn run_refresh(&self) -> Option<RefreshSummary> {
        match self.refresh_processor.refresh().await {
            Ok(summary) => {
                self.refreshes_completed.fetch_add(1, Ordering::Relaxed);
                info!(summary = %summary, "Full refresh finished");
                Some(summary)
            }
            Err(e) => {
                self.refreshes_failed.fetch_add(1, Ordering::Relaxed);
                error!(error = %e, "Full refresh failed");
                None
            }
        }
    }

    /// Counters accumulated since startup.
    pub fn stats(&self) -> OrchestratorStats {
        OrchestratorStats {
            events_processed: self.events_processed.load(Ordering::Relaxed),
            events_failed: self.events_failed.load(Ordering::Relaxed),
            refreshes_completed: self.refreshes_completed.load(Ordering::Relaxed),
            refreshes_failed: self.refreshes_failed.load(Ordering::Relaxed),
        }
    }

    /// Trigger a graceful shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

/// Wait for the next tick of an optional timer, forever if there is none.
async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
