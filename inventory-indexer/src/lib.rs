//! # Inventory Indexer
//!
//! Keeps the vehicle inventory search index in step with the inventory
//! record store. Change records arrive on a Kafka topic and are applied one
//! by one; a scheduled full refresh rebuilds the index from the record store.
//!
//! ## Architecture
//!
//! 1. **Consumer**: Receives change records from Kafka
//! 2. **Processor**: Applies change events and full refreshes through the
//!    index synchronizer
//! 3. **Orchestrator**: Coordinates the ingest flow and the refresh schedule
//!
//! ## Modules
//!
//! - [`config`]: Configuration and dependency initialization
//! - [`consumer`]: Kafka change feed
//! - [`processor`]: Change event and full refresh processors
//! - [`orchestrator`]: Coordinates the ingest flow
//! - [`errors`]: Error types for the indexer

pub mod config;
pub mod consumer;
pub mod errors;
pub mod orchestrator;
pub mod processor;

pub use config::{ConnectionMode, Dependencies, IndexerConfig};
pub use errors::IngestError;
pub use orchestrator::{Orchestrator, OrchestratorConfig, OrchestratorStats};

use thiserror::Error;

/// Errors that can occur during indexer initialization or execution.
#[derive(Error, Debug)]
pub enum IndexingError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Ingest error.
    #[error("Ingest error: {0}")]
    IngestError(#[from] IngestError),
}

impl IndexingError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
