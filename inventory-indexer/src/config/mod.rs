//! Configuration and dependency initialization for the inventory indexer.

mod dependencies;
mod settings;

pub use dependencies::Dependencies;
pub use settings::{ConnectionMode, IndexerConfig};
