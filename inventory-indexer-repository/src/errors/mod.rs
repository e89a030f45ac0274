//! Error types for the inventory indexer repository.
//!
//! This module provides a unified error type for all store and synchronization
//! operations.

mod index_sync_error;

pub use index_sync_error::{IndexOperation, IndexSyncError, RebuildPhase};
