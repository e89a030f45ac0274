//! # Inventory Indexer Repository
//!
//! This crate provides the store interfaces and the index synchronizer that
//! keeps a search index consistent with the inventory record store. It
//! includes the error taxonomy, concrete OpenSearch and PostgreSQL adapters,
//! and in-memory stores for tests and local runs.

pub mod config;
pub mod errors;
pub mod interfaces;
pub mod memory;
pub mod opensearch;
pub mod postgres;
pub mod synchronizer;
pub mod types;
pub mod utils;

pub use config::{IndexDescriptor, SyncConfig};
pub use errors::{IndexOperation, IndexSyncError, RebuildPhase};
pub use interfaces::{DocumentStore, RecordScan, RecordStore};
pub use memory::{InMemoryDocumentStore, InMemoryRecordStore};
pub use crate::opensearch::OpenSearchDocumentStore;
pub use postgres::PostgresRecordStore;
pub use synchronizer::IndexSynchronizer;
pub use types::{BulkOperation, BulkResponse, IndexAck, ItemResponse, RecordPage, WriteOutcome};
pub use utils::{validate_document_id, validate_table_name};
