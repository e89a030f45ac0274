//! Document store trait definition.
//!
//! This module defines the abstract interface for the search engine side of
//! index synchronization, allowing for different backend implementations
//! (OpenSearch, Elasticsearch, in-memory, etc.).

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::IndexSyncError;
use crate::types::{BulkOperation, BulkResponse, IndexAck, ItemResponse};

/// Abstracts the search engine the index is kept in.
///
/// Implementations are injected into `IndexSynchronizer` as shared references so
/// that one client serves every synchronizer in the process, and so tests can
/// substitute mock implementations.
///
/// Transport failures are returned as `Err(IndexSyncError::StoreUnavailable)`.
/// Requests the store processed but refused are returned as `Ok` responses
/// with `ok == false` and the store's diagnostic, so callers decide how to
/// interpret them.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Check whether an index exists.
    async fn index_exists(&self, index: &str) -> Result<bool, IndexSyncError>;

    /// Create an index with the given settings and mappings.
    async fn create_index(&self, index: &str, settings: &Value)
        -> Result<IndexAck, IndexSyncError>;

    /// Delete an index and every document in it.
    async fn delete_index(&self, index: &str) -> Result<IndexAck, IndexSyncError>;

    /// Submit a batch of operations in one request.
    ///
    /// An empty batch is a no-op success. Per-item failures are reported in the
    /// response, one item per operation in submission order.
    async fn bulk_write(
        &self,
        index: &str,
        operations: &[BulkOperation],
    ) -> Result<BulkResponse, IndexSyncError>;

    /// Fetch a document's source by ID, `None` if it does not exist.
    async fn get_document(&self, index: &str, id: &str) -> Result<Option<Value>, IndexSyncError>;

    /// Index a document at `id`, replacing any existing document.
    async fn put_document(
        &self,
        index: &str,
        id: &str,
        document: &Value,
    ) -> Result<ItemResponse, IndexSyncError>;

    /// Delete the document at `id`.
    ///
    /// A missing document is reported as an item with a `NotFound` outcome.
    async fn delete_document(&self, index: &str, id: &str) -> Result<ItemResponse, IndexSyncError>;

    /// Count the documents in an index.
    async fn count_documents(&self, index: &str) -> Result<u64, IndexSyncError>;
}
