use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::errors::IndexSyncError;
use crate::interfaces::DocumentStore;
use crate::types::{BulkOperation, BulkResponse, IndexAck, ItemResponse, WriteOutcome};

type RejectionRule = Box<dyn Fn(&str, &Value) -> Option<String> + Send + Sync>;

struct MemoryIndex {
    settings: Value,
    documents: BTreeMap<String, Value>,
}

impl MemoryIndex {
    fn new(settings: Value) -> Self {
        Self {
            settings,
            documents: BTreeMap::new(),
        }
    }
}

#[derive(Default)]
struct MemoryState {
    indices: HashMap<String, MemoryIndex>,
    unavailable: bool,
    create_failure: Option<String>,
    delete_failure: Option<String>,
    rejection: Option<RejectionRule>,
    bulk_requests: usize,
}

impl MemoryState {
    fn check_available(&self) -> Result<(), IndexSyncError> {
        if self.unavailable {
            return Err(IndexSyncError::store_unavailable(
                "in-memory document store is marked unavailable",
            ));
        }
        Ok(())
    }

    /// Index a document, creating the index on first write.
    fn index_document(&mut self, index: &str, id: &str, document: &Value) -> ItemResponse {
        if id.trim().is_empty() {
            return ItemResponse::failure(id, "document id must not be empty");
        }
        if let Some(diagnostic) = self.rejection.as_ref().and_then(|rule| rule(id, document)) {
            return ItemResponse::failure(id, diagnostic);
        }

        let documents = &mut self
            .indices
            .entry(index.to_string())
            .or_insert_with(|| MemoryIndex::new(Value::Null))
            .documents;

        match documents.insert(id.to_string(), document.clone()) {
            Some(_) => ItemResponse::success(id, WriteOutcome::Updated),
            None => ItemResponse::success(id, WriteOutcome::Created),
        }
    }

    fn delete_document(&mut self, index: &str, id: &str) -> ItemResponse {
        let removed = self
            .indices
            .get_mut(index)
            .and_then(|memory_index| memory_index.documents.remove(id));

        match removed {
            Some(_) => ItemResponse::success(id, WriteOutcome::Deleted),
            None => ItemResponse::not_found(id),
        }
    }
}

/// Document store backed by process memory.
///
/// Behaves like a single-node search cluster: writes auto-create their index,
/// deletes of missing documents report `NotFound`, and counting a missing
/// index fails.
#[derive(Default)]
pub struct InMemoryDocumentStore {
    state: Mutex<MemoryState>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail with `StoreUnavailable`.
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().await.unavailable = unavailable;
    }

    /// Reject index creation with the given diagnostic.
    pub async fn fail_index_creation(&self, diagnostic: impl Into<String>) {
        self.state.lock().await.create_failure = Some(diagnostic.into());
    }

    /// Reject index deletion with the given diagnostic.
    pub async fn fail_index_deletion(&self, diagnostic: impl Into<String>) {
        self.state.lock().await.delete_failure = Some(diagnostic.into());
    }

    /// Reject document writes for which `rule` returns a diagnostic.
    ///
    /// The rule sees the document ID and source of every index write, both
    /// single and bulk.
    pub async fn reject_documents_where<F>(&self, rule: F)
    where
        F: Fn(&str, &Value) -> Option<String> + Send + Sync + 'static,
    {
        self.state.lock().await.rejection = Some(Box::new(rule));
    }

    /// Write a document directly, bypassing rejection rules.
    pub async fn seed_document(&self, index: &str, id: &str, document: Value) {
        self.state
            .lock()
            .await
            .indices
            .entry(index.to_string())
            .or_insert_with(|| MemoryIndex::new(Value::Null))
            .documents
            .insert(id.to_string(), document);
    }

    /// Settings the index was created with, `None` if it does not exist.
    pub async fn index_settings(&self, index: &str) -> Option<Value> {
        self.state
            .lock()
            .await
            .indices
            .get(index)
            .map(|memory_index| memory_index.settings.clone())
    }

    /// IDs of every document in an index, sorted.
    pub async fn document_ids(&self, index: &str) -> Vec<String> {
        self.state
            .lock()
            .await
            .indices
            .get(index)
            .map(|memory_index| memory_index.documents.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of non-empty bulk requests received.
    pub async fn bulk_request_count(&self) -> usize {
        self.state.lock().await.bulk_requests
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn index_exists(&self, index: &str) -> Result<bool, IndexSyncError> {
        let state = self.state.lock().await;
        state.check_available()?;
        Ok(state.indices.contains_key(index))
    }

    async fn create_index(
        &self,
        index: &str,
        settings: &Value,
    ) -> Result<IndexAck, IndexSyncError> {
        let mut state = self.state.lock().await;
        state.check_available()?;

        if let Some(diagnostic) = &state.create_failure {
            return Ok(IndexAck::rejected(diagnostic.clone()));
        }
        if state.indices.contains_key(index) {
            return Ok(IndexAck::rejected(format!(
                "resource_already_exists_exception: index [{}] already exists",
                index
            )));
        }

        state
            .indices
            .insert(index.to_string(), MemoryIndex::new(settings.clone()));
        Ok(IndexAck::acknowledged())
    }

    async fn delete_index(&self, index: &str) -> Result<IndexAck, IndexSyncError> {
        let mut state = self.state.lock().await;
        state.check_available()?;

        if let Some(diagnostic) = &state.delete_failure {
            return Ok(IndexAck::rejected(diagnostic.clone()));
        }
        if state.indices.remove(index).is_none() {
            return Ok(IndexAck::rejected(format!(
                "index_not_found_exception: no such index [{}]",
                index
            )));
        }
        Ok(IndexAck::acknowledged())
    }

    async fn bulk_write(
        &self,
        index: &str,
        operations: &[BulkOperation],
    ) -> Result<BulkResponse, IndexSyncError> {
        if operations.is_empty() {
            return Ok(BulkResponse::empty());
        }

        let mut state = self.state.lock().await;
        state.check_available()?;
        state.bulk_requests += 1;

        let items = operations
            .iter()
            .map(|operation| match operation {
                BulkOperation::Index { id, document } => state.index_document(index, id, document),
            })
            .collect();

        Ok(BulkResponse::from_items(items))
    }

    async fn get_document(&self, index: &str, id: &str) -> Result<Option<Value>, IndexSyncError> {
        let state = self.state.lock().await;
        state.check_available()?;
        Ok(state
            .indices
            .get(index)
            .and_then(|memory_index| memory_index.documents.get(id).cloned()))
    }

    async fn put_document(
        &self,
        index: &str,
        id: &str,
        document: &Value,
    ) -> Result<ItemResponse, IndexSyncError> {
        let mut state = self.state.lock().await;
        state.check_available()?;
        Ok(state.index_document(index, id, document))
    }

    async fn delete_document(&self, index: &str, id: &str) -> Result<ItemResponse, IndexSyncError> {
        let mut state = self.state.lock().await;
        state.check_available()?;
        Ok(state.delete_document(index, id))
    }

    async fn count_documents(&self, index: &str) -> Result<u64, IndexSyncError> {
        let state = self.state.lock().await;
        state.check_available()?;
        state
            .indices
            .get(index)
            .map(|memory_index| memory_index.documents.len() as u64)
            .ok_or_else(|| IndexSyncError::not_found(format!("index '{}'", index)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const INDEX: &str = "dev_vehicle_inventory";

    #[tokio::test]
    async fn test_create_and_delete_index() {
        let store = InMemoryDocumentStore::new();
        let settings = json!({ "settings": { "number_of_shards": 1 } });

        assert!(!store.index_exists(INDEX).await.unwrap());
        assert!(store.create_index(INDEX, &settings).await.unwrap().ok);
        assert!(store.index_exists(INDEX).await.unwrap());
        assert_eq!(store.index_settings(INDEX).await, Some(settings.clone()));

        // Creating twice is rejected, not an error
        let again = store.create_index(INDEX, &settings).await.unwrap();
        assert!(!again.ok);
        assert!(again.diagnostic.unwrap().contains("already exists"));

        assert!(store.delete_index(INDEX).await.unwrap().ok);
        assert!(!store.delete_index(INDEX).await.unwrap().ok);
    }

    #[tokio::test]
    async fn test_put_reports_created_then_updated() {
        let store = InMemoryDocumentStore::new();

        let first = store.put_document(INDEX, "VIN1", &json!({ "doors": 4 })).await.unwrap();
        let second = store.put_document(INDEX, "VIN1", &json!({ "doors": 2 })).await.unwrap();

        assert_eq!(first.outcome, Some(WriteOutcome::Created));
        assert_eq!(second.outcome, Some(WriteOutcome::Updated));
        assert_eq!(
            store.get_document(INDEX, "VIN1").await.unwrap(),
            Some(json!({ "doors": 2 }))
        );
    }

    #[tokio::test]
    async fn test_delete_missing_document_is_not_found() {
        let store = InMemoryDocumentStore::new();
        let response = store.delete_document(INDEX, "VIN404").await.unwrap();
        assert!(response.is_not_found());
    }

    #[tokio::test]
    async fn test_bulk_write_reports_per_item_results() {
        let store = InMemoryDocumentStore::new();
        store
            .reject_documents_where(|_, doc| {
                (doc["doors"] == json!(2)).then(|| "two-door vehicles rejected".to_string())
            })
            .await;

        let response = store
            .bulk_write(
                INDEX,
                &[
                    BulkOperation::Index {
                        id: "VIN1".to_string(),
                        document: json!({ "doors": 4 }),
                    },
                    BulkOperation::Index {
                        id: "VIN2".to_string(),
                        document: json!({ "doors": 2 }),
                    },
                    BulkOperation::Index {
                        id: "".to_string(),
                        document: json!({ "doors": 4 }),
                    },
                ],
            )
            .await
            .unwrap();

        assert!(response.errors);
        assert_eq!(response.succeeded_count(), 1);
        assert_eq!(
            response.items[1].diagnostic.as_deref(),
            Some("two-door vehicles rejected")
        );
        assert!(!response.items[2].ok);
        assert_eq!(store.document_ids(INDEX).await, vec!["VIN1".to_string()]);
        assert_eq!(store.bulk_request_count().await, 1);
    }

    #[tokio::test]
    async fn test_empty_bulk_is_not_sent() {
        let store = InMemoryDocumentStore::new();
        let response = store.bulk_write(INDEX, &[]).await.unwrap();
        assert_eq!(response, BulkResponse::empty());
        assert_eq!(store.bulk_request_count().await, 0);
    }

    #[tokio::test]
    async fn test_count_missing_index_is_not_found() {
        let store = InMemoryDocumentStore::new();
        assert!(matches!(
            store.count_documents(INDEX).await.unwrap_err(),
            IndexSyncError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_every_call() {
        let store = InMemoryDocumentStore::new();
        store.set_unavailable(true).await;

        assert!(matches!(
            store.index_exists(INDEX).await.unwrap_err(),
            IndexSyncError::StoreUnavailable(_)
        ));
        assert!(matches!(
            store.put_document(INDEX, "VIN1", &json!({})).await.unwrap_err(),
            IndexSyncError::StoreUnavailable(_)
        ));
    }
}
