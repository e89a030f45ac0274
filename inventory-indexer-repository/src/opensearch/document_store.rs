//! OpenSearch document store implementation.
//!
//! This module provides the concrete implementation of `DocumentStore`
//! using the OpenSearch Rust crate.

use async_trait::async_trait;
use opensearch::{
    http::{
        request::JsonBody,
        transport::{SingleNodeConnectionPool, TransportBuilder},
    },
    indices::{IndicesCreateParts, IndicesDeleteParts, IndicesExistsParts},
    BulkParts, CountParts, DeleteParts, GetParts, IndexParts, OpenSearch,
};
use serde_json::{json, Value};
use tracing::{debug, error, info};
use url::Url;

use crate::errors::IndexSyncError;
use crate::interfaces::DocumentStore;
use crate::types::{BulkOperation, BulkResponse, IndexAck, ItemResponse, WriteOutcome};

/// OpenSearch document store.
///
/// Maps the `DocumentStore` operations onto the OpenSearch REST API. One
/// instance is created per process and shared between synchronizers.
///
/// # Example
///
/// ```ignore
/// use inventory_indexer_repository::OpenSearchDocumentStore;
/// let store = OpenSearchDocumentStore::new("http://localhost:9200").await?;
/// let exists = store.index_exists("dev_vehicle_inventory").await?;
/// ```
pub struct OpenSearchDocumentStore {
    client: OpenSearch,
}

impl OpenSearchDocumentStore {
    /// Create a new OpenSearch document store connected to the specified URL.
    ///
    /// # Arguments
    ///
    /// * `url` - The OpenSearch server URL (e.g., "http://localhost:9200")
    ///
    /// # Returns
    ///
    /// * `Ok(OpenSearchDocumentStore)` - A new store instance
    /// * `Err(IndexSyncError)` - If connection setup fails
    pub async fn new(url: &str) -> Result<Self, IndexSyncError> {
        let parsed_url =
            Url::parse(url).map_err(|e| IndexSyncError::store_unavailable(e.to_string()))?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);
        let transport = TransportBuilder::new(conn_pool)
            .disable_proxy()
            .build()
            .map_err(|e| IndexSyncError::store_unavailable(e.to_string()))?;

        info!(url = %url, "Created OpenSearch document store");

        Ok(Self::from_client(OpenSearch::new(transport)))
    }

    /// Wrap an already configured client.
    pub fn from_client(client: OpenSearch) -> Self {
        Self { client }
    }

    /// Build the newline-delimited bulk body: an action line per operation,
    /// followed by the document source.
    fn bulk_body(operations: &[BulkOperation]) -> Vec<JsonBody<Value>> {
        let mut body: Vec<JsonBody<Value>> = Vec::with_capacity(operations.len() * 2);
        for operation in operations {
            match operation {
                BulkOperation::Index { id, document } => {
                    body.push(JsonBody::new(json!({ "index": { "_id": id } })));
                    body.push(JsonBody::new(document.clone()));
                }
            }
        }
        body
    }

    /// Parse a bulk API response body into per-item results.
    fn parse_bulk_response(body: &Value) -> Result<BulkResponse, IndexSyncError> {
        let entries = body
            .get("items")
            .and_then(Value::as_array)
            .ok_or_else(|| IndexSyncError::parse("Bulk response has no items array"))?;

        let mut items = Vec::with_capacity(entries.len());
        for entry in entries {
            // Each entry is keyed by its action: {"index": {...}}
            let result = entry
                .as_object()
                .and_then(|actions| actions.values().next())
                .ok_or_else(|| IndexSyncError::parse("Bulk response item has no action"))?;
            items.push(Self::parse_bulk_item(result));
        }

        // The store's own flag wins; it is only derived when absent
        let mut response = BulkResponse::from_items(items);
        if let Some(errors) = body.get("errors").and_then(Value::as_bool) {
            response.errors = errors;
        }
        Ok(response)
    }

    fn parse_bulk_item(result: &Value) -> ItemResponse {
        let id = result
            .get("_id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let status = result.get("status").and_then(Value::as_u64).unwrap_or(0);
        let outcome = result
            .get("result")
            .and_then(Value::as_str)
            .and_then(WriteOutcome::from_result);

        match result.get("error") {
            None if (200..300).contains(&status) => {
                ItemResponse::success(id, outcome.unwrap_or(WriteOutcome::Updated))
            }
            _ if outcome == Some(WriteOutcome::NotFound) => ItemResponse::not_found(id),
            Some(error) => ItemResponse::failure(id, Self::describe_error(error)),
            None => ItemResponse::failure(id, format!("status {}", status)),
        }
    }

    /// Render an OpenSearch error object as `type: reason`.
    fn describe_error(error: &Value) -> String {
        match (
            error.get("type").and_then(Value::as_str),
            error.get("reason").and_then(Value::as_str),
        ) {
            (Some(kind), Some(reason)) => format!("{}: {}", kind, reason),
            _ => error.to_string(),
        }
    }

    /// Map a failed request-level status to an error. Server-side and
    /// throttling statuses are transient, everything else is a rejection.
    fn status_error(status: u16, body: &str) -> IndexSyncError {
        let msg = format!("Request failed with status {}: {}", status, body);
        if status >= 500 || status == 429 {
            IndexSyncError::store_unavailable(msg)
        } else {
            IndexSyncError::validation(msg)
        }
    }

    fn unavailable(err: opensearch::Error) -> IndexSyncError {
        IndexSyncError::store_unavailable(err.to_string())
    }
}

#[async_trait]
impl DocumentStore for OpenSearchDocumentStore {
    async fn index_exists(&self, index: &str) -> Result<bool, IndexSyncError> {
        let response = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&[index]))
            .send()
            .await
            .map_err(Self::unavailable)?;

        let status = response.status_code();
        match status.as_u16() {
            404 => Ok(false),
            _ if status.is_success() => Ok(true),
            code => {
                let body = response.text().await.unwrap_or_default();
                Err(Self::status_error(code, &body))
            }
        }
    }

    async fn create_index(
        &self,
        index: &str,
        settings: &Value,
    ) -> Result<IndexAck, IndexSyncError> {
        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(index))
            .body(settings.clone())
            .send()
            .await
            .map_err(Self::unavailable)?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!(index = %index, status = %status, body = %error_body, "Create index request failed");
            return Ok(IndexAck::rejected(format!(
                "status {}: {}",
                status, error_body
            )));
        }

        info!(index = %index, "Created index");
        Ok(IndexAck::acknowledged())
    }

    async fn delete_index(&self, index: &str) -> Result<IndexAck, IndexSyncError> {
        let response = self
            .client
            .indices()
            .delete(IndicesDeleteParts::Index(&[index]))
            .send()
            .await
            .map_err(Self::unavailable)?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!(index = %index, status = %status, body = %error_body, "Delete index request failed");
            return Ok(IndexAck::rejected(format!(
                "status {}: {}",
                status, error_body
            )));
        }

        info!(index = %index, "Deleted index");
        Ok(IndexAck::acknowledged())
    }

    async fn bulk_write(
        &self,
        index: &str,
        operations: &[BulkOperation],
    ) -> Result<BulkResponse, IndexSyncError> {
        // The bulk API rejects an empty body, an empty batch has nothing to do
        if operations.is_empty() {
            debug!(index = %index, "Empty bulk batch, nothing to submit");
            return Ok(BulkResponse::empty());
        }

        let response = self
            .client
            .bulk(BulkParts::Index(index))
            .body(Self::bulk_body(operations))
            .send()
            .await
            .map_err(Self::unavailable)?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!(index = %index, status = %status, body = %error_body, "Bulk request failed");
            return Err(Self::status_error(status.as_u16(), &error_body));
        }

        let body = response
            .json::<Value>()
            .await
            .map_err(|e| IndexSyncError::parse(e.to_string()))?;
        let bulk = Self::parse_bulk_response(&body)?;

        debug!(
            index = %index,
            submitted = operations.len(),
            succeeded = bulk.succeeded_count(),
            errors = bulk.errors,
            "Bulk request completed"
        );
        Ok(bulk)
    }

    async fn get_document(&self, index: &str, id: &str) -> Result<Option<Value>, IndexSyncError> {
        let response = self
            .client
            .get(GetParts::IndexId(index, id))
            .send()
            .await
            .map_err(Self::unavailable)?;

        let status = response.status_code();
        if status.as_u16() == 404 {
            return Ok(None);
        }
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(Self::status_error(status.as_u16(), &error_body));
        }

        let body = response
            .json::<Value>()
            .await
            .map_err(|e| IndexSyncError::parse(e.to_string()))?;

        if body.get("found").and_then(Value::as_bool) == Some(false) {
            return Ok(None);
        }
        Ok(body.get("_source").cloned())
    }

    async fn put_document(
        &self,
        index: &str,
        id: &str,
        document: &Value,
    ) -> Result<ItemResponse, IndexSyncError> {
        let response = self
            .client
            .index(IndexParts::IndexId(index, id))
            .body(document.clone())
            .send()
            .await
            .map_err(Self::unavailable)?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!(doc_id = %id, status = %status, body = %error_body, "Index request failed");
            if status.as_u16() >= 500 || status.as_u16() == 429 {
                return Err(Self::status_error(status.as_u16(), &error_body));
            }
            return Ok(ItemResponse::failure(
                id,
                format!("status {}: {}", status, error_body),
            ));
        }

        let body = response
            .json::<Value>()
            .await
            .map_err(|e| IndexSyncError::parse(e.to_string()))?;
        let outcome = body
            .get("result")
            .and_then(Value::as_str)
            .and_then(WriteOutcome::from_result)
            .unwrap_or(WriteOutcome::Updated);

        debug!(doc_id = %id, outcome = ?outcome, "Document indexed");
        Ok(ItemResponse::success(id, outcome))
    }

    async fn delete_document(&self, index: &str, id: &str) -> Result<ItemResponse, IndexSyncError> {
        let response = self
            .client
            .delete(DeleteParts::IndexId(index, id))
            .send()
            .await
            .map_err(Self::unavailable)?;

        let status = response.status_code();

        // 404 covers both a missing document and a missing index
        if status.as_u16() == 404 {
            debug!(doc_id = %id, "Document to delete not found");
            return Ok(ItemResponse::not_found(id));
        }

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!(doc_id = %id, status = %status, body = %error_body, "Delete request failed");
            if status.as_u16() >= 500 || status.as_u16() == 429 {
                return Err(Self::status_error(status.as_u16(), &error_body));
            }
            return Ok(ItemResponse::failure(
                id,
                format!("status {}: {}", status, error_body),
            ));
        }

        debug!(doc_id = %id, "Document deleted");
        Ok(ItemResponse::success(id, WriteOutcome::Deleted))
    }

    async fn count_documents(&self, index: &str) -> Result<u64, IndexSyncError> {
        let response = self
            .client
            .count(CountParts::Index(&[index]))
            .send()
            .await
            .map_err(Self::unavailable)?;

        let status = response.status_code();
        if status.as_u16() == 404 {
            return Err(IndexSyncError::not_found(format!("index '{}'", index)));
        }
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(Self::status_error(status.as_u16(), &error_body));
        }

        let body = response
            .json::<Value>()
            .await
            .map_err(|e| IndexSyncError::parse(e.to_string()))?;

        body.get("count")
            .and_then(Value::as_u64)
            .ok_or_else(|| IndexSyncError::parse("Count response has no count field"))
    }
}
