//! Index synchronizer implementation.
//!
//! This module provides the core service that keeps one search index
//! consistent with the record store for a single entity type. Processors use
//! it to apply individual changes and to rebuild the index from scratch.

use std::sync::Arc;

use inventory_indexer_shared::IndexedEntity;
use tracing::{debug, info, instrument, warn};

use crate::config::{IndexDescriptor, SyncConfig};
use crate::errors::{IndexOperation, IndexSyncError, RebuildPhase};
use crate::interfaces::{DocumentStore, RecordScan, RecordStore};
use crate::types::{BulkOperation, BulkResponse, ItemResponse};
use crate::utils::validate_document_id;

/// Keeps the search index for entity type `E` in sync with the record store.
///
/// The index name is resolved once at construction from the `SyncConfig`
/// binding for `E::KIND` and never changes afterwards. Both stores are shared
/// references so one client serves every synchronizer in the process.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use inventory_indexer_repository::{
///     IndexSynchronizer, OpenSearchDocumentStore, PostgresRecordStore, SyncConfig,
/// };
/// use inventory_indexer_shared::InventoryItem;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = SyncConfig::default().with_environment("prod");
/// let documents = Arc::new(OpenSearchDocumentStore::new("http://localhost:9200").await?);
/// let records = Arc::new(
///     PostgresRecordStore::connect("postgres://localhost/inventory", "prod_vehicle_inventory").await?,
/// );
///
/// let synchronizer = IndexSynchronizer::<InventoryItem>::new(documents, records, config)?;
/// synchronizer.ensure_index_exists().await?;
///
/// let item = InventoryItem::new("client-1", "VIN123").with_doors(4);
/// synchronizer.insert(&item).await?;
/// # Ok(())
/// # }
/// ```
pub struct IndexSynchronizer<E: IndexedEntity> {
    documents: Arc<dyn DocumentStore>,
    records: Arc<dyn RecordStore<E>>,
    descriptor: IndexDescriptor,
    config: SyncConfig,
}

impl<E: IndexedEntity> IndexSynchronizer<E> {
    /// Create a synchronizer for entity type `E`.
    ///
    /// # Arguments
    ///
    /// * `documents` - The search engine the index lives in
    /// * `records` - The authoritative record store
    /// * `config` - Environment, index bindings and paging settings
    ///
    /// # Returns
    ///
    /// * `Ok(IndexSynchronizer)` - A synchronizer bound to the resolved index
    /// * `Err(IndexSyncError::ConfigurationError)` - If `E::KIND` has no usable binding
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        records: Arc<dyn RecordStore<E>>,
        config: SyncConfig,
    ) -> Result<Self, IndexSyncError> {
        let descriptor = IndexDescriptor::resolve(&config, E::KIND)?;

        info!(
            entity_kind = %descriptor.entity_kind(),
            index = %descriptor.index_name(),
            "Resolved index binding"
        );

        Ok(Self {
            documents,
            records,
            descriptor,
            config,
        })
    }

    pub fn index_name(&self) -> &str {
        self.descriptor.index_name()
    }

    pub fn descriptor(&self) -> &IndexDescriptor {
        &self.descriptor
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Create the index with the entity's settings if it does not exist yet.
    ///
    /// Idempotent: calling it on an existing index does nothing.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The index exists
    /// * `Err(IndexSyncError::IndexProvisioningError)` - If the store rejected the creation
    pub async fn ensure_index_exists(&self) -> Result<(), IndexSyncError> {
        let index = self.index_name();

        if self.documents.index_exists(index).await? {
            debug!(index = %index, "Index already exists");
            return Ok(());
        }

        let ack = self
            .documents
            .create_index(index, &E::index_settings())
            .await?;

        if !ack.ok {
            // Another writer may have created it between the check and the create
            if self.documents.index_exists(index).await? {
                debug!(index = %index, "Index created concurrently");
                return Ok(());
            }
            return Err(IndexSyncError::index_provisioning(
                IndexOperation::Create,
                ack.diagnostic.unwrap_or_default(),
            ));
        }

        info!(index = %index, entity_kind = %E::KIND, "Created index");
        Ok(())
    }

    /// Drop the index and rebuild it from every record in the record store.
    ///
    /// The rebuild runs four phases in order: delete the existing index,
    /// create a fresh one, scan the record store, and bulk write one index
    /// operation per record. It is neither atomic nor restartable, so a failure
    /// can leave the index absent or partially populated. Errors are wrapped in
    /// `RebuildError` naming the phase that failed.
    ///
    /// # Returns
    ///
    /// * `Ok(BulkResponse)` - The store's response to the bulk write, which may
    ///   contain per-item failures
    /// * `Err(IndexSyncError::RebuildError)` - If any phase failed
    #[instrument(skip(self), fields(index = %self.descriptor.index_name()))]
    pub async fn rebuild(&self) -> Result<BulkResponse, IndexSyncError> {
        self.drop_index()
            .await
            .map_err(|e| e.during(RebuildPhase::Delete))?;

        self.ensure_index_exists()
            .await
            .map_err(|e| e.during(RebuildPhase::Create))?;

        let operations = self
            .scan_operations()
            .await
            .map_err(|e| e.during(RebuildPhase::Scan))?;

        let response = self
            .submit_bulk(&operations)
            .await
            .map_err(|e| e.during(RebuildPhase::Bulk))?;

        info!(
            submitted = operations.len(),
            succeeded = response.succeeded_count(),
            errors = response.errors,
            "Rebuild completed"
        );

        Ok(response)
    }

    async fn drop_index(&self) -> Result<(), IndexSyncError> {
        let index = self.index_name();
        if !self.documents.index_exists(index).await? {
            return Ok(());
        }

        let ack = self.documents.delete_index(index).await?;
        if !ack.ok {
            return Err(IndexSyncError::index_provisioning(
                IndexOperation::Delete,
                ack.diagnostic.unwrap_or_default(),
            ));
        }

        info!(index = %index, "Deleted index for rebuild");
        Ok(())
    }

    /// Page through the record store, turning every record into an index operation.
    async fn scan_operations(&self) -> Result<Vec<BulkOperation>, IndexSyncError> {
        let mut scan = RecordScan::new(self.records.as_ref(), self.config.scan_page_size);
        let mut operations = Vec::new();
        let mut pages = 0usize;

        while let Some(page) = scan.next_page().await? {
            pages += 1;
            for record in page {
                operations.push(BulkOperation::Index {
                    id: record.document_id(),
                    document: serde_json::to_value(&record)?,
                });
            }
        }

        debug!(pages, records = operations.len(), "Scanned record store");
        Ok(operations)
    }

    async fn submit_bulk(
        &self,
        operations: &[BulkOperation],
    ) -> Result<BulkResponse, IndexSyncError> {
        let index = self.index_name();

        match self.config.max_bulk_size {
            Some(chunk_size) if chunk_size > 0 && operations.len() > chunk_size => {
                let mut response = BulkResponse::empty();
                for chunk in operations.chunks(chunk_size) {
                    response.merge(self.documents.bulk_write(index, chunk).await?);
                }
                Ok(response)
            }
            _ => self.documents.bulk_write(index, operations).await,
        }
    }

    /// Index a new document for `entity`.
    ///
    /// # Returns
    ///
    /// * `Ok(ItemResponse)` - The store's write response
    /// * `Err(IndexSyncError::ValidationError)` - If the identifier is empty or
    ///   the store rejected the document (diagnostic passed through verbatim)
    pub async fn insert(&self, entity: &E) -> Result<ItemResponse, IndexSyncError> {
        let id = entity.document_id();
        validate_document_id(&id)?;

        let response = self.write_document(&id, entity).await?;
        debug!(doc_id = %id, outcome = ?response.outcome, "Inserted document");
        Ok(response)
    }

    /// Replace the document at `id` with `entity`.
    ///
    /// The document must already exist. The write is a full replacement:
    /// attributes absent from `entity` are absent from the stored document
    /// afterwards.
    ///
    /// # Returns
    ///
    /// * `Ok(ItemResponse)` - The store's write response
    /// * `Err(IndexSyncError::NotFound)` - If no document exists at `id`
    /// * `Err(IndexSyncError::ValidationError)` - If the store rejected the document
    pub async fn update(&self, entity: &E, id: &str) -> Result<ItemResponse, IndexSyncError> {
        validate_document_id(id)?;

        if self
            .documents
            .get_document(self.index_name(), id)
            .await?
            .is_none()
        {
            return Err(IndexSyncError::not_found(format!(
                "document '{}' in index '{}'",
                id,
                self.index_name()
            )));
        }

        let entity_id = entity.document_id();
        if entity_id != id {
            warn!(doc_id = %id, entity_id = %entity_id, "Updating document with an entity carrying a different identifier");
        }

        let response = self.write_document(id, entity).await?;
        debug!(doc_id = %id, outcome = ?response.outcome, "Updated document");
        Ok(response)
    }

    async fn write_document(&self, id: &str, entity: &E) -> Result<ItemResponse, IndexSyncError> {
        let document = serde_json::to_value(entity)?;
        let response = self
            .documents
            .put_document(self.index_name(), id, &document)
            .await?;

        if !response.ok {
            return Err(IndexSyncError::validation(
                response
                    .diagnostic
                    .unwrap_or_else(|| format!("document '{}' rejected", id)),
            ));
        }
        Ok(response)
    }

    /// Delete the document at `id`.
    ///
    /// Deleting a document that does not exist succeeds: the returned response
    /// carries the `NotFound` outcome.
    pub async fn delete(&self, id: &str) -> Result<ItemResponse, IndexSyncError> {
        validate_document_id(id)?;

        let response = self
            .documents
            .delete_document(self.index_name(), id)
            .await?;

        if response.is_not_found() {
            debug!(doc_id = %id, "Document already absent");
            return Ok(response);
        }
        if !response.ok {
            return Err(IndexSyncError::validation(
                response
                    .diagnostic
                    .unwrap_or_else(|| format!("delete of document '{}' rejected", id)),
            ));
        }

        debug!(doc_id = %id, "Deleted document");
        Ok(response)
    }

    /// Read the indexed document at `id` back as an entity.
    pub async fn fetch_indexed(&self, id: &str) -> Result<Option<E>, IndexSyncError> {
        match self.documents.get_document(self.index_name(), id).await? {
            Some(document) => Ok(Some(serde_json::from_value(document)?)),
            None => Ok(None),
        }
    }

    /// Number of documents in the index.
    pub async fn document_count(&self) -> Result<u64, IndexSyncError> {
        self.documents.count_documents(self.index_name()).await
    }
}
