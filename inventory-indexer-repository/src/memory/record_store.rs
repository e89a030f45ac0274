use std::collections::BTreeMap;
use std::ops::Bound;

use async_trait::async_trait;
use inventory_indexer_shared::IndexedEntity;
use tokio::sync::RwLock;

use crate::errors::IndexSyncError;
use crate::interfaces::RecordStore;
use crate::types::RecordPage;

/// Record store backed by process memory, ordered by document ID.
pub struct InMemoryRecordStore<E> {
    records: RwLock<BTreeMap<String, E>>,
    unavailable: RwLock<bool>,
}

impl<E: IndexedEntity> Default for InMemoryRecordStore<E> {
    fn default() -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
            unavailable: RwLock::new(false),
        }
    }
}

impl<E: IndexedEntity> InMemoryRecordStore<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `records`, keyed by their document IDs.
    pub fn with_records(records: impl IntoIterator<Item = E>) -> Self {
        let records = records
            .into_iter()
            .map(|record| (record.document_id(), record))
            .collect();
        Self {
            records: RwLock::new(records),
            unavailable: RwLock::new(false),
        }
    }

    /// Insert or replace a record.
    pub async fn upsert(&self, record: E) {
        self.records
            .write()
            .await
            .insert(record.document_id(), record);
    }

    /// Remove a record, returning it if it existed.
    pub async fn remove(&self, id: &str) -> Option<E> {
        self.records.write().await.remove(id)
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Make every subsequent read fail with `StoreUnavailable`.
    pub async fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.write().await = unavailable;
    }

    async fn check_available(&self) -> Result<(), IndexSyncError> {
        if *self.unavailable.read().await {
            return Err(IndexSyncError::store_unavailable(
                "in-memory record store is marked unavailable",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl<E: IndexedEntity> RecordStore<E> for InMemoryRecordStore<E> {
    async fn scan_page(
        &self,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<RecordPage<E>, IndexSyncError> {
        self.check_available().await?;

        let records = self.records.read().await;
        let start = match cursor {
            Some(cursor) => Bound::Excluded(cursor.to_string()),
            None => Bound::Unbounded,
        };

        let mut remaining = records.range((start, Bound::Unbounded));
        let items: Vec<E> = remaining
            .by_ref()
            .take(limit.max(1))
            .map(|(_, record)| record.clone())
            .collect();

        let next_cursor = match remaining.next() {
            Some(_) => items.last().map(E::document_id),
            None => None,
        };

        Ok(RecordPage { items, next_cursor })
    }

    async fn fetch_by_id(&self, id: &str) -> Result<Option<E>, IndexSyncError> {
        self.check_available().await?;
        Ok(self.records.read().await.get(id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interfaces::RecordScan;
    use inventory_indexer_shared::InventoryItem;

    fn vehicles(count: usize) -> Vec<InventoryItem> {
        (0..count)
            .map(|n| InventoryItem::new("client-1", format!("VIN{:03}", n)))
            .collect()
    }

    #[tokio::test]
    async fn test_scan_pages_in_id_order() {
        let store = InMemoryRecordStore::with_records(vehicles(5).into_iter().rev());

        let first = store.scan_page(None, 2).await.unwrap();
        assert_eq!(first.items.len(), 2);
        assert_eq!(first.items[0].vin, "VIN000");
        assert_eq!(first.next_cursor.as_deref(), Some("VIN001"));

        let second = store.scan_page(first.next_cursor.as_deref(), 2).await.unwrap();
        assert_eq!(second.items[0].vin, "VIN002");

        let last = store.scan_page(second.next_cursor.as_deref(), 2).await.unwrap();
        assert_eq!(last.items.len(), 1);
        assert!(last.next_cursor.is_none());
    }

    #[tokio::test]
    async fn test_exact_page_boundary_ends_scan() {
        let store = InMemoryRecordStore::with_records(vehicles(4));
        let mut scan = RecordScan::<InventoryItem>::new(&store, 2);

        let mut pages = 0;
        while scan.next_page().await.unwrap().is_some() {
            pages += 1;
        }
        assert_eq!(pages, 2);
    }

    #[tokio::test]
    async fn test_upsert_and_remove() {
        let store = InMemoryRecordStore::new();
        store.upsert(InventoryItem::new("client-1", "VIN1")).await;
        store
            .upsert(InventoryItem::new("client-1", "VIN1").with_doors(2))
            .await;

        assert_eq!(store.len().await, 1);
        assert_eq!(store.fetch_by_id("VIN1").await.unwrap().unwrap().doors, 2);

        assert!(store.remove("VIN1").await.is_some());
        assert!(store.is_empty().await);
        assert!(store.fetch_by_id("VIN1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unavailable_store() {
        let store = InMemoryRecordStore::with_records(vehicles(1));
        store.set_unavailable(true).await;

        assert!(matches!(
            store.scan_page(None, 10).await.unwrap_err(),
            IndexSyncError::StoreUnavailable(_)
        ));
    }
}
