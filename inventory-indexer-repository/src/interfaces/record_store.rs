//! Record store trait definition.
//!
//! The record store is the source of truth the search index is rebuilt from.

use async_trait::async_trait;

use crate::errors::IndexSyncError;
use crate::types::RecordPage;

/// Abstracts the table that holds the authoritative records.
#[async_trait]
pub trait RecordStore<E>: Send + Sync {
    /// Fetch one page of records.
    ///
    /// `cursor` is `None` for the first page and the previous page's
    /// `next_cursor` afterwards. Each page fetch may fail with
    /// `StoreUnavailable`.
    async fn scan_page(
        &self,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<RecordPage<E>, IndexSyncError>;

    /// Fetch a single record by its identifier.
    async fn fetch_by_id(&self, id: &str) -> Result<Option<E>, IndexSyncError>;
}

/// A lazy, paged scan over every record in a store.
///
/// The scan is finite and not restartable: once a page fetch fails the caller
/// starts a new scan.
pub struct RecordScan<'a, E> {
    store: &'a dyn RecordStore<E>,
    cursor: Option<String>,
    page_size: usize,
    done: bool,
}

impl<'a, E> RecordScan<'a, E> {
    pub fn new(store: &'a dyn RecordStore<E>, page_size: usize) -> Self {
        Self {
            store,
            cursor: None,
            page_size: page_size.max(1),
            done: false,
        }
    }

    /// Fetch the next page, `None` once the scan is complete.
    pub async fn next_page(&mut self) -> Result<Option<Vec<E>>, IndexSyncError> {
        if self.done {
            return Ok(None);
        }

        let page = self
            .store
            .scan_page(self.cursor.as_deref(), self.page_size)
            .await?;

        match page.next_cursor {
            Some(cursor) => self.cursor = Some(cursor),
            None => self.done = true,
        }

        Ok(Some(page.items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves numbers 0..total in pages, keyed by the last number seen.
    struct CountingStore {
        total: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RecordStore<usize> for CountingStore {
        async fn scan_page(
            &self,
            cursor: Option<&str>,
            limit: usize,
        ) -> Result<RecordPage<usize>, IndexSyncError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let start = match cursor {
                Some(c) => c.parse::<usize>().unwrap() + 1,
                None => 0,
            };
            let items: Vec<usize> = (start..self.total).take(limit).collect();
            let next_cursor = match items.last() {
                Some(last) if last + 1 < self.total => Some(last.to_string()),
                _ => None,
            };
            Ok(RecordPage { items, next_cursor })
        }

        async fn fetch_by_id(&self, id: &str) -> Result<Option<usize>, IndexSyncError> {
            Ok(id.parse::<usize>().ok().filter(|n| *n < self.total))
        }
    }

    #[tokio::test]
    async fn test_scan_visits_every_page() {
        let store = CountingStore {
            total: 7,
            calls: AtomicUsize::new(0),
        };
        let mut scan = RecordScan::<usize>::new(&store, 3);

        let mut seen = Vec::new();
        while let Some(page) = scan.next_page().await.unwrap() {
            seen.extend(page);
        }

        assert_eq!(seen, (0..7).collect::<Vec<_>>());
        assert_eq!(store.calls.load(Ordering::SeqCst), 3);
        // Exhausted scans stay exhausted
        assert!(scan.next_page().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_scan_of_empty_store_yields_one_empty_page() {
        let store = CountingStore {
            total: 0,
            calls: AtomicUsize::new(0),
        };
        let mut scan = RecordScan::<usize>::new(&store, 10);

        assert_eq!(scan.next_page().await.unwrap(), Some(vec![]));
        assert!(scan.next_page().await.unwrap().is_none());
    }
}
