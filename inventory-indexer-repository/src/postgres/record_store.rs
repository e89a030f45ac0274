//! PostgreSQL implementation of the inventory record store.
//!
//! Records live in a single table named after the environment-prefixed base
//! table (e.g. `prod_vehicle_inventory`) with one row per vehicle, keyed by
//! `vin`. Scans use keyset pagination on `vin` so pages stay stable while the
//! table is written to.
use async_trait::async_trait;
use inventory_indexer_shared::InventoryItem;
use tracing::{debug, error, instrument};

use crate::errors::IndexSyncError;
use crate::interfaces::RecordStore;
use crate::types::RecordPage;
use crate::utils::validate_table_name;

const SELECT_COLUMNS: &str =
    "client_identifier, vin, body, book_value, certified, doors, drive_type";

/// Row shape of the inventory table.
#[derive(Debug, sqlx::FromRow)]
struct InventoryRow {
    client_identifier: String,
    vin: String,
    body: Option<String>,
    book_value: Option<String>,
    certified: Option<String>,
    doors: Option<i32>,
    drive_type: Option<String>,
}

impl From<InventoryRow> for InventoryItem {
    fn from(row: InventoryRow) -> Self {
        Self {
            client_identifier: row.client_identifier,
            vin: row.vin,
            body: row.body,
            book_value: row.book_value,
            certified: row.certified,
            doors: row.doors.unwrap_or_default(),
            drive_type: row.drive_type,
        }
    }
}

/// PostgreSQL record store for inventory items.
pub struct PostgresRecordStore {
    pool: sqlx::PgPool,
    table: String,
}

impl PostgresRecordStore {
    /// Creates a record store over `table` using an existing pool.
    ///
    /// # Returns
    ///
    /// * `Ok(PostgresRecordStore)` - Ready-to-use store
    /// * `Err(IndexSyncError::ConfigurationError)` - If the table name is not a
    ///   plain SQL identifier
    pub fn new(pool: sqlx::PgPool, table: impl Into<String>) -> Result<Self, IndexSyncError> {
        let table = table.into();
        validate_table_name(&table)?;
        Ok(Self { pool, table })
    }

    /// Connects to the database at `url` and creates a record store over `table`.
    pub async fn connect(url: &str, table: impl Into<String>) -> Result<Self, IndexSyncError> {
        let table = table.into();
        validate_table_name(&table)?;
        let pool = sqlx::PgPool::connect(url)
            .await
            .map_err(|e| IndexSyncError::store_unavailable(e.to_string()))?;
        Ok(Self { pool, table })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn scan_query(&self) -> String {
        format!(
            "SELECT {} FROM {} WHERE ($1::TEXT IS NULL OR vin > $1) ORDER BY vin LIMIT $2",
            SELECT_COLUMNS, self.table
        )
    }

    fn fetch_query(&self) -> String {
        format!("SELECT {} FROM {} WHERE vin = $1", SELECT_COLUMNS, self.table)
    }
}

#[async_trait]
impl RecordStore<InventoryItem> for PostgresRecordStore {
    #[instrument(skip(self), fields(table = %self.table))]
    async fn scan_page(
        &self,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<RecordPage<InventoryItem>, IndexSyncError> {
        let limit = limit.max(1);
        let rows: Vec<InventoryRow> = sqlx::query_as(&self.scan_query())
            .bind(cursor)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                error!(error = %e, "Record scan page failed");
                IndexSyncError::store_unavailable(e.to_string())
            })?;

        // A short page means the table is exhausted
        let next_cursor = if rows.len() == limit {
            rows.last().map(|row| row.vin.clone())
        } else {
            None
        };

        debug!(rows = rows.len(), has_more = next_cursor.is_some(), "Fetched record page");

        Ok(RecordPage {
            items: rows.into_iter().map(InventoryItem::from).collect(),
            next_cursor,
        })
    }

    async fn fetch_by_id(&self, id: &str) -> Result<Option<InventoryItem>, IndexSyncError> {
        let row: Option<InventoryRow> = sqlx::query_as(&self.fetch_query())
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| IndexSyncError::store_unavailable(e.to_string()))?;

        Ok(row.map(InventoryItem::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lazy_pool() -> sqlx::PgPool {
        sqlx::PgPool::connect_lazy("postgres://localhost/inventory").unwrap()
    }

    #[tokio::test]
    async fn test_new_rejects_unsafe_table_name() {
        let result = PostgresRecordStore::new(lazy_pool(), "dev_vehicle_inventory; DROP TABLE x");
        assert!(matches!(
            result.err(),
            Some(IndexSyncError::ConfigurationError(_))
        ));
    }

    #[tokio::test]
    async fn test_queries_use_configured_table() {
        let store = PostgresRecordStore::new(lazy_pool(), "prod_vehicle_inventory").unwrap();

        assert_eq!(store.table(), "prod_vehicle_inventory");
        assert_eq!(
            store.scan_query(),
            "SELECT client_identifier, vin, body, book_value, certified, doors, drive_type \
             FROM prod_vehicle_inventory WHERE ($1::TEXT IS NULL OR vin > $1) ORDER BY vin LIMIT $2"
        );
        assert!(store.fetch_query().ends_with("FROM prod_vehicle_inventory WHERE vin = $1"));
    }

    #[test]
    fn test_row_conversion_defaults_missing_doors() {
        let row = InventoryRow {
            client_identifier: "client-1".to_string(),
            vin: "VIN123".to_string(),
            body: Some("Sedan".to_string()),
            book_value: None,
            certified: Some("yes".to_string()),
            doors: None,
            drive_type: Some("AWD".to_string()),
        };

        let item = InventoryItem::from(row);

        assert_eq!(item.vin, "VIN123");
        assert_eq!(item.doors, 0);
        assert_eq!(item.body.as_deref(), Some("Sedan"));
        assert_eq!(item.book_value, None);
    }
}
