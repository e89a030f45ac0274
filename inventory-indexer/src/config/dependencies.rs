//! Dependency initialization and wiring for the inventory indexer.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use inventory_indexer_repository::{
    DocumentStore, IndexDescriptor, IndexSynchronizer, OpenSearchDocumentStore,
    PostgresRecordStore,
};
use inventory_indexer_shared::{IndexedEntity, InventoryItem};

use crate::config::{ConnectionMode, IndexerConfig};
use crate::consumer::KafkaChangeFeed;
use crate::orchestrator::{Orchestrator, OrchestratorConfig};
use crate::processor::{ChangeEventProcessor, FullRefreshProcessor};
use crate::IndexingError;

/// Container for all initialized dependencies.
pub struct Dependencies {
    /// The configured orchestrator ready to run.
    pub orchestrator: Orchestrator<InventoryItem>,
}

impl Dependencies {
    /// Connect every backing service and wire the orchestrator.
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - Initialized dependencies
    /// * `Err(IndexingError)` - If initialization fails (OpenSearch only fails in fail-fast mode)
    pub async fn new(config: IndexerConfig) -> Result<Self, IndexingError> {
        info!(
            opensearch_url = %config.opensearch_url,
            kafka_broker = %config.kafka_broker,
            kafka_group_id = %config.kafka_group_id,
            change_feed_topic = %config.change_feed_topic,
            connection_mode = ?config.connection_mode,
            retry_interval_secs = config.retry_interval.as_secs(),
            "Initializing dependencies"
        );

        let sync_config = config.sync_config();
        let descriptor = IndexDescriptor::resolve(&sync_config, InventoryItem::KIND)
            .map_err(|e| IndexingError::config(e.to_string()))?;

        let documents = Self::connect_to_opensearch(
            &config.opensearch_url,
            config.connection_mode,
            config.retry_interval,
        )
        .await?;

        info!("OpenSearch connection established");

        // The record table shares the index's prefixed name
        let records = PostgresRecordStore::connect(&config.database_url, descriptor.index_name())
            .await
            .map_err(|e| IndexingError::config(format!("Failed to connect to PostgreSQL: {}", e)))?;

        info!(table = %records.table(), "PostgreSQL record store ready");

        let synchronizer = Arc::new(
            IndexSynchronizer::<InventoryItem>::new(
                Arc::new(documents),
                Arc::new(records),
                sync_config,
            )
            .map_err(|e| IndexingError::config(e.to_string()))?,
        );

        // Exits if the index cannot be created
        synchronizer
            .ensure_index_exists()
            .await
            .map_err(|e| IndexingError::config(format!("Failed to ensure index exists: {}", e)))?;

        let feed = KafkaChangeFeed::new(
            &config.kafka_broker,
            &config.kafka_group_id,
            &config.change_feed_topic,
        )
        .map_err(|e| IndexingError::config(format!("Failed to create Kafka consumer: {}", e)))?;

        info!("Kafka change feed created");

        let orchestrator = Orchestrator::with_config(
            Arc::new(feed),
            ChangeEventProcessor::new(synchronizer.clone()),
            FullRefreshProcessor::new(synchronizer),
            OrchestratorConfig {
                refresh_interval: config.refresh_interval,
                refresh_on_startup: config.refresh_on_startup,
                ..OrchestratorConfig::default()
            },
        );

        Ok(Self { orchestrator })
    }

    /// Connect to OpenSearch with retry logic based on connection mode.
    async fn connect_to_opensearch(
        url: &str,
        mode: ConnectionMode,
        retry_interval: Duration,
    ) -> Result<OpenSearchDocumentStore, IndexingError> {
        loop {
            match Self::try_connect_opensearch(url).await {
                Ok(store) => return Ok(store),
                Err(e) => match mode {
                    ConnectionMode::FailFast => {
                        return Err(IndexingError::config(format!(
                            "Failed to connect to OpenSearch: {}",
                            e
                        )));
                    }
                    ConnectionMode::Retry => {
                        warn!(
                            opensearch_url = %url,
                            error = %e,
                            retry_interval_secs = retry_interval.as_secs(),
                            "Failed to connect to OpenSearch, retrying..."
                        );
                        sleep(retry_interval).await;
                    }
                },
            }
        }
    }

    /// Attempt to connect to OpenSearch and verify it answers.
    async fn try_connect_opensearch(url: &str) -> Result<OpenSearchDocumentStore, IndexingError> {
        let store = OpenSearchDocumentStore::new(url)
            .await
            .map_err(|e| IndexingError::config(format!("Failed to create OpenSearch client: {}", e)))?;

        // The client connects lazily; a cheap request proves the cluster is reachable
        store
            .index_exists("_all")
            .await
            .map_err(|e| IndexingError::config(format!("OpenSearch is unreachable: {}", e)))?;

        Ok(store)
    }
}
