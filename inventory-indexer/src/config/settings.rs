//! Indexer configuration read from the environment.

use std::env;
use std::time::Duration;

use inventory_indexer_repository::config::DEFAULT_SCAN_PAGE_SIZE;
use inventory_indexer_repository::SyncConfig;
use tracing::warn;

use crate::IndexingError;

/// Default OpenSearch URL.
const DEFAULT_OPENSEARCH_URL: &str = "http://localhost:9200";

/// Default Kafka broker address.
const DEFAULT_KAFKA_BROKER: &str = "localhost:9092";

/// Default Kafka consumer group ID.
const DEFAULT_KAFKA_GROUP_ID: &str = "inventory-indexer";

/// Default topic carrying the inventory table's change records.
const DEFAULT_CHANGE_FEED_TOPIC: &str = "inventory.changes";

/// Default connection retry interval in seconds.
const DEFAULT_RETRY_INTERVAL_SECS: u64 = 15;

/// Connection mode for OpenSearch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMode {
    /// Fail immediately if connection fails.
    FailFast,
    /// Retry connection until successful.
    Retry,
}

impl ConnectionMode {
    /// Parse a connection mode.
    ///
    /// Valid values: "fail-fast" or "retry" (case-insensitive).
    /// Defaults to "retry" if not set or invalid.
    fn parse(value: Option<&str>) -> Self {
        match value.unwrap_or("retry").to_lowercase().as_str() {
            "fail-fast" | "failfast" | "fail_fast" => Self::FailFast,
            "retry" => Self::Retry,
            other => {
                warn!(value = %other, "Invalid OPENSEARCH_CONNECTION_MODE, defaulting to 'retry'");
                Self::Retry
            }
        }
    }
}

/// Process configuration, read once at startup and passed down.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    pub opensearch_url: String,
    pub database_url: String,
    pub kafka_broker: String,
    pub kafka_group_id: String,
    pub change_feed_topic: String,
    /// Deployment environment, used as the index and table prefix.
    pub environment: Option<String>,
    /// Period of the full refresh, `None` disables it.
    pub refresh_interval: Option<Duration>,
    /// Run a full refresh before consuming the change feed.
    pub refresh_on_startup: bool,
    pub scan_page_size: usize,
    pub max_bulk_size: Option<usize>,
    pub connection_mode: ConnectionMode,
    pub retry_interval: Duration,
}

impl IndexerConfig {
    /// Read the configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `OPENSEARCH_URL`: OpenSearch server URL (default: http://localhost:9200)
    /// - `DATABASE_URL`: PostgreSQL connection URL (required)
    /// - `KAFKA_BROKER`: Kafka broker address (default: localhost:9092)
    /// - `KAFKA_GROUP_ID`: Consumer group ID (default: inventory-indexer)
    /// - `CHANGE_FEED_TOPIC`: Change record topic (default: inventory.changes)
    /// - `ENVIRONMENT`: Index and table prefix (default: dev)
    /// - `REFRESH_INTERVAL_SECS`: Full refresh period in seconds (default: disabled)
    /// - `REFRESH_ON_STARTUP`: Run a full refresh at startup (default: false)
    /// - `SCAN_PAGE_SIZE`: Records per page during a refresh (default: 500)
    /// - `MAX_BULK_SIZE`: Operations per bulk request during a refresh (default: unlimited)
    /// - `OPENSEARCH_CONNECTION_MODE`: "fail-fast" or "retry" (default: retry)
    /// - `OPENSEARCH_RETRY_INTERVAL_SECS`: Retry interval in seconds (default: 15)
    ///
    /// # Returns
    ///
    /// * `Ok(IndexerConfig)` - The parsed configuration
    /// * `Err(IndexingError)` - If a required variable is missing or a value is malformed
    pub fn from_env() -> Result<Self, IndexingError> {
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| IndexingError::config("DATABASE_URL must be set"))?;

        Ok(Self {
            opensearch_url: env_or("OPENSEARCH_URL", DEFAULT_OPENSEARCH_URL),
            database_url,
            kafka_broker: env_or("KAFKA_BROKER", DEFAULT_KAFKA_BROKER),
            kafka_group_id: env_or("KAFKA_GROUP_ID", DEFAULT_KAFKA_GROUP_ID),
            change_feed_topic: env_or("CHANGE_FEED_TOPIC", DEFAULT_CHANGE_FEED_TOPIC),
            environment: parse_environment(env::var("ENVIRONMENT").ok())?,
            refresh_interval: parse_env::<u64>("REFRESH_INTERVAL_SECS")?
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            refresh_on_startup: parse_env::<bool>("REFRESH_ON_STARTUP")?.unwrap_or(false),
            scan_page_size: parse_env::<usize>("SCAN_PAGE_SIZE")?
                .unwrap_or(DEFAULT_SCAN_PAGE_SIZE),
            max_bulk_size: parse_env::<usize>("MAX_BULK_SIZE")?,
            connection_mode: ConnectionMode::parse(
                env::var("OPENSEARCH_CONNECTION_MODE").ok().as_deref(),
            ),
            retry_interval: Duration::from_secs(
                parse_env::<u64>("OPENSEARCH_RETRY_INTERVAL_SECS")?
                    .unwrap_or(DEFAULT_RETRY_INTERVAL_SECS),
            ),
        })
    }

    /// Synchronizer configuration derived from this configuration.
    pub fn sync_config(&self) -> SyncConfig {
        let mut config = SyncConfig::default().with_scan_page_size(self.scan_page_size);
        config.environment = self.environment.clone();
        config.max_bulk_size = self.max_bulk_size;
        config
    }
}

/// Read the environment prefix, which becomes part of the index and table names.
///
/// Must start with a lowercase letter and contain only lowercase letters,
/// digits and underscores.
fn parse_environment(raw: Option<String>) -> Result<Option<String>, IndexingError> {
    let Some(environment) = raw.map(|e| e.trim().to_string()).filter(|e| !e.is_empty()) else {
        return Ok(None);
    };

    let mut chars = environment.chars();
    let valid_start = chars.next().is_some_and(|c| c.is_ascii_lowercase());
    if !valid_start || !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_') {
        return Err(IndexingError::config(format!(
            "Invalid ENVIRONMENT '{}': use lowercase letters, digits and underscores, starting with a letter",
            environment
        )));
    }

    Ok(Some(environment))
}

fn env_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Parse an optional environment variable, failing on malformed values.
fn parse_env<T: std::str::FromStr>(name: &str) -> Result<Option<T>, IndexingError>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| IndexingError::config(format!("Invalid {} '{}': {}", name, raw, e))),
        _ => Ok(None),
    }
}
