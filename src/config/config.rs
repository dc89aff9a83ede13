use config::{Config, ConfigError, File};
use serde::Deserialize;

/// PostgreSQL database connection configuration.
///
/// The ledger, price observations, outbox, and all derived analytics live in
/// a single PostgreSQL database.
#[derive(Debug, Deserialize, Clone)]
pub struct PostgresSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

fn default_pool_size() -> usize {
    16
}

/// Redpanda (Kafka-compatible) pub/sub configuration.
///
/// The outbox relay delivers ledger change events to a Redpanda topic.
/// When disabled, accepted writes still accumulate in the outbox and are
/// drained once a publisher becomes available.
#[derive(Debug, Deserialize, Clone)]
pub struct RedpandaSettings {
    /// Enable/disable Redpanda publishing
    #[serde(default)]
    pub enabled: bool,
    /// Comma-separated list of broker addresses (e.g., "localhost:9092")
    #[serde(default = "default_redpanda_brokers")]
    pub brokers: String,
    /// Topic name prefix (topic: {prefix}.ledger)
    #[serde(default = "default_redpanda_topic_prefix")]
    pub topic_prefix: String,
}

fn default_redpanda_brokers() -> String {
    "localhost:9092".to_string()
}

fn default_redpanda_topic_prefix() -> String {
    "gavel".to_string()
}

/// Outbox relay worker configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct RelaySettings {
    /// How often each worker polls for pending outbox entries
    #[serde(default = "default_relay_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Maximum entries claimed per poll
    #[serde(default = "default_relay_page_size")]
    pub page_size: i64,
    /// Delivery attempts before an entry is flagged for manual inspection
    #[serde(default = "default_relay_max_retries")]
    pub max_retries: i32,
    /// Number of concurrent relay workers
    #[serde(default = "default_relay_workers")]
    pub workers: usize,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_relay_poll_interval_ms(),
            page_size: default_relay_page_size(),
            max_retries: default_relay_max_retries(),
            workers: default_relay_workers(),
        }
    }
}

fn default_relay_poll_interval_ms() -> u64 {
    500
}

fn default_relay_page_size() -> i64 {
    100
}

fn default_relay_max_retries() -> i32 {
    10
}

fn default_relay_workers() -> usize {
    1
}

/// Configuration for periodic background jobs.
#[derive(Debug, Deserialize, Clone)]
pub struct CronSettings {
    /// Interval for recomputing the cached taker summaries - default 5 minutes.
    /// Summaries are a pure cache over takes + token_prices, so this interval
    /// is the staleness bound, not a correctness knob.
    #[serde(default = "default_summary_refresh_interval_secs")]
    pub summary_refresh_interval_secs: u64,
}

impl Default for CronSettings {
    fn default() -> Self {
        Self {
            summary_refresh_interval_secs: default_summary_refresh_interval_secs(),
        }
    }
}

fn default_summary_refresh_interval_secs() -> u64 {
    300 // 5 minutes
}

/// Root application configuration.
///
/// Loaded from `config.yaml` at startup.
/// Contains all subsystem configurations for storage, publication, and jobs.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub postgres: PostgresSettings,
    #[serde(default)]
    pub redpanda: Option<RedpandaSettings>,
    #[serde(default)]
    pub relay: RelaySettings,
    #[serde(default)]
    pub cron: CronSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name("config"))
            .build()?;

        let settings: Settings = s.try_deserialize()?;

        Ok(settings)
    }
}
