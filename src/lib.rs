pub mod config;
pub mod cron;
pub mod db;
pub mod enrichment;
pub mod ingest;
pub mod outbox;
pub mod pricing;
pub mod pubsub;
pub mod utils;

pub use config::Settings;
pub use cron::CronScheduler;
pub use db::Database;
pub use enrichment::TakeEnricher;
pub use ingest::{IngestMessage, IngestService, LedgerWriter};
pub use outbox::OutboxRelay;
pub use pricing::PriceResolver;
pub use pubsub::RedpandaPublisher;
