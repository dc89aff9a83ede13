use std::sync::Arc;

use crate::config::Settings;

pub mod models;
pub mod postgres;

pub use postgres::{PostgresClient, RankDimension};

/// Database handle for the auction ledger.
///
/// A single PostgreSQL database holds the relational ledger (auctions,
/// rounds, takes), price observations, the transactional outbox, scan
/// checkpoints, and the cached taker summaries.
#[derive(Clone)]
pub struct Database {
    pub postgres: Arc<PostgresClient>,
}

impl Database {
    pub async fn new(settings: Arc<Settings>) -> anyhow::Result<Self> {
        let postgres = PostgresClient::new(settings.postgres.clone()).await?;

        // Run migrations
        postgres.migrate().await?;

        Ok(Self {
            postgres: Arc::new(postgres),
        })
    }
}
