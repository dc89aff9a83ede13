//! Cron scheduler for periodic background tasks.
//!
//! Runs jobs like:
//! - Recomputing the cached taker summaries from the ledger

use std::sync::Arc;

use anyhow::Result;
use log::{error, info};
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;

use crate::config::CronSettings;
use crate::db::Database;
use crate::enrichment::TakeEnricher;

use super::jobs;

/// Cron scheduler that manages periodic background jobs.
pub struct CronScheduler {
    db: Arc<Database>,
    enricher: TakeEnricher,
    settings: Arc<CronSettings>,
}

impl CronScheduler {
    pub fn new(db: Arc<Database>, enricher: TakeEnricher, settings: CronSettings) -> Self {
        Self {
            db,
            enricher,
            settings: Arc::new(settings),
        }
    }

    /// Starts the cron scheduler and runs until cancellation.
    pub async fn run(&self, cancellation_token: CancellationToken) -> Result<()> {
        let mut scheduler = JobScheduler::new().await?;

        // Register all jobs
        self.register_refresh_taker_summaries_job(&scheduler).await?;

        // Start the scheduler
        scheduler.start().await?;
        info!("Cron scheduler started with {} jobs", 1);

        // Wait for cancellation
        cancellation_token.cancelled().await;
        info!("Cron scheduler shutting down...");

        scheduler.shutdown().await?;
        Ok(())
    }

    async fn register_refresh_taker_summaries_job(&self, scheduler: &JobScheduler) -> Result<()> {
        let db = self.db.clone();
        let enricher = self.enricher.clone();
        let interval = self.settings.summary_refresh_interval_secs;

        let job = Job::new_repeated_async(
            std::time::Duration::from_secs(interval),
            move |_uuid, _lock| {
                let db = db.clone();
                let enricher = enricher.clone();
                Box::pin(async move {
                    if let Err(e) = jobs::refresh_taker_summaries::run(&db, &enricher).await {
                        error!("Failed to refresh taker summaries: {:#}", e);
                    }
                })
            },
        )?;

        scheduler.add(job).await?;
        info!("Registered refresh_taker_summaries job (every {}s)", interval);
        Ok(())
    }
}
