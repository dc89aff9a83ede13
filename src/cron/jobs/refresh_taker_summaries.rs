//! Job to refresh the cached per-taker summaries.
//!
//! Full idempotent recompute through the same rollup function the on-demand
//! path uses, so the cache and a fresh computation can never disagree on
//! anything but staleness. Safe to run concurrently with itself and with
//! ingestion; it never blocks either.

use anyhow::Result;
use chrono::Utc;
use log::info;

use crate::db::Database;
use crate::enrichment::{compute_taker_summaries, TakeEnricher};

/// Recompute every taker summary from the full ledger and upsert the result.
pub async fn run(db: &Database, enricher: &TakeEnricher) -> Result<()> {
    info!("Starting refresh_taker_summaries job...");

    let start = std::time::Instant::now();

    let takes = db.postgres.get_all_takes().await?;
    if takes.is_empty() {
        info!("No takes in ledger, nothing to summarize");
        return Ok(());
    }

    let take_count = takes.len();
    let enriched = enricher.enrich(takes).await?;
    let summaries = compute_taker_summaries(&enriched, Utc::now());

    let taker_count = summaries.len();
    db.postgres.set_taker_summaries(&summaries).await?;

    info!(
        "Completed refresh_taker_summaries job in {:?} ({} takers from {} takes)",
        start.elapsed(),
        taker_count,
        take_count
    );
    Ok(())
}
