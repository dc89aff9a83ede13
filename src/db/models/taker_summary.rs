use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-taker rollup (PostgreSQL cache table)
///
/// Primary Key: taker
/// Query Pattern: "Leaderboard ordered by takes / volume / profit"
///
/// A pure cache: fully re-derivable from takes + token_prices at any time.
/// The cron refresh replaces the whole table; readers never see partial rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TakerSummary {
    pub taker: String,

    // Lifetime counts
    pub total_takes: i64,
    pub unique_auctions: i64,
    pub unique_chains: i64,
    pub active_chains: Vec<i64>,

    // USD aggregates (None when no take could be priced)
    pub total_volume_usd: Option<f64>,
    pub total_profit_usd: Option<f64>,
    pub avg_take_size_usd: Option<f64>,

    // Activity
    pub first_take: Option<DateTime<Utc>>,
    pub last_take: Option<DateTime<Utc>>,

    // Recency windows, relative to evaluation time
    pub takes_last_7d: i64,
    pub takes_last_30d: i64,
    pub volume_last_7d: Option<f64>,
    pub volume_last_30d: Option<f64>,

    // Dense ranks; ordering ties broken by ascending taker address
    pub rank_by_takes: Option<i64>,
    pub rank_by_volume: Option<i64>,
    pub rank_by_profit: Option<i64>,

    pub computed_at: DateTime<Utc>,
}
