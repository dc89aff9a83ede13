use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One sale cycle of an auction (PostgreSQL)
///
/// Primary Key: (auction_address, chain_id, round_id)
/// Query Pattern: "Get round N of auction X", "List recent rounds"
///
/// `available_amount` and `total_volume_sold` are owned by the round
/// aggregator and mutated only inside the take-insert transaction.
/// Invariant: available_amount = max(0, initial_available - total_volume_sold).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Round {
    // Primary key
    pub auction_address: String,
    pub chain_id: i64,
    pub round_id: i64,

    // Kick parameters
    pub from_token: String,
    pub initial_available: f64,
    pub initial_available_raw: String,
    pub kicked_at: DateTime<Utc>,

    // Aggregator-owned running state
    pub available_amount: f64,
    pub total_volume_sold: f64,
    pub take_count: i64,

    // Origin event (natural key for inconsistency detection)
    pub block_number: i64,
    pub log_index: i64,
    pub transaction_hash: String,

    pub updated_at: DateTime<Utc>,
}
