use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single purchase against an active round (PostgreSQL)
///
/// Primary Key: (chain_id, transaction_hash, log_index) - the natural key of
/// the on-chain event, and the dedup authority for re-ingestion.
///
/// `take_seq` starts at 1 per round and always reflects the chronological
/// (block_number, log_index) order, regardless of ingestion order. Takes are
/// immutable once written; only their sequence number may shift when an
/// earlier take arrives late.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Take {
    // Natural key
    pub chain_id: i64,
    pub transaction_hash: String,
    pub log_index: i64,

    // Round membership and chronological rank
    pub auction_address: String,
    pub round_id: i64,
    pub take_seq: i64,

    // Trade
    pub taker: String,
    pub from_token: String,
    pub to_token: String,
    pub amount_taken: f64,
    pub amount_taken_raw: String,
    pub amount_paid: f64,
    pub amount_paid_raw: String,
    pub price: Option<f64>,

    // Timing
    pub timestamp: DateTime<Utc>,
    pub seconds_from_round_start: i64,
    pub block_number: i64,
}
