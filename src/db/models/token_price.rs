use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::normalize_address;

/// Historical USD price observation from an external source (PostgreSQL)
///
/// Unique: (chain_id, token_address, block_number, source)
/// Query Pattern: "Best known price for token X at or before block N"
///
/// Append-only. Multiple sources reporting the same token/block is expected;
/// the resolver's priority policy picks among them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPrice {
    pub chain_id: i64,
    pub token_address: String,
    pub block_number: i64,
    pub source: String,
    pub price_usd: f64,
    pub observed_at: DateTime<Utc>,
}

impl TokenPrice {
    pub fn new(
        chain_id: i64,
        token_address: String,
        block_number: i64,
        source: String,
        price_usd: f64,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            chain_id,
            token_address: normalize_address(&token_address),
            block_number,
            source,
            price_usd,
            observed_at,
        }
    }
}
