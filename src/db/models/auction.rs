use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::normalize_address;

/// Deployed auction contract (PostgreSQL)
///
/// Primary Key: (auction_address, chain_id)
/// Query Pattern: "Get auction parameters for address X on chain Y"
///
/// Immutable once created: the deployer, want token, and decay parameters are
/// fixed at deployment and redelivered creation events are no-ops.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Auction {
    // Primary key
    pub auction_address: String,
    pub chain_id: i64,

    // Deployment metadata (immutable)
    pub deployer: String,
    pub want_token: String,
    pub decay_rate: Option<f64>,
    pub update_interval: Option<i64>,
    pub auction_length: Option<i64>,

    // Origin event
    pub deployed_at: DateTime<Utc>,
    pub block_number: i64,
    pub transaction_hash: String,
}

impl Auction {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        auction_address: String,
        chain_id: i64,
        deployer: String,
        want_token: String,
        decay_rate: Option<f64>,
        update_interval: Option<i64>,
        auction_length: Option<i64>,
        deployed_at: DateTime<Utc>,
        block_number: i64,
        transaction_hash: String,
    ) -> Self {
        Self {
            // Always lowercase addresses for consistent comparisons
            auction_address: normalize_address(&auction_address),
            chain_id,
            deployer: normalize_address(&deployer),
            want_token: normalize_address(&want_token),
            decay_rate,
            update_interval,
            auction_length,
            deployed_at,
            block_number,
            transaction_hash,
        }
    }
}
