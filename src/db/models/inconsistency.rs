use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Operator-queue record of a logical key arriving with conflicting natural
/// keys (PostgreSQL).
///
/// Indicates upstream scanner or chain-state confusion. Never auto-resolved:
/// rows stay until an operator inspects them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inconsistency {
    pub id: i64,
    pub chain_id: i64,
    pub auction_address: String,
    pub round_id: i64,
    pub existing_tx_hash: Option<String>,
    pub existing_log_index: Option<i64>,
    pub incoming_tx_hash: String,
    pub incoming_log_index: i64,
    pub detail: String,
    pub created_at: DateTime<Utc>,
}
