use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Scanner progress checkpoint (PostgreSQL).
///
/// Tracks the configured start block and the last successfully indexed block
/// for each (chain, source) pair. Used by the chain scanner to resume after
/// restarts without missing or duplicating data; the ledger stores this state
/// on the scanner's behalf but has no opinion on how it is produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanCheckpoint {
    pub chain_id: i64,
    pub source_id: String,
    pub start_block: i64,
    pub last_indexed_block: i64,
    pub updated_at: DateTime<Utc>,
}

impl ScanCheckpoint {
    pub fn new(chain_id: i64, source_id: String, start_block: i64, last_indexed_block: i64) -> Self {
        Self {
            chain_id,
            source_id,
            start_block,
            last_indexed_block,
            updated_at: Utc::now(),
        }
    }
}
