use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Transactional change-log entry (PostgreSQL)
///
/// Appended in the same transaction as every accepted ledger write and
/// drained asynchronously by the outbox relay. `published_at IS NULL` means
/// pending. Entries are never deleted; entries past the retry bound carry
/// `failed_permanently = true` and wait for manual inspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub id: i64,
    pub event_type: String,
    pub idempotency_key: String,
    pub payload: serde_json::Value,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
    pub retry_count: i32,
    pub last_error: Option<String>,
    pub next_attempt_at: DateTime<Utc>,
    pub failed_permanently: bool,
}

/// Build the deterministic idempotency key for an originating event.
///
/// The consumer dedups on this key, so it must be stable across re-scans and
/// redeliveries: derived purely from the event's on-chain origin, never from
/// ingestion state.
pub fn idempotency_key(
    chain_id: i64,
    transaction_hash: &str,
    log_index: i64,
    event_type: &str,
) -> String {
    format!(
        "{}:{}:{}:{}",
        chain_id,
        transaction_hash.to_lowercase(),
        log_index,
        event_type
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idempotency_key_is_deterministic() {
        let a = idempotency_key(1, "0xABC", 7, "take");
        let b = idempotency_key(1, "0xabc", 7, "take");
        assert_eq!(a, b);
        assert_eq!(a, "1:0xabc:7:take");
    }

    #[test]
    fn test_idempotency_key_distinguishes_event_types() {
        // A kick and a take can share a transaction; the type keeps them apart.
        let kick = idempotency_key(1, "0xabc", 7, "round_kicked");
        let take = idempotency_key(1, "0xabc", 7, "take");
        assert_ne!(kick, take);
    }
}
