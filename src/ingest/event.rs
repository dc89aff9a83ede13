use serde::{Deserialize, Serialize};

/// Outcome of ingesting one lifecycle event.
///
/// `Duplicate` is expected and harmless: the scanner may legitimately
/// redeliver. `Inconsistent` means the same logical key arrived with a
/// different on-chain origin and was parked in the operator queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Accepted,
    Duplicate,
    Inconsistent,
}

/// Auction contract deployment event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuctionCreatedEvent {
    pub chain_id: i64,
    pub block_number: i64,
    pub log_index: i64,
    pub timestamp: i64,
    pub transaction_hash: String,

    pub auction_address: String,
    pub deployer: String,
    pub want_token: String,
    pub decay_rate: Option<f64>,
    pub update_interval: Option<i64>,
    pub auction_length: Option<i64>,
}

/// Round start (kick) event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundKickedEvent {
    pub chain_id: i64,
    pub block_number: i64,
    pub log_index: i64,
    pub timestamp: i64,
    pub transaction_hash: String,

    pub auction_address: String,
    pub round_id: i64,
    pub from_token: String,
    pub from_token_decimals: u8,
    pub initial_available_raw: String,
}

/// Single purchase against an active round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TakeExecutedEvent {
    pub chain_id: i64,
    pub block_number: i64,
    pub log_index: i64,
    pub timestamp: i64,
    pub transaction_hash: String,

    pub auction_address: String,
    pub round_id: i64,
    pub taker: String,
    pub from_token: String,
    pub from_token_decimals: u8,
    pub want_token: String,
    pub want_token_decimals: u8,
    pub amount_taken_raw: String,
    pub amount_paid_raw: String,
}

/// Typed lifecycle event pushed by the chain scanner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LifecycleEvent {
    AuctionCreated(AuctionCreatedEvent),
    RoundKicked(RoundKickedEvent),
    TakeExecuted(TakeExecutedEvent),
}

impl LifecycleEvent {
    /// Stable event type label, used for outbox rows and idempotency keys.
    pub fn event_type(&self) -> &'static str {
        match self {
            LifecycleEvent::AuctionCreated(_) => "auction_created",
            LifecycleEvent::RoundKicked(_) => "round_kicked",
            LifecycleEvent::TakeExecuted(_) => "take",
        }
    }

    pub fn chain_id(&self) -> i64 {
        match self {
            LifecycleEvent::AuctionCreated(e) => e.chain_id,
            LifecycleEvent::RoundKicked(e) => e.chain_id,
            LifecycleEvent::TakeExecuted(e) => e.chain_id,
        }
    }

    pub fn transaction_hash(&self) -> &str {
        match self {
            LifecycleEvent::AuctionCreated(e) => &e.transaction_hash,
            LifecycleEvent::RoundKicked(e) => &e.transaction_hash,
            LifecycleEvent::TakeExecuted(e) => &e.transaction_hash,
        }
    }

    pub fn log_index(&self) -> i64 {
        match self {
            LifecycleEvent::AuctionCreated(e) => e.log_index,
            LifecycleEvent::RoundKicked(e) => e.log_index,
            LifecycleEvent::TakeExecuted(e) => e.log_index,
        }
    }
}
