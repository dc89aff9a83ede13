mod auction;
mod checkpoint;
mod inconsistency;
mod outbox;
mod round;
mod take;
mod taker_summary;
mod token_price;

pub use auction::Auction;
pub use checkpoint::ScanCheckpoint;
pub use inconsistency::Inconsistency;
pub use outbox::{idempotency_key, OutboxEntry};
pub use round::Round;
pub use take::Take;
pub use taker_summary::TakerSummary;
pub use token_price::TokenPrice;
