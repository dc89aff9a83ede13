pub mod aggregator;
pub mod event;
pub mod sequence;
pub mod service;
pub mod writer;

pub use event::{
    AuctionCreatedEvent, IngestOutcome, LifecycleEvent, RoundKickedEvent, TakeExecutedEvent,
};
pub use service::{IngestMessage, IngestService};
pub use writer::LedgerWriter;
