//! Pub/Sub messaging module for ledger change streaming.
//!
//! Provides Redpanda (Kafka-compatible) integration for publishing outbox
//! entries to the downstream stream consumer.

mod redpanda;

pub use redpanda::{LedgerMessage, RedpandaPublisher};
