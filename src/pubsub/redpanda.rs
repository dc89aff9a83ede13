//! Redpanda (Kafka-compatible) publisher implementation.
//!
//! Publishes ledger change events drained from the outbox. Unlike a
//! fire-and-forget stream, delivery results are reported back to the relay:
//! the outbox row is only marked published once the broker acknowledged the
//! message.

use std::time::Duration;

use anyhow::Context;
use log::{error, info};
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use serde::Serialize;

use crate::config::RedpandaSettings;

/// Wire format consumed by the stream consumer, which dedups on
/// `idempotency_key` since delivery is at-least-once.
#[derive(Debug, Serialize)]
pub struct LedgerMessage<'a> {
    pub idempotency_key: &'a str,
    #[serde(rename = "type")]
    pub event_type: &'a str,
    pub payload: &'a serde_json::Value,
    pub version: i32,
}

/// Redpanda publisher for ledger change events.
///
/// All events go to a single `{prefix}.ledger` topic keyed by idempotency
/// key, so a single relay worker's delivery order matches ledger write order.
pub struct RedpandaPublisher {
    producer: FutureProducer,
    topic: String,
}

impl RedpandaPublisher {
    /// Create a new Redpanda publisher.
    ///
    /// Returns None if Redpanda is disabled in settings or connection fails.
    pub fn new(settings: &RedpandaSettings) -> Option<Self> {
        if !settings.enabled {
            info!("Redpanda publishing is disabled");
            return None;
        }

        info!("Connecting to Redpanda brokers: {}", settings.brokers);

        let producer: FutureProducer = match ClientConfig::new()
            .set("bootstrap.servers", &settings.brokers)
            .set("message.timeout.ms", "5000")
            .set("queue.buffering.max.messages", "100000")
            .set("linger.ms", "5") // Small delay to batch messages
            .create()
        {
            Ok(p) => p,
            Err(e) => {
                error!("Failed to create Redpanda producer: {}", e);
                return None;
            },
        };

        let topic = format!("{}.ledger", settings.topic_prefix);
        info!("Redpanda publisher initialized with topic: {}", topic);

        Some(Self {
            producer,
            topic,
        })
    }

    /// Publish one serialized ledger message.
    ///
    /// An error means the broker did not acknowledge; the caller decides
    /// whether to retry.
    pub async fn publish(&self, key: &str, body: &str) -> anyhow::Result<()> {
        let record = FutureRecord::to(&self.topic).key(key).payload(body);

        self.producer
            .send(record, Duration::from_secs(5))
            .await
            .map_err(|(e, _)| e)
            .with_context(|| format!("failed to deliver {} to {}", key, self.topic))?;

        Ok(())
    }

    /// Flush any pending messages (call on shutdown).
    pub fn flush(&self) {
        self.producer.flush(Duration::from_secs(5)).ok();
    }
}

impl Drop for RedpandaPublisher {
    fn drop(&mut self) {
        self.flush();
    }
}
