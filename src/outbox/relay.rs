//! Outbox relay: drains the transactional change log to the stream consumer.
//!
//! Each worker repeatedly claims a page of pending entries (`FOR UPDATE SKIP
//! LOCKED`, id ascending), delivers them, and marks successes as published.
//! Failures are retried with exponential backoff up to a bound, then flagged
//! for manual inspection. Entries are never dropped; crashing anywhere
//! between delivery and commit re-delivers, which the consumer absorbs via
//! the idempotency key.

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use log::{debug, error, info, warn};
use tokio_util::sync::CancellationToken;

use crate::config::RelaySettings;
use crate::db::models::OutboxEntry;
use crate::db::postgres::ops::row_to_outbox_entry;
use crate::db::PostgresClient;
use crate::pubsub::{LedgerMessage, RedpandaPublisher};

/// Base delay before the first retry.
const BACKOFF_BASE_MS: u64 = 1_000;

/// Ceiling on the backoff delay.
const BACKOFF_CAP_MS: u64 = 300_000; // 5 minutes

/// Exponential backoff keyed by how many deliveries have failed so far.
pub fn backoff_delay_ms(retry_count: i32) -> u64 {
    let exponent = retry_count.saturating_sub(1).clamp(0, 63) as u32;
    BACKOFF_BASE_MS
        .saturating_mul(2u64.saturating_pow(exponent))
        .min(BACKOFF_CAP_MS)
}

enum Delivery {
    Published,
    /// Consumer unreachable or broker refused: retry later.
    Retry(String),
    /// Our own bug (unserializable payload): flag immediately, loudly.
    Fatal(String),
}

/// A single outbox relay worker.
pub struct OutboxRelay {
    postgres: Arc<PostgresClient>,
    publisher: Arc<RedpandaPublisher>,
    settings: RelaySettings,
    worker_id: usize,
}

impl OutboxRelay {
    pub fn new(
        postgres: Arc<PostgresClient>,
        publisher: Arc<RedpandaPublisher>,
        settings: RelaySettings,
        worker_id: usize,
    ) -> Self {
        Self {
            postgres,
            publisher,
            settings,
            worker_id,
        }
    }

    /// Poll-and-drain loop until cancellation.
    pub async fn run(&self, cancellation_token: CancellationToken) -> anyhow::Result<()> {
        info!("Outbox relay worker {} started", self.worker_id);

        loop {
            tokio::select! {
                _ = cancellation_token.cancelled() => {
                    info!("Outbox relay worker {} shutting down", self.worker_id);
                    return Ok(());
                },
                _ = tokio::time::sleep(std::time::Duration::from_millis(self.settings.poll_interval_ms)) => {
                    match self.drain_once().await {
                        Ok(0) => {},
                        Ok(published) => {
                            debug!("Relay worker {} published {} entries", self.worker_id, published);
                        },
                        Err(e) => {
                            error!("Relay worker {} drain failed: {:#}", self.worker_id, e);
                        },
                    }
                },
            }
        }
    }

    /// Claim one page of pending entries and attempt delivery.
    ///
    /// The row locks held for the duration of the page keep other workers
    /// off these entries without any cross-worker coordination. Delivery
    /// stops at the first retryable failure: a still-pending entry must not
    /// be overtaken by its successors, or a single worker's delivery order
    /// would no longer match ledger write order.
    pub async fn drain_once(&self) -> anyhow::Result<usize> {
        let mut client = self.postgres.pool.get().await?;
        let tx = client.transaction().await?;

        let rows = tx
            .query(
                r#"
                SELECT
                    id, event_type, idempotency_key, payload, version, created_at,
                    published_at, retry_count, last_error, next_attempt_at, failed_permanently
                FROM auction.outbox
                WHERE published_at IS NULL
                  AND NOT failed_permanently
                  AND next_attempt_at <= NOW()
                ORDER BY id ASC
                LIMIT $1
                FOR UPDATE SKIP LOCKED
                "#,
                &[&self.settings.page_size],
            )
            .await?;

        if rows.is_empty() {
            tx.commit().await?;
            return Ok(0);
        }

        let entries: Vec<OutboxEntry> = rows.iter().map(row_to_outbox_entry).collect();
        let mut published = 0usize;

        for entry in &entries {
            match self.deliver(entry).await {
                Delivery::Published => {
                    tx.execute(
                        "UPDATE auction.outbox SET published_at = NOW() WHERE id = $1",
                        &[&entry.id],
                    )
                    .await?;
                    published += 1;
                },
                Delivery::Retry(err) => {
                    let retry_count = entry.retry_count + 1;

                    if retry_count >= self.settings.max_retries {
                        // Flag, never delete: the entry waits for an operator.
                        // Terminal, so later entries may still go out.
                        tx.execute(
                            r#"
                            UPDATE auction.outbox
                            SET retry_count = $2, last_error = $3, failed_permanently = TRUE
                            WHERE id = $1
                            "#,
                            &[&entry.id, &retry_count, &err],
                        )
                        .await?;
                        error!(
                            "Outbox entry {} ({}) exceeded {} delivery attempts, flagged for inspection: {}",
                            entry.id, entry.idempotency_key, self.settings.max_retries, err
                        );
                    } else {
                        let next_attempt = Utc::now()
                            + ChronoDuration::milliseconds(backoff_delay_ms(retry_count) as i64);
                        tx.execute(
                            r#"
                            UPDATE auction.outbox
                            SET retry_count = $2, last_error = $3, next_attempt_at = $4
                            WHERE id = $1
                            "#,
                            &[&entry.id, &retry_count, &err, &next_attempt],
                        )
                        .await?;
                        warn!(
                            "Delivery of outbox entry {} failed (attempt {}), retrying at {}: {}",
                            entry.id, retry_count, next_attempt, err
                        );
                        // The entry is still pending; publishing anything after
                        // it would break per-worker id-order delivery. Leave
                        // the rest of the page for the next pass.
                        break;
                    }
                },
                Delivery::Fatal(err) => {
                    tx.execute(
                        r#"
                        UPDATE auction.outbox
                        SET last_error = $2, failed_permanently = TRUE
                        WHERE id = $1
                        "#,
                        &[&entry.id, &err],
                    )
                    .await?;
                    error!(
                        "Outbox entry {} ({}) has an unserializable payload, flagged for inspection: {}",
                        entry.id, entry.idempotency_key, err
                    );
                },
            }
        }

        tx.commit().await?;
        Ok(published)
    }

    async fn deliver(&self, entry: &OutboxEntry) -> Delivery {
        let message = LedgerMessage {
            idempotency_key: &entry.idempotency_key,
            event_type: &entry.event_type,
            payload: &entry.payload,
            version: entry.version,
        };

        let body = match serde_json::to_string(&message) {
            Ok(body) => body,
            Err(e) => return Delivery::Fatal(e.to_string()),
        };

        match self.publisher.publish(&entry.idempotency_key, &body).await {
            Ok(()) => Delivery::Published,
            Err(e) => Delivery::Retry(format!("{:#}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_per_attempt() {
        assert_eq!(backoff_delay_ms(1), 1_000);
        assert_eq!(backoff_delay_ms(2), 2_000);
        assert_eq!(backoff_delay_ms(3), 4_000);
        assert_eq!(backoff_delay_ms(6), 32_000);
    }

    #[test]
    fn test_backoff_caps_at_five_minutes() {
        assert_eq!(backoff_delay_ms(10), 300_000);
        assert_eq!(backoff_delay_ms(60), 300_000);
    }

    #[test]
    fn test_backoff_tolerates_degenerate_counts() {
        assert_eq!(backoff_delay_ms(0), 1_000);
        assert_eq!(backoff_delay_ms(-3), 1_000);
        assert_eq!(backoff_delay_ms(i32::MAX), 300_000);
    }
}
