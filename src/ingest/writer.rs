//! Ledger writer: transactional ingestion of lifecycle events.
//!
//! One atomic transaction per event. Every accepted write appends exactly one
//! outbox entry in the same transaction, so ledger rows and outbox entries
//! can never diverge. Dedup is anchored in storage (natural-key uniqueness),
//! not only in application checks, so concurrent redelivery from two scanner
//! instances cannot both land.

use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use deadpool_postgres::Transaction;
use log::warn;
use serde_json::Value;
use tokio_postgres::error::SqlState;

use crate::db::models::{idempotency_key, Auction, Round, Take};
use crate::db::PostgresClient;
use crate::ingest::aggregator;
use crate::ingest::event::{
    AuctionCreatedEvent, IngestOutcome, LifecycleEvent, RoundKickedEvent, TakeExecutedEvent,
};
use crate::ingest::sequence::{plan_insert, TakePosition};
use crate::utils::{normalize_address, str_to_f64_with_decimals};

/// Writer for the auction ledger.
///
/// Cheap to clone; all state lives in PostgreSQL. Safe for concurrent use:
/// events touching the same round serialize on the round row lock, everything
/// else proceeds in parallel.
#[derive(Clone)]
pub struct LedgerWriter {
    postgres: Arc<PostgresClient>,
}

impl LedgerWriter {
    pub fn new(postgres: Arc<PostgresClient>) -> Self {
        Self {
            postgres,
        }
    }

    /// Ingest one lifecycle event, committing it (or discovering it is a
    /// duplicate / inconsistency) in a single transaction.
    pub async fn ingest(&self, event: &LifecycleEvent) -> anyhow::Result<IngestOutcome> {
        match event {
            LifecycleEvent::AuctionCreated(e) => self.ingest_auction_created(e).await,
            LifecycleEvent::RoundKicked(e) => self.ingest_round_kicked(e).await,
            LifecycleEvent::TakeExecuted(e) => self.ingest_take(e).await,
        }
    }

    async fn ingest_auction_created(
        &self,
        event: &AuctionCreatedEvent,
    ) -> anyhow::Result<IngestOutcome> {
        let auction = Auction::new(
            event.auction_address.clone(),
            event.chain_id,
            event.deployer.clone(),
            event.want_token.clone(),
            event.decay_rate,
            event.update_interval,
            event.auction_length,
            event_timestamp(event.timestamp),
            event.block_number,
            event.transaction_hash.to_lowercase(),
        );

        let mut client = self.postgres.pool.get().await?;
        let tx = client.transaction().await?;

        let inserted = tx
            .execute(
                r#"
                INSERT INTO auction.auctions (
                    auction_address, chain_id, deployer, want_token, decay_rate,
                    update_interval, auction_length, deployed_at, block_number, transaction_hash
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                ON CONFLICT (auction_address, chain_id) DO NOTHING
                "#,
                &[
                    &auction.auction_address,
                    &auction.chain_id,
                    &auction.deployer,
                    &auction.want_token,
                    &auction.decay_rate,
                    &auction.update_interval,
                    &auction.auction_length,
                    &auction.deployed_at,
                    &auction.block_number,
                    &auction.transaction_hash,
                ],
            )
            .await
            .context("failed to upsert auction")?;

        if inserted == 0 {
            // Redelivery of a known deployment: legitimate, not an error.
            tx.commit().await?;
            return Ok(IngestOutcome::Duplicate);
        }

        let key = idempotency_key(
            event.chain_id,
            &event.transaction_hash,
            event.log_index,
            "auction_created",
        );
        append_outbox(&tx, "auction_created", &key, serde_json::to_value(&auction)?).await?;

        tx.commit().await?;
        Ok(IngestOutcome::Accepted)
    }

    async fn ingest_round_kicked(&self, event: &RoundKickedEvent) -> anyhow::Result<IngestOutcome> {
        let auction_address = normalize_address(&event.auction_address);
        let tx_hash = event.transaction_hash.to_lowercase();

        if event.round_id < 1 {
            let mut client = self.postgres.pool.get().await?;
            let tx = client.transaction().await?;
            record_inconsistency(
                &tx,
                event.chain_id,
                &auction_address,
                event.round_id,
                None,
                None,
                &tx_hash,
                event.log_index,
                "round id below 1",
            )
            .await?;
            tx.commit().await?;
            warn!(
                "Rejected round kick with round_id {} for auction {} on chain {}",
                event.round_id, auction_address, event.chain_id
            );
            return Ok(IngestOutcome::Inconsistent);
        }

        let initial_available =
            str_to_f64_with_decimals(&event.initial_available_raw, event.from_token_decimals)
                .with_context(|| {
                    format!(
                        "malformed initial_available '{}' for round {} of {}",
                        event.initial_available_raw, event.round_id, auction_address
                    )
                })?;

        let mut client = self.postgres.pool.get().await?;
        let tx = client.transaction().await?;

        // Lock the round key if it already exists; a concurrent kick for the
        // same round serializes here.
        let existing = tx
            .query_opt(
                r#"
                SELECT transaction_hash, log_index
                FROM auction.rounds
                WHERE auction_address = $1 AND chain_id = $2 AND round_id = $3
                FOR UPDATE
                "#,
                &[&auction_address, &event.chain_id, &event.round_id],
            )
            .await?;

        if let Some(row) = existing {
            let existing_tx: String = row.get("transaction_hash");
            let existing_log: i64 = row.get("log_index");

            if existing_tx.eq_ignore_ascii_case(&tx_hash) && existing_log == event.log_index {
                tx.commit().await?;
                return Ok(IngestOutcome::Duplicate);
            }

            // Same logical round, different on-chain event: the scanner is
            // confused. Park it for an operator, never auto-correct.
            record_inconsistency(
                &tx,
                event.chain_id,
                &auction_address,
                event.round_id,
                Some(&existing_tx),
                Some(existing_log),
                &tx_hash,
                event.log_index,
                "round re-kicked under a different on-chain event",
            )
            .await?;
            tx.commit().await?;
            warn!(
                "Inconsistent kick for round {} of auction {} on chain {}: existing {}:{}, incoming {}:{}",
                event.round_id, auction_address, event.chain_id,
                existing_tx, existing_log, tx_hash, event.log_index
            );
            return Ok(IngestOutcome::Inconsistent);
        }

        let round = Round {
            auction_address: auction_address.clone(),
            chain_id: event.chain_id,
            round_id: event.round_id,
            from_token: normalize_address(&event.from_token),
            initial_available,
            initial_available_raw: event.initial_available_raw.clone(),
            available_amount: initial_available,
            total_volume_sold: 0.0,
            take_count: 0,
            kicked_at: event_timestamp(event.timestamp),
            block_number: event.block_number,
            log_index: event.log_index,
            transaction_hash: tx_hash.clone(),
            updated_at: Utc::now(),
        };

        let insert = tx
            .execute(
                r#"
                INSERT INTO auction.rounds (
                    auction_address, chain_id, round_id, from_token, initial_available,
                    initial_available_raw, available_amount, kicked_at,
                    block_number, log_index, transaction_hash
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                "#,
                &[
                    &round.auction_address,
                    &round.chain_id,
                    &round.round_id,
                    &round.from_token,
                    &round.initial_available,
                    &round.initial_available_raw,
                    &round.available_amount,
                    &round.kicked_at,
                    &round.block_number,
                    &round.log_index,
                    &round.transaction_hash,
                ],
            )
            .await;

        if let Err(err) = insert {
            if is_unique_violation(&err) {
                // Lost a race against a concurrent kick of the same round.
                // Re-read under a fresh transaction and classify.
                drop(tx);
                return self.classify_round_race(event, &auction_address, &tx_hash).await;
            }
            return Err(err).context("failed to insert round");
        }

        let key = idempotency_key(
            event.chain_id,
            &event.transaction_hash,
            event.log_index,
            "round_kicked",
        );
        append_outbox(&tx, "round_kicked", &key, serde_json::to_value(&round)?).await?;

        tx.commit().await?;
        Ok(IngestOutcome::Accepted)
    }

    /// Classify the loser of a concurrent same-round insert race.
    async fn classify_round_race(
        &self,
        event: &RoundKickedEvent,
        auction_address: &str,
        tx_hash: &str,
    ) -> anyhow::Result<IngestOutcome> {
        let existing = self
            .postgres
            .get_round(auction_address, event.chain_id, event.round_id)
            .await?
            .context("round vanished after unique violation")?;

        if existing.transaction_hash.eq_ignore_ascii_case(tx_hash)
            && existing.log_index == event.log_index
        {
            return Ok(IngestOutcome::Duplicate);
        }

        let mut client = self.postgres.pool.get().await?;
        let tx = client.transaction().await?;
        record_inconsistency(
            &tx,
            event.chain_id,
            auction_address,
            event.round_id,
            Some(&existing.transaction_hash),
            Some(existing.log_index),
            tx_hash,
            event.log_index,
            "round re-kicked under a different on-chain event",
        )
        .await?;
        tx.commit().await?;
        Ok(IngestOutcome::Inconsistent)
    }

    async fn ingest_take(&self, event: &TakeExecutedEvent) -> anyhow::Result<IngestOutcome> {
        let auction_address = normalize_address(&event.auction_address);
        let tx_hash = event.transaction_hash.to_lowercase();

        let amount_taken =
            str_to_f64_with_decimals(&event.amount_taken_raw, event.from_token_decimals)
                .with_context(|| {
                    format!("malformed amount_taken '{}' in {}", event.amount_taken_raw, tx_hash)
                })?;
        let amount_paid =
            str_to_f64_with_decimals(&event.amount_paid_raw, event.want_token_decimals)
                .with_context(|| {
                    format!("malformed amount_paid '{}' in {}", event.amount_paid_raw, tx_hash)
                })?;

        let mut client = self.postgres.pool.get().await?;
        let tx = client.transaction().await?;

        // Row lock on the round serializes all take writes for it, which the
        // renumbering and the aggregate update both rely on.
        let round_row = tx
            .query_opt(
                r#"
                SELECT initial_available, total_volume_sold, kicked_at
                FROM auction.rounds
                WHERE auction_address = $1 AND chain_id = $2 AND round_id = $3
                FOR UPDATE
                "#,
                &[&auction_address, &event.chain_id, &event.round_id],
            )
            .await?;

        let Some(round_row) = round_row else {
            record_inconsistency(
                &tx,
                event.chain_id,
                &auction_address,
                event.round_id,
                None,
                None,
                &tx_hash,
                event.log_index,
                "take references a round that was never kicked",
            )
            .await?;
            tx.commit().await?;
            warn!(
                "Take {}:{} references unknown round {} of auction {} on chain {}",
                tx_hash, event.log_index, event.round_id, auction_address, event.chain_id
            );
            return Ok(IngestOutcome::Inconsistent);
        };

        // Natural-key dedup, checked under the round lock.
        let duplicate = tx
            .query_opt(
                r#"
                SELECT 1 FROM auction.takes
                WHERE chain_id = $1 AND transaction_hash = $2 AND log_index = $3
                "#,
                &[&event.chain_id, &tx_hash, &event.log_index],
            )
            .await?;

        if duplicate.is_some() {
            tx.commit().await?;
            return Ok(IngestOutcome::Duplicate);
        }

        // Existing takes in chronological order; by invariant this equals
        // take_seq order.
        let existing = tx
            .query(
                r#"
                SELECT block_number, log_index, amount_taken
                FROM auction.takes
                WHERE auction_address = $1 AND chain_id = $2 AND round_id = $3
                ORDER BY block_number ASC, log_index ASC
                "#,
                &[&auction_address, &event.chain_id, &event.round_id],
            )
            .await?;

        let positions: Vec<TakePosition> = existing
            .iter()
            .map(|r| TakePosition {
                block_number: r.get("block_number"),
                log_index: r.get("log_index"),
            })
            .collect();

        let plan = plan_insert(
            &positions,
            TakePosition {
                block_number: event.block_number,
                log_index: event.log_index,
            },
        );

        if let Some(from) = plan.renumber_from {
            // Shift the tail up by one. takes_round_seq is deferred, so the
            // transient overlap with the insert below settles at commit.
            tx.execute(
                r#"
                UPDATE auction.takes SET take_seq = take_seq + 1
                WHERE auction_address = $1 AND chain_id = $2 AND round_id = $3 AND take_seq >= $4
                "#,
                &[&auction_address, &event.chain_id, &event.round_id, &from],
            )
            .await
            .context("failed to renumber take sequence")?;
        }

        let kicked_at: DateTime<Utc> = round_row.get("kicked_at");
        let timestamp = event_timestamp(event.timestamp);
        let seconds_from_round_start = (timestamp - kicked_at).num_seconds().max(0);
        let price = if amount_taken > 0.0 { Some(amount_paid / amount_taken) } else { None };

        let take = Take {
            chain_id: event.chain_id,
            transaction_hash: tx_hash.clone(),
            log_index: event.log_index,
            auction_address: auction_address.clone(),
            round_id: event.round_id,
            take_seq: plan.take_seq,
            taker: normalize_address(&event.taker),
            from_token: normalize_address(&event.from_token),
            to_token: normalize_address(&event.want_token),
            amount_taken,
            amount_taken_raw: event.amount_taken_raw.clone(),
            amount_paid,
            amount_paid_raw: event.amount_paid_raw.clone(),
            price,
            timestamp,
            seconds_from_round_start,
            block_number: event.block_number,
        };

        let insert = tx
            .execute(
                r#"
                INSERT INTO auction.takes (
                    chain_id, transaction_hash, log_index, auction_address, round_id,
                    take_seq, taker, from_token, to_token, amount_taken, amount_taken_raw,
                    amount_paid, amount_paid_raw, price, timestamp,
                    seconds_from_round_start, block_number
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
                "#,
                &[
                    &take.chain_id,
                    &take.transaction_hash,
                    &take.log_index,
                    &take.auction_address,
                    &take.round_id,
                    &take.take_seq,
                    &take.taker,
                    &take.from_token,
                    &take.to_token,
                    &take.amount_taken,
                    &take.amount_taken_raw,
                    &take.amount_paid,
                    &take.amount_paid_raw,
                    &take.price,
                    &take.timestamp,
                    &take.seconds_from_round_start,
                    &take.block_number,
                ],
            )
            .await;

        if let Err(err) = insert {
            if is_unique_violation(&err) {
                // A concurrent redelivery of the same event won; the dropped
                // transaction rolls back the shift.
                return Ok(IngestOutcome::Duplicate);
            }
            return Err(err).context("failed to insert take");
        }

        // Round aggregator, same transaction. A renumbered insert recomputes
        // the full sum; the common append path takes the cheap increment.
        let initial_available: f64 = round_row.get("initial_available");
        let current_total: f64 = round_row.get("total_volume_sold");
        let new_total = if plan.renumbered() {
            let mut amounts: Vec<f64> =
                existing.iter().map(|r| r.get::<_, f64>("amount_taken")).collect();
            amounts.push(amount_taken);
            aggregator::recompute_total(&amounts)
        } else {
            aggregator::incremental_total(current_total, amount_taken)
        };
        let available = aggregator::available_amount(initial_available, new_total);

        aggregator::apply_totals(
            &tx,
            &auction_address,
            event.chain_id,
            event.round_id,
            new_total,
            available,
        )
        .await?;

        let key = idempotency_key(event.chain_id, &event.transaction_hash, event.log_index, "take");
        append_outbox(&tx, "take", &key, serde_json::to_value(&take)?).await?;

        tx.commit().await?;
        Ok(IngestOutcome::Accepted)
    }
}

/// Append the outbox entry for an accepted write.
///
/// The ledger insert already established the natural key is fresh, so a
/// unique violation here is a bug and rolls the whole transaction back.
async fn append_outbox(
    tx: &Transaction<'_>,
    event_type: &str,
    key: &str,
    payload: Value,
) -> anyhow::Result<()> {
    tx.execute(
        r#"
        INSERT INTO auction.outbox (event_type, idempotency_key, payload)
        VALUES ($1, $2, $3)
        "#,
        &[&event_type, &key, &payload],
    )
    .await
    .with_context(|| format!("failed to append outbox entry {}", key))?;

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn record_inconsistency(
    tx: &Transaction<'_>,
    chain_id: i64,
    auction_address: &str,
    round_id: i64,
    existing_tx_hash: Option<&str>,
    existing_log_index: Option<i64>,
    incoming_tx_hash: &str,
    incoming_log_index: i64,
    detail: &str,
) -> anyhow::Result<()> {
    tx.execute(
        r#"
        INSERT INTO auction.inconsistencies (
            chain_id, auction_address, round_id, existing_tx_hash,
            existing_log_index, incoming_tx_hash, incoming_log_index, detail
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
        &[
            &chain_id,
            &auction_address,
            &round_id,
            &existing_tx_hash,
            &existing_log_index,
            &incoming_tx_hash,
            &incoming_log_index,
            &detail,
        ],
    )
    .await
    .context("failed to record inconsistency")?;

    Ok(())
}

fn is_unique_violation(err: &tokio_postgres::Error) -> bool {
    err.code() == Some(&SqlState::UNIQUE_VIOLATION)
}

fn event_timestamp(unix_seconds: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(unix_seconds, 0).unwrap_or_default()
}
