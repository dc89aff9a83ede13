use log::error;

use crate::db::models::{
    Auction, Inconsistency, OutboxEntry, Round, ScanCheckpoint, Take, TakerSummary, TokenPrice,
};
use crate::db::postgres::PostgresClient;

/// Ranking dimension for taker leaderboard queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankDimension {
    Takes,
    Volume,
    Profit,
}

impl RankDimension {
    fn order_clause(self) -> &'static str {
        match self {
            RankDimension::Takes => "total_takes DESC, taker ASC",
            RankDimension::Volume => "total_volume_usd DESC NULLS LAST, taker ASC",
            RankDimension::Profit => "total_profit_usd DESC NULLS LAST, taker ASC",
        }
    }
}

impl PostgresClient {
    // ==================== AUCTIONS ====================

    /// Get a single auction by its key
    pub async fn get_auction(
        &self,
        auction_address: &str,
        chain_id: i64,
    ) -> anyhow::Result<Option<Auction>> {
        let client = self.pool.get().await?;
        let query = r#"
            SELECT
                auction_address, chain_id, deployer, want_token, decay_rate,
                update_interval, auction_length, deployed_at, block_number, transaction_hash
            FROM auction.auctions
            WHERE auction_address = $1 AND chain_id = $2
        "#;

        let row = client
            .query_opt(query, &[&auction_address.to_lowercase(), &chain_id])
            .await?;

        Ok(row.map(|r| row_to_auction(&r)))
    }

    /// List auctions ordered by deployment recency
    pub async fn list_auctions(
        &self,
        chain_id: Option<i64>,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<Auction>> {
        let client = self.pool.get().await?;
        let query = r#"
            SELECT
                auction_address, chain_id, deployer, want_token, decay_rate,
                update_interval, auction_length, deployed_at, block_number, transaction_hash
            FROM auction.auctions
            WHERE ($1::bigint IS NULL OR chain_id = $1)
            ORDER BY deployed_at DESC
            LIMIT $2 OFFSET $3
        "#;

        let rows = client.query(query, &[&chain_id, &limit, &offset]).await?;
        Ok(rows.iter().map(row_to_auction).collect())
    }

    // ==================== ROUNDS ====================

    /// Get a single round by its key
    pub async fn get_round(
        &self,
        auction_address: &str,
        chain_id: i64,
        round_id: i64,
    ) -> anyhow::Result<Option<Round>> {
        let client = self.pool.get().await?;
        let query = r#"
            SELECT
                auction_address, chain_id, round_id, from_token, initial_available,
                initial_available_raw, available_amount, total_volume_sold, take_count,
                kicked_at, block_number, log_index, transaction_hash, updated_at
            FROM auction.rounds
            WHERE auction_address = $1 AND chain_id = $2 AND round_id = $3
        "#;

        let row = client
            .query_opt(query, &[&auction_address.to_lowercase(), &chain_id, &round_id])
            .await?;

        Ok(row.map(|r| row_to_round(&r)))
    }

    /// List rounds for an auction, most recent first
    pub async fn list_rounds(
        &self,
        auction_address: &str,
        chain_id: i64,
        limit: i64,
    ) -> anyhow::Result<Vec<Round>> {
        let client = self.pool.get().await?;
        let query = r#"
            SELECT
                auction_address, chain_id, round_id, from_token, initial_available,
                initial_available_raw, available_amount, total_volume_sold, take_count,
                kicked_at, block_number, log_index, transaction_hash, updated_at
            FROM auction.rounds
            WHERE auction_address = $1 AND chain_id = $2
            ORDER BY round_id DESC
            LIMIT $3
        "#;

        let rows = client
            .query(query, &[&auction_address.to_lowercase(), &chain_id, &limit])
            .await?;
        Ok(rows.iter().map(row_to_round).collect())
    }

    // ==================== TAKES ====================

    /// Get a single take by round key and sequence number
    pub async fn get_take(
        &self,
        auction_address: &str,
        chain_id: i64,
        round_id: i64,
        take_seq: i64,
    ) -> anyhow::Result<Option<Take>> {
        let client = self.pool.get().await?;
        let query = r#"
            SELECT
                chain_id, transaction_hash, log_index, auction_address, round_id,
                take_seq, taker, from_token, to_token, amount_taken, amount_taken_raw,
                amount_paid, amount_paid_raw, price, timestamp,
                seconds_from_round_start, block_number
            FROM auction.takes
            WHERE auction_address = $1 AND chain_id = $2 AND round_id = $3 AND take_seq = $4
        "#;

        let row = client
            .query_opt(
                query,
                &[&auction_address.to_lowercase(), &chain_id, &round_id, &take_seq],
            )
            .await?;

        Ok(row.map(|r| row_to_take(&r)))
    }

    /// All takes of a round in chronological (take_seq) order
    pub async fn get_takes_for_round(
        &self,
        auction_address: &str,
        chain_id: i64,
        round_id: i64,
    ) -> anyhow::Result<Vec<Take>> {
        let client = self.pool.get().await?;
        let query = r#"
            SELECT
                chain_id, transaction_hash, log_index, auction_address, round_id,
                take_seq, taker, from_token, to_token, amount_taken, amount_taken_raw,
                amount_paid, amount_paid_raw, price, timestamp,
                seconds_from_round_start, block_number
            FROM auction.takes
            WHERE auction_address = $1 AND chain_id = $2 AND round_id = $3
            ORDER BY take_seq ASC
        "#;

        let rows = client
            .query(query, &[&auction_address.to_lowercase(), &chain_id, &round_id])
            .await?;
        Ok(rows.iter().map(row_to_take).collect())
    }

    /// Recent takes across all auctions
    pub async fn list_recent_takes(
        &self,
        chain_id: Option<i64>,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<Take>> {
        let client = self.pool.get().await?;
        let query = r#"
            SELECT
                chain_id, transaction_hash, log_index, auction_address, round_id,
                take_seq, taker, from_token, to_token, amount_taken, amount_taken_raw,
                amount_paid, amount_paid_raw, price, timestamp,
                seconds_from_round_start, block_number
            FROM auction.takes
            WHERE ($1::bigint IS NULL OR chain_id = $1)
            ORDER BY timestamp DESC
            LIMIT $2 OFFSET $3
        "#;

        let rows = client.query(query, &[&chain_id, &limit, &offset]).await?;
        Ok(rows.iter().map(row_to_take).collect())
    }

    /// Paginated takes for a single taker, most recent first
    pub async fn get_takes_for_taker(
        &self,
        taker: &str,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<Take>> {
        let client = self.pool.get().await?;
        let query = r#"
            SELECT
                chain_id, transaction_hash, log_index, auction_address, round_id,
                take_seq, taker, from_token, to_token, amount_taken, amount_taken_raw,
                amount_paid, amount_paid_raw, price, timestamp,
                seconds_from_round_start, block_number
            FROM auction.takes
            WHERE taker = $1
            ORDER BY timestamp DESC
            LIMIT $2 OFFSET $3
        "#;

        let rows = client
            .query(query, &[&taker.to_lowercase(), &limit, &offset])
            .await?;
        Ok(rows.iter().map(row_to_take).collect())
    }

    /// Every take in the ledger, in chronological order.
    ///
    /// Used by the summary refresh job for the full recompute. Auction takes
    /// are low-volume relative to swap feeds, so a full scan is acceptable.
    pub async fn get_all_takes(&self) -> anyhow::Result<Vec<Take>> {
        let client = self.pool.get().await?;
        let query = r#"
            SELECT
                chain_id, transaction_hash, log_index, auction_address, round_id,
                take_seq, taker, from_token, to_token, amount_taken, amount_taken_raw,
                amount_paid, amount_paid_raw, price, timestamp,
                seconds_from_round_start, block_number
            FROM auction.takes
            ORDER BY timestamp ASC
        "#;

        let rows = client.query(query, &[]).await?;
        Ok(rows.iter().map(row_to_take).collect())
    }

    // ==================== PRICE OBSERVATIONS ====================

    /// Append a price observation. Re-pushing a known (chain, token, block,
    /// source) combination is a no-op, not an error.
    ///
    /// Returns true if the row was newly inserted.
    pub async fn record_price_observation(&self, price: &TokenPrice) -> anyhow::Result<bool> {
        let client = self.pool.get().await?;
        let query = r#"
            INSERT INTO auction.token_prices (
                chain_id, token_address, block_number, source, price_usd, observed_at
            ) VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (chain_id, token_address, block_number, source) DO NOTHING
        "#;

        let inserted = client
            .execute(
                query,
                &[
                    &price.chain_id,
                    &price.token_address,
                    &price.block_number,
                    &price.source,
                    &price.price_usd,
                    &price.observed_at,
                ],
            )
            .await
            .map_err(|e| {
                error!(
                    "Failed to record price observation for {} on chain {}: {:?}",
                    price.token_address, price.chain_id, e
                );
                e
            })?;

        Ok(inserted == 1)
    }

    /// All observations at the greatest block at or before `at_block`.
    ///
    /// Returns every source's row at that block; the resolver's priority
    /// policy picks among them. Empty when no observation precedes the block.
    pub async fn get_price_observations_at(
        &self,
        chain_id: i64,
        token_address: &str,
        at_block: i64,
    ) -> anyhow::Result<Vec<TokenPrice>> {
        let client = self.pool.get().await?;
        let query = r#"
            SELECT chain_id, token_address, block_number, source, price_usd, observed_at
            FROM auction.token_prices
            WHERE chain_id = $1
              AND token_address = $2
              AND block_number = (
                SELECT MAX(block_number)
                FROM auction.token_prices
                WHERE chain_id = $1 AND token_address = $2 AND block_number <= $3
              )
        "#;

        let rows = client
            .query(query, &[&chain_id, &token_address.to_lowercase(), &at_block])
            .await?;
        Ok(rows.iter().map(row_to_token_price).collect())
    }

    // ==================== SCAN CHECKPOINTS ====================

    /// Get scan progress for a (chain, source) pair
    pub async fn get_scan_checkpoint(
        &self,
        chain_id: i64,
        source_id: &str,
    ) -> anyhow::Result<Option<ScanCheckpoint>> {
        let client = self.pool.get().await?;
        let query = r#"
            SELECT chain_id, source_id, start_block, last_indexed_block, updated_at
            FROM auction.scan_checkpoints
            WHERE chain_id = $1 AND source_id = $2
        "#;

        let row = client.query_opt(query, &[&chain_id, &source_id]).await?;

        Ok(row.map(|r| ScanCheckpoint {
            chain_id: r.get("chain_id"),
            source_id: r.get("source_id"),
            start_block: r.get("start_block"),
            last_indexed_block: r.get("last_indexed_block"),
            updated_at: r.get("updated_at"),
        }))
    }

    /// Set scan progress for a (chain, source) pair
    pub async fn set_scan_checkpoint(&self, checkpoint: &ScanCheckpoint) -> anyhow::Result<()> {
        let client = self.pool.get().await?;
        let query = r#"
            INSERT INTO auction.scan_checkpoints (
                chain_id, source_id, start_block, last_indexed_block, updated_at
            ) VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (chain_id, source_id) DO UPDATE SET
                start_block = EXCLUDED.start_block,
                last_indexed_block = EXCLUDED.last_indexed_block,
                updated_at = EXCLUDED.updated_at
        "#;

        client
            .execute(
                query,
                &[
                    &checkpoint.chain_id,
                    &checkpoint.source_id,
                    &checkpoint.start_block,
                    &checkpoint.last_indexed_block,
                    &checkpoint.updated_at,
                ],
            )
            .await
            .map_err(|e| {
                error!(
                    "Failed to set scan checkpoint for chain {} source {}: {:?}",
                    checkpoint.chain_id, checkpoint.source_id, e
                );
                e
            })?;

        Ok(())
    }

    // ==================== TAKER SUMMARIES ====================

    /// Get the cached summary for one taker
    pub async fn get_taker_summary(&self, taker: &str) -> anyhow::Result<Option<TakerSummary>> {
        let client = self.pool.get().await?;
        let query = r#"
            SELECT
                taker, total_takes, unique_auctions, unique_chains, active_chains,
                total_volume_usd, total_profit_usd, avg_take_size_usd,
                first_take, last_take, takes_last_7d, takes_last_30d,
                volume_last_7d, volume_last_30d,
                rank_by_takes, rank_by_volume, rank_by_profit, computed_at
            FROM auction.taker_summaries
            WHERE taker = $1
        "#;

        let row = client.query_opt(query, &[&taker.to_lowercase()]).await?;
        Ok(row.map(|r| row_to_taker_summary(&r)))
    }

    /// Leaderboard page ordered by the requested rank dimension
    pub async fn get_taker_summaries(
        &self,
        order_by: RankDimension,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<TakerSummary>> {
        let client = self.pool.get().await?;
        let query = format!(
            r#"
            SELECT
                taker, total_takes, unique_auctions, unique_chains, active_chains,
                total_volume_usd, total_profit_usd, avg_take_size_usd,
                first_take, last_take, takes_last_7d, takes_last_30d,
                volume_last_7d, volume_last_30d,
                rank_by_takes, rank_by_volume, rank_by_profit, computed_at
            FROM auction.taker_summaries
            ORDER BY {}
            LIMIT $1 OFFSET $2
            "#,
            order_by.order_clause()
        );

        let rows = client.query(&query, &[&limit, &offset]).await?;
        Ok(rows.iter().map(row_to_taker_summary).collect())
    }

    /// Batch upsert recomputed taker summaries (multi-row VALUES).
    ///
    /// Takers never disappear from the ledger, so an upsert of the full
    /// recompute result replaces every live row.
    pub async fn set_taker_summaries(&self, summaries: &[TakerSummary]) -> anyhow::Result<()> {
        if summaries.is_empty() {
            return Ok(());
        }

        const COLS_PER_ROW: usize = 18;
        const BATCH_SIZE: usize = 400;

        let client = self.pool.get().await?;

        for chunk in summaries.chunks(BATCH_SIZE) {
            // Build VALUES placeholders: ($1,...,$18), ($19,...,$36), ...
            let values_clauses: Vec<String> = chunk
                .iter()
                .enumerate()
                .map(|(i, _)| {
                    let start = i * COLS_PER_ROW + 1;
                    let placeholders: Vec<String> = (start..start + COLS_PER_ROW)
                        .map(|n| format!("${}", n))
                        .collect();
                    format!("({})", placeholders.join(", "))
                })
                .collect();

            let query = format!(
                r#"
                INSERT INTO auction.taker_summaries (
                    taker, total_takes, unique_auctions, unique_chains, active_chains,
                    total_volume_usd, total_profit_usd, avg_take_size_usd,
                    first_take, last_take, takes_last_7d, takes_last_30d,
                    volume_last_7d, volume_last_30d,
                    rank_by_takes, rank_by_volume, rank_by_profit, computed_at
                ) VALUES {}
                ON CONFLICT (taker) DO UPDATE SET
                    total_takes = EXCLUDED.total_takes,
                    unique_auctions = EXCLUDED.unique_auctions,
                    unique_chains = EXCLUDED.unique_chains,
                    active_chains = EXCLUDED.active_chains,
                    total_volume_usd = EXCLUDED.total_volume_usd,
                    total_profit_usd = EXCLUDED.total_profit_usd,
                    avg_take_size_usd = EXCLUDED.avg_take_size_usd,
                    first_take = EXCLUDED.first_take,
                    last_take = EXCLUDED.last_take,
                    takes_last_7d = EXCLUDED.takes_last_7d,
                    takes_last_30d = EXCLUDED.takes_last_30d,
                    volume_last_7d = EXCLUDED.volume_last_7d,
                    volume_last_30d = EXCLUDED.volume_last_30d,
                    rank_by_takes = EXCLUDED.rank_by_takes,
                    rank_by_volume = EXCLUDED.rank_by_volume,
                    rank_by_profit = EXCLUDED.rank_by_profit,
                    computed_at = EXCLUDED.computed_at
                "#,
                values_clauses.join(", ")
            );

            let mut params: Vec<&(dyn tokio_postgres::types::ToSql + Sync)> =
                Vec::with_capacity(chunk.len() * COLS_PER_ROW);

            for summary in chunk {
                params.push(&summary.taker);
                params.push(&summary.total_takes);
                params.push(&summary.unique_auctions);
                params.push(&summary.unique_chains);
                params.push(&summary.active_chains);
                params.push(&summary.total_volume_usd);
                params.push(&summary.total_profit_usd);
                params.push(&summary.avg_take_size_usd);
                params.push(&summary.first_take);
                params.push(&summary.last_take);
                params.push(&summary.takes_last_7d);
                params.push(&summary.takes_last_30d);
                params.push(&summary.volume_last_7d);
                params.push(&summary.volume_last_30d);
                params.push(&summary.rank_by_takes);
                params.push(&summary.rank_by_volume);
                params.push(&summary.rank_by_profit);
                params.push(&summary.computed_at);
            }

            client.execute(&query, &params).await.map_err(|e| {
                error!(
                    "Failed to batch upsert {} taker summaries: {:?}",
                    chunk.len(),
                    e
                );
                e
            })?;
        }

        Ok(())
    }

    // ==================== INCONSISTENCIES ====================

    /// Operator queue of conflicting natural keys, most recent first
    pub async fn list_inconsistencies(&self, limit: i64) -> anyhow::Result<Vec<Inconsistency>> {
        let client = self.pool.get().await?;
        let query = r#"
            SELECT
                id, chain_id, auction_address, round_id, existing_tx_hash,
                existing_log_index, incoming_tx_hash, incoming_log_index, detail, created_at
            FROM auction.inconsistencies
            ORDER BY created_at DESC
            LIMIT $1
        "#;

        let rows = client.query(query, &[&limit]).await?;
        Ok(rows
            .iter()
            .map(|r| Inconsistency {
                id: r.get("id"),
                chain_id: r.get("chain_id"),
                auction_address: r.get("auction_address"),
                round_id: r.get("round_id"),
                existing_tx_hash: r.get("existing_tx_hash"),
                existing_log_index: r.get("existing_log_index"),
                incoming_tx_hash: r.get("incoming_tx_hash"),
                incoming_log_index: r.get("incoming_log_index"),
                detail: r.get("detail"),
                created_at: r.get("created_at"),
            })
            .collect())
    }
}

// ==================== HELPER FUNCTIONS ====================

fn row_to_auction(row: &tokio_postgres::Row) -> Auction {
    // Lowercase addresses for consistent comparisons
    let auction_address: String = row.get("auction_address");
    let deployer: String = row.get("deployer");
    let want_token: String = row.get("want_token");
    Auction {
        auction_address: auction_address.to_lowercase(),
        chain_id: row.get("chain_id"),
        deployer: deployer.to_lowercase(),
        want_token: want_token.to_lowercase(),
        decay_rate: row.get("decay_rate"),
        update_interval: row.get("update_interval"),
        auction_length: row.get("auction_length"),
        deployed_at: row.get("deployed_at"),
        block_number: row.get("block_number"),
        transaction_hash: row.get("transaction_hash"),
    }
}

pub(crate) fn row_to_round(row: &tokio_postgres::Row) -> Round {
    let auction_address: String = row.get("auction_address");
    let from_token: String = row.get("from_token");
    Round {
        auction_address: auction_address.to_lowercase(),
        chain_id: row.get("chain_id"),
        round_id: row.get("round_id"),
        from_token: from_token.to_lowercase(),
        initial_available: row.get("initial_available"),
        initial_available_raw: row.get("initial_available_raw"),
        available_amount: row.get("available_amount"),
        total_volume_sold: row.get("total_volume_sold"),
        take_count: row.get("take_count"),
        kicked_at: row.get("kicked_at"),
        block_number: row.get("block_number"),
        log_index: row.get("log_index"),
        transaction_hash: row.get("transaction_hash"),
        updated_at: row.get("updated_at"),
    }
}

pub(crate) fn row_to_take(row: &tokio_postgres::Row) -> Take {
    let auction_address: String = row.get("auction_address");
    let taker: String = row.get("taker");
    let from_token: String = row.get("from_token");
    let to_token: String = row.get("to_token");
    Take {
        chain_id: row.get("chain_id"),
        transaction_hash: row.get("transaction_hash"),
        log_index: row.get("log_index"),
        auction_address: auction_address.to_lowercase(),
        round_id: row.get("round_id"),
        take_seq: row.get("take_seq"),
        taker: taker.to_lowercase(),
        from_token: from_token.to_lowercase(),
        to_token: to_token.to_lowercase(),
        amount_taken: row.get("amount_taken"),
        amount_taken_raw: row.get("amount_taken_raw"),
        amount_paid: row.get("amount_paid"),
        amount_paid_raw: row.get("amount_paid_raw"),
        price: row.get("price"),
        timestamp: row.get("timestamp"),
        seconds_from_round_start: row.get("seconds_from_round_start"),
        block_number: row.get("block_number"),
    }
}

pub(crate) fn row_to_token_price(row: &tokio_postgres::Row) -> TokenPrice {
    let token_address: String = row.get("token_address");
    TokenPrice {
        chain_id: row.get("chain_id"),
        token_address: token_address.to_lowercase(),
        block_number: row.get("block_number"),
        source: row.get("source"),
        price_usd: row.get("price_usd"),
        observed_at: row.get("observed_at"),
    }
}

pub(crate) fn row_to_outbox_entry(row: &tokio_postgres::Row) -> OutboxEntry {
    OutboxEntry {
        id: row.get("id"),
        event_type: row.get("event_type"),
        idempotency_key: row.get("idempotency_key"),
        payload: row.get("payload"),
        version: row.get("version"),
        created_at: row.get("created_at"),
        published_at: row.get("published_at"),
        retry_count: row.get("retry_count"),
        last_error: row.get("last_error"),
        next_attempt_at: row.get("next_attempt_at"),
        failed_permanently: row.get("failed_permanently"),
    }
}

fn row_to_taker_summary(row: &tokio_postgres::Row) -> TakerSummary {
    TakerSummary {
        taker: row.get("taker"),
        total_takes: row.get("total_takes"),
        unique_auctions: row.get("unique_auctions"),
        unique_chains: row.get("unique_chains"),
        active_chains: row.get("active_chains"),
        total_volume_usd: row.get("total_volume_usd"),
        total_profit_usd: row.get("total_profit_usd"),
        avg_take_size_usd: row.get("avg_take_size_usd"),
        first_take: row.get("first_take"),
        last_take: row.get("last_take"),
        takes_last_7d: row.get("takes_last_7d"),
        takes_last_30d: row.get("takes_last_30d"),
        volume_last_7d: row.get("volume_last_7d"),
        volume_last_30d: row.get("volume_last_30d"),
        rank_by_takes: row.get("rank_by_takes"),
        rank_by_volume: row.get("rank_by_volume"),
        rank_by_profit: row.get("rank_by_profit"),
        computed_at: row.get("computed_at"),
    }
}
