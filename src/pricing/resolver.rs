//! Historical USD price resolution.
//!
//! Nearest-preceding-value semantics over the append-only `token_prices`
//! table: the best observation for (chain, token) at or before a reference
//! block. Multiple untrusted sources report prices independently; the
//! priority among them is an explicit policy in [`pick_best`], never
//! whichever row a query happens to return first.

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use rustc_hash::FxHashMap;

use crate::db::models::TokenPrice;
use crate::db::PostgresClient;
use crate::utils::{normalize_address, validate_usd_price};

/// Cache key for a resolved price.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct PriceKey {
    pub chain_id: i64,
    pub token_address: String,
    pub at_block: i64,
}

impl PriceKey {
    pub fn new(chain_id: i64, token_address: &str, at_block: i64) -> Self {
        Self {
            chain_id,
            token_address: normalize_address(token_address),
            at_block,
        }
    }
}

/// Priority policy across price observations:
/// greatest block, then most recently observed, then lowest source label.
///
/// The final source tie-break makes resolution fully deterministic even if
/// two sources write in the same instant.
fn observation_priority(a: &TokenPrice, b: &TokenPrice) -> Ordering {
    a.block_number
        .cmp(&b.block_number)
        .then_with(|| a.observed_at.cmp(&b.observed_at))
        .then_with(|| b.source.cmp(&a.source))
}

/// Pick the winning observation under the priority policy.
///
/// Insertion order of the slice never affects the result.
pub fn pick_best(observations: &[TokenPrice]) -> Option<&TokenPrice> {
    observations.iter().max_by(|a, b| observation_priority(a, b))
}

/// Read-side resolver for historical USD prices.
///
/// Side-effect-free and safe for arbitrary parallelism. Resolved prices are
/// cached briefly; misses are never cached since a late-writing source may
/// still fill the gap.
#[derive(Clone)]
pub struct PriceResolver {
    postgres: Arc<PostgresClient>,
    cache: Cache<PriceKey, f64>,
}

impl PriceResolver {
    pub fn new(postgres: Arc<PostgresClient>) -> Self {
        let cache = Cache::builder()
            .max_capacity(100_000)
            .time_to_live(Duration::from_secs(300))
            .build();

        Self {
            postgres,
            cache,
        }
    }

    /// Best available USD price for a token at or before `at_block`.
    ///
    /// `None` means no observation exists at or before the block: a
    /// missing-data state that callers must propagate, never coerce to zero.
    pub async fn resolve(
        &self,
        chain_id: i64,
        token_address: &str,
        at_block: i64,
    ) -> anyhow::Result<Option<f64>> {
        let key = PriceKey::new(chain_id, token_address, at_block);

        if let Some(hit) = self.cache.get(&key).await {
            return Ok(Some(hit));
        }

        let observations = self
            .postgres
            .get_price_observations_at(chain_id, &key.token_address, at_block)
            .await?;

        let price = pick_best(&observations).and_then(|o| validate_usd_price(o.price_usd));

        if let Some(price) = price {
            self.cache.insert(key, price).await;
        }

        Ok(price)
    }

    /// Resolve a batch of keys, deduplicated through the cache.
    pub async fn resolve_many(
        &self,
        keys: &[PriceKey],
    ) -> anyhow::Result<FxHashMap<PriceKey, Option<f64>>> {
        let mut resolved: FxHashMap<PriceKey, Option<f64>> = FxHashMap::default();

        for key in keys {
            if resolved.contains_key(key) {
                continue;
            }
            let price = self.resolve(key.chain_id, &key.token_address, key.at_block).await?;
            resolved.insert(key.clone(), price);
        }

        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn obs(block: i64, price: f64, source: &str, observed_secs: i64) -> TokenPrice {
        TokenPrice {
            chain_id: 1,
            token_address: "0xtoken".to_string(),
            block_number: block,
            source: source.to_string(),
            price_usd: price,
            observed_at: Utc.timestamp_opt(observed_secs, 0).unwrap(),
        }
    }

    #[test]
    fn test_greatest_block_wins() {
        let observations = vec![obs(100, 1.00, "chainlink", 10), obs(105, 1.10, "odos", 20)];
        let best = pick_best(&observations).unwrap();
        assert_eq!(best.block_number, 105);
        assert_eq!(best.price_usd, 1.10);
    }

    #[test]
    fn test_result_is_insertion_order_independent() {
        let forward = vec![obs(100, 1.00, "chainlink", 10), obs(105, 1.10, "odos", 20)];
        let reversed: Vec<TokenPrice> = forward.iter().rev().cloned().collect();
        assert_eq!(
            pick_best(&forward).unwrap().price_usd,
            pick_best(&reversed).unwrap().price_usd
        );
    }

    #[test]
    fn test_block_tie_resolved_by_observed_at() {
        let observations = vec![obs(100, 1.00, "chainlink", 10), obs(100, 1.05, "odos", 50)];
        let best = pick_best(&observations).unwrap();
        assert_eq!(best.source, "odos");
    }

    #[test]
    fn test_full_tie_resolved_by_source_label() {
        let observations = vec![obs(100, 1.00, "odos", 10), obs(100, 1.05, "chainlink", 10)];
        // Identical block and instant: the lexicographically lower source wins.
        let best = pick_best(&observations).unwrap();
        assert_eq!(best.source, "chainlink");
    }

    #[test]
    fn test_empty_observations_resolve_to_none() {
        assert!(pick_best(&[]).is_none());
    }
}
