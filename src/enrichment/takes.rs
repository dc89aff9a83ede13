//! Per-take USD enrichment.
//!
//! A pure function of the ledger and the price resolver: every field is
//! recomputed fresh from stored takes and price observations, so it is safe
//! to evaluate at any time. A missing price propagates as `None` through
//! every derived field and is never coerced to zero.

use serde::Serialize;

use crate::db::models::Take;
use crate::pricing::{PriceKey, PriceResolver};
use crate::utils::validate_usd_amount;

/// USD-derived fields for one take. Any `None` traces back to an
/// unavailable price (or a zero taken value for the percent).
#[derive(Debug, Clone, Copy, Serialize)]
pub struct UsdFields {
    pub from_token_price_usd: Option<f64>,
    pub want_token_price_usd: Option<f64>,
    pub amount_taken_usd: Option<f64>,
    pub amount_paid_usd: Option<f64>,
    pub price_differential_usd: Option<f64>,
    pub price_differential_percent: Option<f64>,
}

/// A take with its freshly computed USD figures.
#[derive(Debug, Clone, Serialize)]
pub struct EnrichedTake {
    #[serde(flatten)]
    pub take: Take,
    #[serde(flatten)]
    pub usd: UsdFields,
}

/// Compute the USD fields for one take from its resolved prices.
pub fn usd_fields(
    amount_taken: f64,
    amount_paid: f64,
    from_token_price_usd: Option<f64>,
    want_token_price_usd: Option<f64>,
) -> UsdFields {
    let amount_taken_usd =
        from_token_price_usd.and_then(|p| validate_usd_amount(amount_taken * p));
    let amount_paid_usd = want_token_price_usd.and_then(|p| validate_usd_amount(amount_paid * p));

    let price_differential_usd = match (amount_paid_usd, amount_taken_usd) {
        (Some(paid), Some(taken)) => Some(paid - taken),
        _ => None,
    };

    // Undefined when the taken side is zero or either price is missing.
    let price_differential_percent = match (price_differential_usd, amount_taken_usd) {
        (Some(diff), Some(taken)) if taken != 0.0 => Some(diff / taken * 100.0),
        _ => None,
    };

    UsdFields {
        from_token_price_usd,
        want_token_price_usd,
        amount_taken_usd,
        amount_paid_usd,
        price_differential_usd,
        price_differential_percent,
    }
}

/// Enriches ledger takes with USD figures via the price resolver.
#[derive(Clone)]
pub struct TakeEnricher {
    resolver: PriceResolver,
}

impl TakeEnricher {
    pub fn new(resolver: PriceResolver) -> Self {
        Self {
            resolver,
        }
    }

    /// Enrich a batch of takes. Prices are resolved per distinct
    /// (chain, token, block), so large batches over few tokens stay cheap.
    pub async fn enrich(&self, takes: Vec<Take>) -> anyhow::Result<Vec<EnrichedTake>> {
        let mut keys = Vec::with_capacity(takes.len() * 2);
        for take in &takes {
            keys.push(PriceKey::new(take.chain_id, &take.from_token, take.block_number));
            keys.push(PriceKey::new(take.chain_id, &take.to_token, take.block_number));
        }

        let prices = self.resolver.resolve_many(&keys).await?;

        let enriched = takes
            .into_iter()
            .map(|take| {
                let from_price = prices
                    .get(&PriceKey::new(take.chain_id, &take.from_token, take.block_number))
                    .copied()
                    .flatten();
                let want_price = prices
                    .get(&PriceKey::new(take.chain_id, &take.to_token, take.block_number))
                    .copied()
                    .flatten();

                let usd = usd_fields(take.amount_taken, take.amount_paid, from_price, want_price);

                EnrichedTake {
                    take,
                    usd,
                }
            })
            .collect();

        Ok(enriched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usd_fields_with_both_prices() {
        let usd = usd_fields(100.0, 99.0, Some(2.0), Some(2.1));

        assert_eq!(usd.amount_taken_usd, Some(200.0));
        assert!((usd.amount_paid_usd.unwrap() - 207.9).abs() < 1e-9);
        let diff = usd.price_differential_usd.unwrap();
        assert!((diff - 7.9).abs() < 1e-9);
        let percent = usd.price_differential_percent.unwrap();
        assert!((percent - 3.95).abs() < 1e-9);
    }

    #[test]
    fn test_missing_from_price_propagates() {
        let usd = usd_fields(100.0, 99.0, None, Some(2.1));

        assert_eq!(usd.amount_taken_usd, None);
        assert!(usd.amount_paid_usd.is_some());
        assert_eq!(usd.price_differential_usd, None);
        assert_eq!(usd.price_differential_percent, None);
    }

    #[test]
    fn test_missing_want_price_propagates() {
        let usd = usd_fields(100.0, 99.0, Some(2.0), None);

        assert!(usd.amount_taken_usd.is_some());
        assert_eq!(usd.amount_paid_usd, None);
        assert_eq!(usd.price_differential_usd, None);
        assert_eq!(usd.price_differential_percent, None);
    }

    #[test]
    fn test_percent_undefined_for_zero_taken_value() {
        let usd = usd_fields(0.0, 99.0, Some(2.0), Some(2.1));

        assert_eq!(usd.amount_taken_usd, Some(0.0));
        assert!(usd.price_differential_usd.is_some());
        assert_eq!(usd.price_differential_percent, None);
    }

    #[test]
    fn test_out_of_bounds_value_treated_as_unavailable() {
        // A bogus source price that would value one take at > $1B.
        let usd = usd_fields(1e9, 99.0, Some(1e5), Some(2.1));

        assert_eq!(usd.amount_taken_usd, None);
        assert_eq!(usd.price_differential_usd, None);
    }
}
