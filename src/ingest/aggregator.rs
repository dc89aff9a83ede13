//! Round aggregator: the only writer of round running totals.
//!
//! Runs inside the same transaction as an accepted take insert. All other
//! components read `total_volume_sold` and `available_amount` strictly
//! read-only; there is exactly one recomputation strategy in the codebase.

use deadpool_postgres::Transaction;

/// Cheap path for the common case: the new take appended at the end of the
/// round's sequence.
pub fn incremental_total(current_total: f64, amount_taken: f64) -> f64 {
    current_total + amount_taken
}

/// Full recompute, used whenever the insert renumbered the sequence.
///
/// Must agree with chaining [`incremental_total`] over the same amounts.
pub fn recompute_total(amounts: &[f64]) -> f64 {
    amounts.iter().sum()
}

/// available_amount invariant: never below zero even when takes oversell the
/// initial inventory (rounding drift in adjusted amounts).
pub fn available_amount(initial_available: f64, total_volume_sold: f64) -> f64 {
    (initial_available - total_volume_sold).max(0.0)
}

/// Persist the new round totals inside the take-insert transaction.
pub async fn apply_totals(
    tx: &Transaction<'_>,
    auction_address: &str,
    chain_id: i64,
    round_id: i64,
    total_volume_sold: f64,
    available: f64,
) -> anyhow::Result<()> {
    tx.execute(
        r#"
        UPDATE auction.rounds SET
            total_volume_sold = $4,
            available_amount = $5,
            take_count = take_count + 1,
            updated_at = NOW()
        WHERE auction_address = $1 AND chain_id = $2 AND round_id = $3
        "#,
        &[
            &auction_address,
            &chain_id,
            &round_id,
            &total_volume_sold,
            &available,
        ],
    )
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incremental_and_recompute_agree() {
        let amounts = [125.0, 30.5, 0.25, 4000.0];

        let mut incremental = 0.0;
        for a in amounts {
            incremental = incremental_total(incremental, a);
        }

        assert_eq!(incremental, recompute_total(&amounts));
    }

    #[test]
    fn test_recompute_is_order_independent() {
        let forward = [10.0, 20.0, 30.0];
        let shuffled = [30.0, 10.0, 20.0];
        assert_eq!(recompute_total(&forward), recompute_total(&shuffled));
    }

    #[test]
    fn test_available_amount_clamps_at_zero() {
        assert_eq!(available_amount(100.0, 40.0), 60.0);
        assert_eq!(available_amount(100.0, 100.0), 0.0);
        assert_eq!(available_amount(100.0, 130.0), 0.0);
    }
}
