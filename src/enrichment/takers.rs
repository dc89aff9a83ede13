//! Per-taker rollups.
//!
//! One implementation of the rollup math backs both consumption paths: the
//! on-demand computation here and the cached `taker_summaries` table the
//! cron job refreshes. Summaries are a cache, never a source of truth, and
//! recomputing from the same ledger state always yields identical totals and
//! identical rank positions.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use rustc_hash::FxHashMap;

use crate::db::models::TakerSummary;
use crate::enrichment::takes::EnrichedTake;

#[derive(Default)]
struct TakerAccumulator {
    total_takes: i64,
    auctions: BTreeSet<(i64, String)>,
    chains: BTreeSet<i64>,
    priced_takes: i64,
    volume_usd: f64,
    profit_takes: i64,
    profit_usd: f64,
    first_take: Option<DateTime<Utc>>,
    last_take: Option<DateTime<Utc>>,
    takes_last_7d: i64,
    takes_last_30d: i64,
    volume_last_7d: f64,
    volume_last_30d: f64,
    priced_7d: bool,
    priced_30d: bool,
}

/// Compute summaries for every taker present in `takes`.
///
/// `now` anchors the 7-day and 30-day windows. The result is sorted by
/// ascending taker address; rank positions are dense per metric, with
/// ordering ties broken by the same ascending-address rule so repeated
/// evaluation is fully deterministic.
pub fn compute_taker_summaries(
    takes: &[EnrichedTake],
    now: DateTime<Utc>,
) -> Vec<TakerSummary> {
    let window_7d = now - Duration::days(7);
    let window_30d = now - Duration::days(30);

    let mut accumulators: FxHashMap<String, TakerAccumulator> = FxHashMap::default();

    for enriched in takes {
        let take = &enriched.take;
        let acc = accumulators.entry(take.taker.clone()).or_default();

        acc.total_takes += 1;
        acc.auctions.insert((take.chain_id, take.auction_address.clone()));
        acc.chains.insert(take.chain_id);

        if let Some(volume) = enriched.usd.amount_taken_usd {
            acc.priced_takes += 1;
            acc.volume_usd += volume;

            if take.timestamp >= window_7d {
                acc.volume_last_7d += volume;
                acc.priced_7d = true;
            }
            if take.timestamp >= window_30d {
                acc.volume_last_30d += volume;
                acc.priced_30d = true;
            }
        }

        if let Some(profit) = enriched.usd.price_differential_usd {
            acc.profit_takes += 1;
            acc.profit_usd += profit;
        }

        acc.first_take = Some(match acc.first_take {
            Some(first) if first <= take.timestamp => first,
            _ => take.timestamp,
        });
        acc.last_take = Some(match acc.last_take {
            Some(last) if last >= take.timestamp => last,
            _ => take.timestamp,
        });

        if take.timestamp >= window_7d {
            acc.takes_last_7d += 1;
        }
        if take.timestamp >= window_30d {
            acc.takes_last_30d += 1;
        }
    }

    let mut summaries: Vec<TakerSummary> = accumulators
        .into_iter()
        .map(|(taker, acc)| {
            let total_volume_usd = (acc.priced_takes > 0).then_some(acc.volume_usd);
            let total_profit_usd = (acc.profit_takes > 0).then_some(acc.profit_usd);
            let avg_take_size_usd =
                (acc.priced_takes > 0).then(|| acc.volume_usd / acc.priced_takes as f64);

            TakerSummary {
                taker,
                total_takes: acc.total_takes,
                unique_auctions: acc.auctions.len() as i64,
                unique_chains: acc.chains.len() as i64,
                active_chains: acc.chains.into_iter().collect(),
                total_volume_usd,
                total_profit_usd,
                avg_take_size_usd,
                first_take: acc.first_take,
                last_take: acc.last_take,
                takes_last_7d: acc.takes_last_7d,
                takes_last_30d: acc.takes_last_30d,
                volume_last_7d: acc.priced_7d.then_some(acc.volume_last_7d),
                volume_last_30d: acc.priced_30d.then_some(acc.volume_last_30d),
                rank_by_takes: None,
                rank_by_volume: None,
                rank_by_profit: None,
                computed_at: now,
            }
        })
        .collect();

    summaries.sort_by(|a, b| a.taker.cmp(&b.taker));

    let take_ranks = dense_ranks(&summaries, |s| Some(s.total_takes as f64));
    let volume_ranks = dense_ranks(&summaries, |s| s.total_volume_usd);
    let profit_ranks = dense_ranks(&summaries, |s| s.total_profit_usd);

    for (i, summary) in summaries.iter_mut().enumerate() {
        summary.rank_by_takes = take_ranks[i];
        summary.rank_by_volume = volume_ranks[i];
        summary.rank_by_profit = profit_ranks[i];
    }

    summaries
}

/// Dense ranking over one metric: equal values share a rank, the next
/// distinct value takes rank + 1. Takers with no value (nothing priced) get
/// no rank rather than a fabricated zero.
fn dense_ranks(
    summaries: &[TakerSummary],
    metric: impl Fn(&TakerSummary) -> Option<f64>,
) -> Vec<Option<i64>> {
    let mut ranked: Vec<(usize, f64)> = summaries
        .iter()
        .enumerate()
        .filter_map(|(i, s)| metric(s).map(|v| (i, v)))
        .collect();

    // summaries is already sorted by taker ascending, and the sort is stable,
    // so equal metric values keep the address tie-break.
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

    let mut ranks = vec![None; summaries.len()];
    let mut current_rank = 0i64;
    let mut previous_value: Option<f64> = None;

    for (index, value) in ranked {
        if previous_value != Some(value) {
            current_rank += 1;
            previous_value = Some(value);
        }
        ranks[index] = Some(current_rank);
    }

    ranks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Take;
    use crate::enrichment::takes::usd_fields;
    use chrono::TimeZone;

    fn enriched(
        taker: &str,
        chain_id: i64,
        auction: &str,
        timestamp: DateTime<Utc>,
        amount_taken: f64,
        from_price: Option<f64>,
        want_price: Option<f64>,
    ) -> EnrichedTake {
        let take = Take {
            chain_id,
            transaction_hash: format!("0x{}-{}", taker, timestamp.timestamp()),
            log_index: 0,
            auction_address: auction.to_string(),
            round_id: 1,
            take_seq: 1,
            taker: taker.to_string(),
            from_token: "0xfrom".to_string(),
            to_token: "0xwant".to_string(),
            amount_taken,
            amount_taken_raw: "0".to_string(),
            amount_paid: amount_taken,
            amount_paid_raw: "0".to_string(),
            price: Some(1.0),
            timestamp,
            seconds_from_round_start: 0,
            block_number: 100,
        };
        let usd = usd_fields(take.amount_taken, take.amount_paid, from_price, want_price);
        EnrichedTake {
            take,
            usd,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn test_recomputation_is_stable() {
        let takes = vec![
            enriched("0xaaa", 1, "0xa1", now() - Duration::days(1), 50.0, Some(2.0), Some(2.0)),
            enriched("0xbbb", 1, "0xa1", now() - Duration::days(2), 10.0, Some(2.0), Some(2.1)),
            enriched("0xaaa", 10, "0xa2", now() - Duration::days(40), 5.0, None, None),
        ];

        let first = compute_taker_summaries(&takes, now());
        let second = compute_taker_summaries(&takes, now());

        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.taker, b.taker);
            assert_eq!(a.total_takes, b.total_takes);
            assert_eq!(a.total_volume_usd, b.total_volume_usd);
            assert_eq!(a.rank_by_takes, b.rank_by_takes);
            assert_eq!(a.rank_by_volume, b.rank_by_volume);
            assert_eq!(a.rank_by_profit, b.rank_by_profit);
        }
    }

    #[test]
    fn test_dense_ranking_shares_rank_on_ties() {
        let takes = vec![
            enriched("0xaaa", 1, "0xa1", now(), 100.0, Some(1.0), Some(1.0)),
            enriched("0xbbb", 1, "0xa1", now(), 100.0, Some(1.0), Some(1.0)),
            enriched("0xccc", 1, "0xa1", now(), 40.0, Some(1.0), Some(1.0)),
        ];

        let summaries = compute_taker_summaries(&takes, now());
        let by_taker: FxHashMap<&str, &TakerSummary> =
            summaries.iter().map(|s| (s.taker.as_str(), s)).collect();

        assert_eq!(by_taker["0xaaa"].rank_by_volume, Some(1));
        assert_eq!(by_taker["0xbbb"].rank_by_volume, Some(1));
        // Dense: the next distinct value is rank 2, not 3.
        assert_eq!(by_taker["0xccc"].rank_by_volume, Some(2));
    }

    #[test]
    fn test_unpriced_taker_gets_no_volume_rank() {
        let takes = vec![
            enriched("0xaaa", 1, "0xa1", now(), 100.0, Some(1.0), Some(1.0)),
            enriched("0xbbb", 1, "0xa1", now(), 100.0, None, None),
        ];

        let summaries = compute_taker_summaries(&takes, now());
        let by_taker: FxHashMap<&str, &TakerSummary> =
            summaries.iter().map(|s| (s.taker.as_str(), s)).collect();

        assert_eq!(by_taker["0xbbb"].total_volume_usd, None);
        assert_eq!(by_taker["0xbbb"].rank_by_volume, None);
        assert_eq!(by_taker["0xbbb"].rank_by_takes, Some(1));
    }

    #[test]
    fn test_recency_windows() {
        let takes = vec![
            enriched("0xaaa", 1, "0xa1", now() - Duration::days(1), 10.0, Some(1.0), Some(1.0)),
            enriched("0xaaa", 1, "0xa1", now() - Duration::days(14), 20.0, Some(1.0), Some(1.0)),
            enriched("0xaaa", 1, "0xa1", now() - Duration::days(60), 30.0, Some(1.0), Some(1.0)),
        ];

        let summaries = compute_taker_summaries(&takes, now());
        let summary = &summaries[0];

        assert_eq!(summary.total_takes, 3);
        assert_eq!(summary.takes_last_7d, 1);
        assert_eq!(summary.takes_last_30d, 2);
        assert_eq!(summary.volume_last_7d, Some(10.0));
        assert_eq!(summary.volume_last_30d, Some(30.0));
        assert_eq!(summary.total_volume_usd, Some(60.0));
    }

    #[test]
    fn test_active_chains_sorted_and_distinct() {
        let takes = vec![
            enriched("0xaaa", 10, "0xa1", now(), 1.0, Some(1.0), Some(1.0)),
            enriched("0xaaa", 1, "0xa2", now(), 1.0, Some(1.0), Some(1.0)),
            enriched("0xaaa", 10, "0xa3", now(), 1.0, Some(1.0), Some(1.0)),
        ];

        let summaries = compute_taker_summaries(&takes, now());
        assert_eq!(summaries[0].active_chains, vec![1, 10]);
        assert_eq!(summaries[0].unique_chains, 2);
        assert_eq!(summaries[0].unique_auctions, 3);
    }
}
