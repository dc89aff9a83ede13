//! Chronological sequence planning for take inserts.
//!
//! `take_seq` must always reflect (block_number, log_index) order, not
//! ingestion order: re-scans and backfills deliver takes out of order. An
//! out-of-order arrival is handled as a sorted insert with an explicit tail
//! shift, so the invariant stays visible and testable instead of hiding
//! behind an auto-incrementing identifier.

/// Chronological position of a take within its round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TakePosition {
    pub block_number: i64,
    pub log_index: i64,
}

/// Where a new take lands in the sequence, and which tail (if any) must
/// shift up by one to make room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertPlan {
    /// 1-based sequence number for the new take.
    pub take_seq: i64,
    /// When Some(n), every existing take with take_seq >= n shifts to
    /// take_seq + 1 before the insert. None means append at the end.
    pub renumber_from: Option<i64>,
}

impl InsertPlan {
    pub fn renumbered(&self) -> bool {
        self.renumber_from.is_some()
    }
}

/// Plan the insert of a new take into a round.
///
/// `existing` must be the round's takes ordered by (block_number, log_index)
/// ascending, which by invariant equals take_seq order. Ties on position sort
/// the existing take first; a true tie cannot occur for distinct events since
/// log indexes are unique within a block.
pub fn plan_insert(existing: &[TakePosition], new: TakePosition) -> InsertPlan {
    let earlier = existing.iter().filter(|p| **p <= new).count();
    let take_seq = (earlier + 1) as i64;

    if earlier == existing.len() {
        InsertPlan {
            take_seq,
            renumber_from: None,
        }
    } else {
        InsertPlan {
            take_seq,
            renumber_from: Some(take_seq),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(block: i64, log: i64) -> TakePosition {
        TakePosition {
            block_number: block,
            log_index: log,
        }
    }

    #[test]
    fn test_first_take_gets_seq_one() {
        let plan = plan_insert(&[], pos(100, 3));
        assert_eq!(plan.take_seq, 1);
        assert_eq!(plan.renumber_from, None);
    }

    #[test]
    fn test_append_at_end_does_not_renumber() {
        let existing = [pos(100, 3), pos(100, 9), pos(105, 1)];
        let plan = plan_insert(&existing, pos(106, 0));
        assert_eq!(plan.take_seq, 4);
        assert!(!plan.renumbered());
    }

    #[test]
    fn test_insert_at_front_shifts_everything() {
        let existing = [pos(100, 3), pos(105, 1)];
        let plan = plan_insert(&existing, pos(99, 7));
        assert_eq!(plan.take_seq, 1);
        assert_eq!(plan.renumber_from, Some(1));
    }

    #[test]
    fn test_insert_in_middle_shifts_tail_only() {
        let existing = [pos(100, 3), pos(100, 9), pos(105, 1)];
        let plan = plan_insert(&existing, pos(100, 5));
        assert_eq!(plan.take_seq, 2);
        assert_eq!(plan.renumber_from, Some(2));
    }

    #[test]
    fn test_log_index_breaks_block_ties() {
        let existing = [pos(100, 3)];
        // Same block, later log index: appended after.
        let plan = plan_insert(&existing, pos(100, 4));
        assert_eq!(plan.take_seq, 2);
        assert!(!plan.renumbered());
    }

    #[test]
    fn test_any_ingestion_order_yields_chronological_seqs() {
        // Deliver six takes in several scrambled orders and replay the plans
        // against an in-memory sequence; the result must always match the
        // chronological sort.
        let chronological = [
            pos(90, 0),
            pos(90, 4),
            pos(100, 1),
            pos(101, 0),
            pos(101, 2),
            pos(110, 5),
        ];
        let orders: Vec<Vec<usize>> = vec![
            vec![0, 1, 2, 3, 4, 5],
            vec![5, 4, 3, 2, 1, 0],
            vec![2, 5, 0, 4, 1, 3],
            vec![3, 0, 5, 1, 4, 2],
        ];

        for order in orders {
            let mut sequence: Vec<TakePosition> = Vec::new();
            for &i in &order {
                let plan = plan_insert(&sequence, chronological[i]);
                sequence.insert((plan.take_seq - 1) as usize, chronological[i]);
            }
            assert_eq!(sequence, chronological, "order {:?} broke the invariant", order);
        }
    }
}
