//! Ordered verdict sequence used for both buffer tiers.

use std::borrow::Borrow;
use std::iter::Peekable;

use flakeseg_error::{FlakeError, Result};
use flakeseg_types::PositionVerdict;

/// Verdicts sorted ascending by `(commit_position, hour)`.
///
/// Verdicts with equal keys keep the order they were added in. Every mutator
/// preserves the ordering, so it never needs to be re-established by sorting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct History {
    verdicts: Vec<PositionVerdict>,
}

impl History {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            verdicts: Vec::new(),
        }
    }

    /// Adopt a vector that is already in History order.
    pub fn from_sorted(verdicts: Vec<PositionVerdict>) -> Result<Self> {
        if let Some(i) = verdicts
            .windows(2)
            .position(|w| w[1].sort_key() < w[0].sort_key())
        {
            return Err(FlakeError::contract(format!(
                "verdict {} at {} ({}) sorts before its predecessor at {} ({})",
                i + 1,
                verdicts[i + 1].commit_position,
                verdicts[i + 1].hour,
                verdicts[i].commit_position,
                verdicts[i].hour,
            )));
        }
        Ok(Self { verdicts })
    }

    /// Build a History from verdicts in arbitrary order. The sort is stable,
    /// so equal keys keep their relative order.
    #[must_use]
    pub fn from_unsorted(mut verdicts: Vec<PositionVerdict>) -> Self {
        verdicts.sort_by_key(PositionVerdict::sort_key);
        Self { verdicts }
    }

    #[inline]
    pub fn verdicts(&self) -> &[PositionVerdict] {
        &self.verdicts
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.verdicts.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.verdicts.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PositionVerdict> {
        self.verdicts.iter()
    }

    #[must_use]
    pub fn into_verdicts(self) -> Vec<PositionVerdict> {
        self.verdicts
    }

    /// Insert `verdict` after every verdict whose key is not greater than
    /// its own.
    pub fn insert(&mut self, verdict: PositionVerdict) {
        let key = verdict.sort_key();
        let at = self.verdicts.partition_point(|v| v.sort_key() <= key);
        self.verdicts.insert(at, verdict);
    }

    /// Stable two-way merge. On equal keys, entries of `older` come first.
    #[must_use]
    pub fn merge(older: Self, newer: Self) -> Self {
        let mut verdicts = Vec::with_capacity(older.len() + newer.len());
        verdicts.extend(MergeSorted::new(
            older.verdicts.into_iter(),
            newer.verdicts.into_iter(),
        ));
        Self { verdicts }
    }

    /// Remove and return the oldest `count` verdicts.
    ///
    /// Callers must check `count <= self.len()`.
    pub(crate) fn evict_prefix(&mut self, count: usize) -> Vec<PositionVerdict> {
        self.verdicts.drain(..count).collect()
    }

    pub fn clear(&mut self) {
        self.verdicts.clear();
    }

    /// Whether the ordering invariant holds. Always true for values built
    /// through this type's API.
    pub fn is_sorted(&self) -> bool {
        self.verdicts
            .windows(2)
            .all(|w| w[0].sort_key() <= w[1].sort_key())
    }
}

impl<'a> IntoIterator for &'a History {
    type Item = &'a PositionVerdict;
    type IntoIter = std::slice::Iter<'a, PositionVerdict>;

    fn into_iter(self) -> Self::IntoIter {
        self.verdicts.iter()
    }
}

// ---------------------------------------------------------------------------
// Merge iterator
// ---------------------------------------------------------------------------

/// Lazily merges two History-ordered streams into one.
///
/// Works over owned verdicts (compaction) and borrowed ones (read-only
/// views). On equal keys the `older` stream wins.
pub struct MergeSorted<I: Iterator> {
    older: Peekable<I>,
    newer: Peekable<I>,
}

impl<I: Iterator> MergeSorted<I> {
    pub fn new(older: I, newer: I) -> Self {
        Self {
            older: older.peekable(),
            newer: newer.peekable(),
        }
    }
}

impl<I> Iterator for MergeSorted<I>
where
    I: Iterator,
    I::Item: Borrow<PositionVerdict>,
{
    type Item = I::Item;

    fn next(&mut self) -> Option<Self::Item> {
        let take_newer = match (self.older.peek(), self.newer.peek()) {
            (Some(o), Some(n)) => n.borrow().sort_key() < o.borrow().sort_key(),
            (None, Some(_)) => true,
            _ => false,
        };
        if take_newer {
            self.newer.next()
        } else {
            self.older.next()
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let (older_lo, older_hi) = self.older.size_hint();
        let (newer_lo, newer_hi) = self.newer.size_hint();
        let hi = match (older_hi, newer_hi) {
            (Some(a), Some(b)) => a.checked_add(b),
            _ => None,
        };
        (older_lo.saturating_add(newer_lo), hi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flakeseg_types::{CommitPosition, Hour};
    use proptest::prelude::*;

    fn v(pos: u64, hour: i64) -> PositionVerdict {
        PositionVerdict::simple_expected(CommitPosition::new(pos), Hour::from_hours(hour))
    }

    fn history(items: &[(u64, i64)]) -> History {
        History::from_sorted(items.iter().map(|&(p, h)| v(p, h)).collect())
            .expect("fixture is sorted")
    }

    #[test]
    fn insert_keeps_order_and_tie_order() {
        let mut h = History::new();
        h.insert(v(5, 1));
        h.insert(v(2, 9));
        h.insert(v(5, 1));
        h.insert(v(5, 0));
        h.insert(v(3, 3));
        let keys: Vec<_> = h
            .iter()
            .map(|x| (x.commit_position.get(), x.hour.hours_since_epoch()))
            .collect();
        assert_eq!(keys, vec![(2, 9), (3, 3), (5, 0), (5, 1), (5, 1)]);
    }

    #[test]
    fn equal_keys_keep_insertion_order() {
        let mut h = History::new();
        let first = PositionVerdict::with_details(
            CommitPosition::new(4),
            Hour::from_hours(1),
            flakeseg_types::VerdictDetails {
                is_exonerated: true,
                runs: vec![],
            },
        );
        h.insert(first.clone());
        h.insert(v(4, 1));
        assert_eq!(h.verdicts()[0], first);
        assert!(h.verdicts()[1].is_simple_expected());
    }

    #[test]
    fn from_sorted_rejects_out_of_order() {
        let err = History::from_sorted(vec![v(3, 1), v(2, 1)]).unwrap_err();
        assert!(err.to_string().contains("sorts before its predecessor"));
    }

    #[test]
    fn merge_interleaves() {
        let cold = history(&[(2, 1), (4, 1), (6, 1), (8, 1), (10, 1)]);
        let hot = history(&[(7, 1), (9, 1)]);
        let merged = History::merge(cold, hot);
        let positions: Vec<u64> = merged.iter().map(|x| x.commit_position.get()).collect();
        assert_eq!(positions, vec![2, 4, 6, 7, 8, 9, 10]);
    }

    #[test]
    fn merge_ties_prefer_older() {
        let older = History::from_sorted(vec![PositionVerdict::with_details(
            CommitPosition::new(5),
            Hour::from_hours(5),
            flakeseg_types::VerdictDetails::default(),
        )])
        .unwrap();
        let newer = history(&[(5, 5)]);
        let merged = History::merge(older, newer);
        assert!(!merged.verdicts()[0].is_simple_expected());
        assert!(merged.verdicts()[1].is_simple_expected());
    }

    #[test]
    fn evict_prefix_takes_oldest() {
        let mut h = history(&[(1, 1), (2, 1), (3, 1)]);
        let evicted = h.evict_prefix(2);
        assert_eq!(evicted.len(), 2);
        assert_eq!(evicted[1].commit_position.get(), 2);
        assert_eq!(h.len(), 1);
        assert_eq!(h.verdicts()[0].commit_position.get(), 3);
    }

    proptest! {
        #[test]
        fn prop_insert_sequence_stays_sorted(items in prop::collection::vec((0u64..50, 0i64..10), 0..200)) {
            let mut h = History::new();
            for (p, hr) in &items {
                h.insert(v(*p, *hr));
                prop_assert!(h.is_sorted());
            }
            prop_assert_eq!(h.len(), items.len());
        }

        #[test]
        fn prop_merge_is_sorted_permutation(
            a in prop::collection::vec((0u64..100, 0i64..5), 0..100),
            b in prop::collection::vec((0u64..100, 0i64..5), 0..100),
        ) {
            let ha = History::from_unsorted(a.iter().map(|&(p, h)| v(p, h)).collect());
            let hb = History::from_unsorted(b.iter().map(|&(p, h)| v(p, h)).collect());
            let merged = History::merge(ha, hb);
            prop_assert!(merged.is_sorted());

            let mut expected: Vec<_> = a.iter().chain(b.iter()).copied().collect();
            expected.sort_unstable();
            let mut got: Vec<_> = merged
                .iter()
                .map(|x| (x.commit_position.get(), x.hour.hours_since_epoch()))
                .collect();
            got.sort_unstable();
            prop_assert_eq!(got, expected);
        }
    }
}
