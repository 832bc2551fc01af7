//! Retention selection for deployment histories.
//!
//! Both the source-host deployment records and the pages-host deployments
//! are pruned with the same rule: keep the `max_deployments` most recent
//! records of an environment and select everything older for removal.
//!
//! The selection is a pure function of an ordered slice and a threshold.
//! Callers are expected to order the slice newest first; use
//! [`sort_newest_first`] to establish that order from a timestamp key.
//!
//! # Example
//!
//! ```
//! use pagekeeper_retention::{RetentionPolicy, excess, sort_newest_first};
//!
//! let mut records = vec![("a", 1), ("b", 3), ("c", 2)];
//! sort_newest_first(&mut records, |r| r.1);
//!
//! let policy = RetentionPolicy::keep(2);
//! let stale = excess(&records, policy.max_deployments);
//! assert_eq!(stale, &[("a", 1)]);
//! ```

use serde::{Deserialize, Serialize};

/// Default number of deployments kept per environment.
pub const DEFAULT_MAX_DEPLOYMENTS: usize = 5;

/// How many of the most recent deployments to keep per environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    pub max_deployments: usize,
}

impl RetentionPolicy {
    /// Keep the `max_deployments` most recent records.
    pub fn keep(max_deployments: usize) -> Self {
        Self { max_deployments }
    }

    /// Retain nothing. Used when tearing down a preview environment.
    pub fn wipe() -> Self {
        Self { max_deployments: 0 }
    }

    pub fn is_wipe(&self) -> bool {
        self.max_deployments == 0
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::keep(DEFAULT_MAX_DEPLOYMENTS)
    }
}

/// Sort records so the most recent comes first.
///
/// The sort is stable: records with equal keys keep the order the API
/// returned them in.
pub fn sort_newest_first<T, K, F>(records: &mut [T], key: F)
where
    K: Ord,
    F: Fn(&T) -> K,
{
    records.sort_by(|a, b| key(b).cmp(&key(a)));
}

/// Split a newest-first slice into `(retained, excess)`.
pub fn split_retained<T>(records: &[T], max_deployments: usize) -> (&[T], &[T]) {
    let keep = max_deployments.min(records.len());
    records.split_at(keep)
}

/// Records beyond the newest `max_deployments`, oldest last.
///
/// Empty when the history already fits the threshold, so pruning an
/// already-pruned history is a no-op. A threshold of zero selects every
/// record.
pub fn excess<T>(records: &[T], max_deployments: usize) -> &[T] {
    split_retained(records, max_deployments).1
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn default_policy_keeps_five() {
        assert_eq!(RetentionPolicy::default().max_deployments, 5);
        assert!(!RetentionPolicy::default().is_wipe());
        assert!(RetentionPolicy::wipe().is_wipe());
    }

    #[test]
    fn seven_records_threshold_five_selects_two_oldest() {
        let records = vec![7, 6, 5, 4, 3, 2, 1];
        assert_eq!(excess(&records, 5), &[2, 1]);
    }

    #[test]
    fn zero_threshold_selects_everything() {
        let records = vec!["c", "b", "a"];
        assert_eq!(excess(&records, 0), &["c", "b", "a"]);
    }

    #[test]
    fn history_within_threshold_is_untouched() {
        let records = vec![3, 2, 1];
        assert!(excess(&records, 3).is_empty());
        assert!(excess(&records, 10).is_empty());
        let empty: Vec<u8> = Vec::new();
        assert!(excess(&empty, 0).is_empty());
    }

    #[test]
    fn sort_orders_by_key_descending() {
        let mut records = vec![("old", 1), ("new", 9), ("mid", 5)];
        sort_newest_first(&mut records, |r| r.1);
        let names: Vec<_> = records.iter().map(|r| r.0).collect();
        assert_eq!(names, vec!["new", "mid", "old"]);
    }

    #[test]
    fn sort_is_stable_for_equal_keys() {
        let mut records = vec![("first", 1), ("second", 1), ("third", 2)];
        sort_newest_first(&mut records, |r| r.1);
        let names: Vec<_> = records.iter().map(|r| r.0).collect();
        assert_eq!(names, vec!["third", "first", "second"]);
    }

    #[test]
    fn policy_serializes_as_plain_struct() {
        let json = serde_json::to_string(&RetentionPolicy::keep(3)).expect("serialize");
        assert_eq!(json, r#"{"max_deployments":3}"#);
    }

    proptest! {
        /// Exactly max(0, n - m) records are selected.
        #[test]
        fn excess_count_matches_threshold(
            mut keys in proptest::collection::vec(0u32..1000, 0..40),
            max in 0usize..50,
        ) {
            sort_newest_first(&mut keys, |k| *k);
            let selected = excess(&keys, max);
            prop_assert_eq!(selected.len(), keys.len().saturating_sub(max));
        }

        /// Every pruned record is no newer than every retained one, and the
        /// two sets partition the history.
        #[test]
        fn pruned_records_are_older_than_retained(
            mut keys in proptest::collection::vec(0u32..1000, 0..40),
            max in 0usize..50,
        ) {
            sort_newest_first(&mut keys, |k| *k);
            let (retained, pruned) = split_retained(&keys, max);
            prop_assert_eq!(retained.len() + pruned.len(), keys.len());
            if let (Some(oldest_kept), Some(newest_pruned)) = (retained.last(), pruned.first()) {
                prop_assert!(newest_pruned <= oldest_kept);
            }
        }

        /// Pruning the retained half again selects nothing.
        #[test]
        fn prune_is_idempotent(
            mut keys in proptest::collection::vec(0u32..1000, 0..40),
            max in 0usize..50,
        ) {
            sort_newest_first(&mut keys, |k| *k);
            let (retained, _) = split_retained(&keys, max);
            prop_assert!(excess(retained, max).is_empty());
        }
    }
}
