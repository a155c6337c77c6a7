//! Derived-stat aggregation for an owner entity.
//!
//! Always recomputed from the full record set, never patched
//! incrementally, so a cached counter can never drift from the records it
//! summarizes.

use crate::progress::ProgressRecord;

/// Default curriculum size: how many trackable units make up 100 %.
pub const DEFAULT_TOTAL_TRACKABLE_UNITS: u32 = 7;

/// Derived statistics for one owner entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnerStats {
    pub completed_count: u32,
    /// 0–100.
    pub progress_percent: u8,
    /// 0–5.
    pub stars: u8,
}

/// Recompute derived stats from a set of progress records.
///
/// Pure and order-independent: counts the records satisfying the
/// completion predicate, then applies the percent/star formulas with the
/// ratio clamped to 1.0. A zero `total_trackable_units` yields all zeros.
pub fn compute_stats(records: &[ProgressRecord], total_trackable_units: u32) -> OwnerStats {
    let completed_count = records.iter().filter(|r| r.is_completed()).count() as u32;

    if total_trackable_units == 0 {
        return OwnerStats {
            completed_count,
            progress_percent: 0,
            stars: 0,
        };
    }

    let ratio = (completed_count as f64 / total_trackable_units as f64).min(1.0);
    OwnerStats {
        completed_count,
        progress_percent: (ratio * 100.0).round() as u8,
        stars: (ratio * 5.0).round() as u8,
    }
}

/// Mean score across records; 0.0 for an empty set.
pub fn average_score(records: &[ProgressRecord]) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    records.iter().map(|r| r.score as f64).sum::<f64>() / records.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{PlayEvent, ProgressRecord};

    fn completed(subject: &str) -> ProgressRecord {
        let mut r = ProgressRecord::new("p1", "e1", subject);
        r.apply_event(&PlayEvent::scored(100));
        r
    }

    fn incomplete(subject: &str) -> ProgressRecord {
        let mut r = ProgressRecord::new("p1", "e1", subject);
        r.apply_event(&PlayEvent::scored(40));
        r
    }

    #[test]
    fn three_of_seven() {
        let records = vec![
            completed("a"),
            completed("b"),
            completed("c"),
            incomplete("d"),
            incomplete("e"),
        ];
        let stats = compute_stats(&records, 7);
        assert_eq!(stats.completed_count, 3);
        assert_eq!(stats.progress_percent, 43); // round(300/7)
        assert_eq!(stats.stars, 2); // round(15/7)
    }

    #[test]
    fn all_of_seven() {
        let records: Vec<_> = ["a", "b", "c", "d", "e", "f", "g"]
            .iter()
            .map(|s| completed(s))
            .collect();
        let stats = compute_stats(&records, 7);
        assert_eq!(stats.progress_percent, 100);
        assert_eq!(stats.stars, 5);
    }

    #[test]
    fn ratio_clamps_above_total() {
        let records: Vec<_> = (0..10).map(|i| completed(&i.to_string())).collect();
        let stats = compute_stats(&records, 7);
        assert_eq!(stats.completed_count, 10);
        assert_eq!(stats.progress_percent, 100);
        assert_eq!(stats.stars, 5);
    }

    #[test]
    fn zero_total_units_yields_zeros() {
        let stats = compute_stats(&[completed("a")], 0);
        assert_eq!(stats.progress_percent, 0);
        assert_eq!(stats.stars, 0);
    }

    #[test]
    fn empty_record_set() {
        let stats = compute_stats(&[], 7);
        assert_eq!(stats.completed_count, 0);
        assert_eq!(stats.progress_percent, 0);
        assert_eq!(stats.stars, 0);
    }

    #[test]
    fn order_independent() {
        let a = vec![completed("a"), incomplete("b"), completed("c")];
        let b = vec![completed("c"), completed("a"), incomplete("b")];
        assert_eq!(compute_stats(&a, 7), compute_stats(&b, 7));
    }

    #[test]
    fn average_score_over_records() {
        assert_eq!(average_score(&[]), 0.0);
        let records = vec![completed("a"), incomplete("b")]; // 100 and 40
        assert_eq!(average_score(&records), 70.0);
    }
}
