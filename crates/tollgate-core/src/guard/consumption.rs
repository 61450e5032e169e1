//! Consumption tracking for observability.
//!
//! Append-only, in-memory log of per-call budget effects and denied
//! attempts, with aggregate read queries. Never consulted by any admission
//! decision path; losing it on restart loses nothing but counters.

use std::sync::RwLock;

use chrono::{DateTime, Utc};

use tollgate_types::admission::{ConsumptionRecord, RejectionRecord};

/// Append-only record of guarded-call budget effects.
#[derive(Debug, Default)]
pub struct ConsumptionTracker {
    records: RwLock<Vec<ConsumptionRecord>>,
    rejections: RwLock<Vec<RejectionRecord>>,
}

impl ConsumptionTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a consumption record for an admitted call.
    pub fn record(&self, record: ConsumptionRecord) {
        self.records
            .write()
            .expect("consumption lock poisoned")
            .push(record);
    }

    /// Append a record for a denied admission attempt.
    pub fn record_rejection(&self, record: RejectionRecord) {
        self.rejections
            .write()
            .expect("consumption lock poisoned")
            .push(record);
    }

    /// Total units consumed at or after `since`.
    pub fn total_consumed_since(&self, since: DateTime<Utc>) -> u64 {
        self.records
            .read()
            .expect("consumption lock poisoned")
            .iter()
            .filter(|r| r.at >= since)
            .map(|r| r.consumed())
            .sum()
    }

    /// Number of admitted calls recorded.
    pub fn admitted_count(&self) -> usize {
        self.records.read().expect("consumption lock poisoned").len()
    }

    /// Number of denied attempts recorded.
    pub fn rejection_count(&self) -> usize {
        self.rejections
            .read()
            .expect("consumption lock poisoned")
            .len()
    }

    /// Mean deficit across all denied attempts, 0.0 when none.
    pub fn average_deficit(&self) -> f64 {
        let rejections = self.rejections.read().expect("consumption lock poisoned");
        if rejections.is_empty() {
            return 0.0;
        }
        let total: u64 = rejections.iter().map(|r| r.deficit).sum();
        total as f64 / rejections.len() as f64
    }

    /// Snapshot of all consumption records, oldest first.
    pub fn snapshot(&self) -> Vec<ConsumptionRecord> {
        self.records
            .read()
            .expect("consumption lock poisoned")
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use tollgate_types::admission::DenialReason;

    fn consumption(action: &str, before: u64, after: u64, at: DateTime<Utc>) -> ConsumptionRecord {
        ConsumptionRecord {
            action: action.into(),
            balance_before: before,
            balance_after: after,
            at,
        }
    }

    fn rejection(action: &str, balance: u64, required: u64) -> RejectionRecord {
        RejectionRecord {
            action: action.into(),
            balance,
            required,
            deficit: required.saturating_sub(balance),
            reason: DenialReason::InsufficientBudget,
            at: Utc::now(),
        }
    }

    #[test]
    fn starts_empty() {
        let tracker = ConsumptionTracker::new();
        assert_eq!(tracker.admitted_count(), 0);
        assert_eq!(tracker.rejection_count(), 0);
        assert_eq!(tracker.average_deficit(), 0.0);
        assert_eq!(tracker.total_consumed_since(Utc::now()), 0);
    }

    #[test]
    fn total_consumed_respects_window() {
        let tracker = ConsumptionTracker::new();
        let now = Utc::now();
        let old = now - ChronoDuration::hours(2);

        tracker.record(consumption("item_lookup", 100, 95, old));
        tracker.record(consumption("item_lookup", 95, 90, now));
        tracker.record(consumption("refresh_listing", 90, 40, now));

        // Everything.
        assert_eq!(
            tracker.total_consumed_since(now - ChronoDuration::days(1)),
            60
        );
        // Only the recent two.
        assert_eq!(
            tracker.total_consumed_since(now - ChronoDuration::minutes(1)),
            55
        );
    }

    #[test]
    fn average_deficit_over_rejections() {
        let tracker = ConsumptionTracker::new();
        tracker.record_rejection(rejection("refresh_listing", 15, 50)); // deficit 35
        tracker.record_rejection(rejection("refresh_listing", 25, 50)); // deficit 25
        assert_eq!(tracker.rejection_count(), 2);
        assert!((tracker.average_deficit() - 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn snapshot_preserves_order() {
        let tracker = ConsumptionTracker::new();
        let now = Utc::now();
        tracker.record(consumption("a", 10, 9, now));
        tracker.record(consumption("b", 9, 7, now));
        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].action, "a");
        assert_eq!(snapshot[1].action, "b");
    }

    #[test]
    fn concurrent_appends_are_safe() {
        use std::sync::Arc;
        use std::thread;

        let tracker = Arc::new(ConsumptionTracker::new());
        let mut handles = vec![];
        for _ in 0..8 {
            let tracker = Arc::clone(&tracker);
            handles.push(thread::spawn(move || {
                for _ in 0..50 {
                    tracker.record(consumption("item_lookup", 5, 4, Utc::now()));
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(tracker.admitted_count(), 400);
    }
}
