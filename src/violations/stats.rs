// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Live violation counters

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use super::ViolationStore;

/// Counters shown on the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ViolationStats {
    pub total: usize,
    pub today: usize,
    pub pending: usize,
    pub notified: usize,
}

/// Recomputes stats from a ledger snapshot on every call.
///
/// "Today" is the calendar day of `now` at a fixed UTC offset.
pub struct StatsAggregator {
    store: Arc<ViolationStore>,
    zone: FixedOffset,
}

impl StatsAggregator {
    pub fn new(store: Arc<ViolationStore>, zone: FixedOffset) -> Self {
        Self { store, zone }
    }

    pub fn compute(&self, now: DateTime<Utc>) -> ViolationStats {
        let today = now.with_timezone(&self.zone).date_naive();

        let mut stats = ViolationStats::default();
        for record in self.store.list() {
            stats.total += 1;
            if record.timestamp.with_timezone(&self.zone).date_naive() == today {
                stats.today += 1;
            }
            if record.notified {
                stats.notified += 1;
            } else {
                stats.pending += 1;
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::violations::{NewViolation, ViolationId, ViolationRecord};
    use chrono::{Duration, TimeZone};

    fn append_at(store: &ViolationStore, timestamp: DateTime<Utc>) -> ViolationId {
        let record = ViolationRecord::new(
            ViolationId::new(),
            NewViolation {
                employee_id: None,
                employee_name: None,
                missing_ppe: vec!["helmet".into()],
                timestamp,
                location: "Main Camera".into(),
                annotated_image: None,
            },
        )
        .unwrap();
        store.append(record).unwrap()
    }

    #[test]
    fn test_counts_follow_ledger() {
        let store = Arc::new(ViolationStore::in_memory());
        let stats = StatsAggregator::new(store.clone(), FixedOffset::east_opt(0).unwrap());
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 15, 0, 0).unwrap();

        let a = append_at(&store, now - Duration::hours(2));
        append_at(&store, now - Duration::hours(1));
        append_at(&store, now - Duration::days(1));
        assert_eq!(
            stats.compute(now),
            ViolationStats { total: 3, today: 2, pending: 3, notified: 0 }
        );

        store.mark_notified(&a, now).unwrap();
        assert_eq!(
            stats.compute(now),
            ViolationStats { total: 3, today: 2, pending: 2, notified: 1 }
        );

        store.clear().unwrap();
        assert_eq!(stats.compute(now), ViolationStats::default());
    }

    #[test]
    fn test_today_uses_configured_offset() {
        let store = Arc::new(ViolationStore::in_memory());
        // 23:30 UTC on the 17th is already the 18th at UTC+2
        append_at(&store, Utc.with_ymd_and_hms(2026, 10, 17, 23, 30, 0).unwrap());
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 6, 0, 0).unwrap();

        let utc = StatsAggregator::new(store.clone(), FixedOffset::east_opt(0).unwrap());
        let plus_two = StatsAggregator::new(store, FixedOffset::east_opt(2 * 3600).unwrap());
        assert_eq!(utc.compute(now).today, 0);
        assert_eq!(plus_two.compute(now).today, 1);
    }
}
