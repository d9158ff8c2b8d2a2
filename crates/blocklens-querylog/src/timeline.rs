//! Interval bucketing of query-log entries.
//!
//! Buckets are keyed by the entry timestamp truncated to the interval. The
//! stats cache stores hour-granularity accumulators and re-aggregates them
//! into coarser buckets on demand; finer intervals must be built from the
//! entries directly.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::entry::LogEntry;

/// One interval of query activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineBucket {
    pub timestamp: DateTime<Utc>,
    pub total: u64,
    pub blocked: u64,
    pub cached: u64,
}

#[derive(Debug, Clone, Copy, Default)]
struct BucketCounts {
    total: u64,
    blocked: u64,
    cached: u64,
}

/// Incremental interval bucketing. Bucket keys are epoch seconds truncated
/// to the interval; BTreeMap keeps finalize output sorted ascending.
#[derive(Debug)]
pub struct TimelineAccumulator {
    interval_secs: i64,
    buckets: BTreeMap<i64, BucketCounts>,
}

impl TimelineAccumulator {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval_secs: (interval.as_secs().max(1)) as i64,
            buckets: BTreeMap::new(),
        }
    }

    /// Count one entry into its interval bucket.
    pub fn add(&mut self, entry: &LogEntry) {
        let secs = entry.timestamp.and_utc().timestamp();
        let key = secs - secs.rem_euclid(self.interval_secs);
        let bucket = self.buckets.entry(key).or_default();
        bucket.total += 1;
        if entry.is_blocked() {
            bucket.blocked += 1;
        }
        if entry.is_cached() {
            bucket.cached += 1;
        }
    }

    /// Fold another accumulator of the same interval into this one.
    pub fn merge(&mut self, other: &Self) {
        debug_assert_eq!(self.interval_secs, other.interval_secs);
        for (key, counts) in &other.buckets {
            let bucket = self.buckets.entry(*key).or_default();
            bucket.total += counts.total;
            bucket.blocked += counts.blocked;
            bucket.cached += counts.cached;
        }
    }

    /// Re-bucket into a coarser interval. Keys that already share a coarser
    /// bucket are summed; requesting a finer interval than this accumulator
    /// was built with cannot split buckets and simply re-keys them.
    pub fn reaggregate_to(&self, interval: Duration) -> Self {
        let mut out = Self::new(interval);
        for (key, counts) in &self.buckets {
            let coarse = key - key.rem_euclid(out.interval_secs);
            let bucket = out.buckets.entry(coarse).or_default();
            bucket.total += counts.total;
            bucket.blocked += counts.blocked;
            bucket.cached += counts.cached;
        }
        out
    }

    /// Sorted buckets, oldest first.
    pub fn finalize(&self) -> Vec<TimelineBucket> {
        self.buckets
            .iter()
            .filter_map(|(key, counts)| {
                DateTime::from_timestamp(*key, 0).map(|timestamp| TimelineBucket {
                    timestamp,
                    total: counts.total,
                    blocked: counts.blocked,
                    cached: counts.cached,
                })
            })
            .collect()
    }
}

/// Group entries into buckets of the given interval.
pub fn compute_timeline(entries: &[LogEntry], interval: Duration) -> Vec<TimelineBucket> {
    let mut accumulator = TimelineAccumulator::new(interval);
    for entry in entries {
        accumulator.add(entry);
    }
    accumulator.finalize()
}
