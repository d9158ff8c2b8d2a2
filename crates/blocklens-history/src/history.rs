//! Snapshot ring buffer and the series derived from it.

use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tracing::debug;

use blocklens_metrics::MetricSnapshot;

/// Snapshots retained by default. At the dashboard's 10s poll interval this
/// covers five minutes of history.
pub const DEFAULT_CAPACITY: usize = 30;

/// One retained scrape. Immutable once appended.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// Capture time, unix epoch milliseconds.
    pub captured_at: u64,
    pub snapshot: MetricSnapshot,
}

/// One point of the cleaned activity series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityPoint {
    /// Capture time of the newer snapshot in the pair, epoch milliseconds.
    pub timestamp: u64,
    /// Queries answered in the interval.
    pub total: f64,
    /// Blocked responses in the interval.
    pub blocked: f64,
}

/// FIFO buffer of snapshots with derived per-interval queries.
///
/// The buffer is exclusively owned: entries are appended by `push` and
/// removed only by eviction or `clear`, never mutated in place.
#[derive(Debug)]
pub struct SnapshotHistory {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl Default for SnapshotHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotHistory {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// A history bounded to `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a snapshot captured now, evicting the oldest entry beyond
    /// capacity.
    pub fn push(&mut self, snapshot: MetricSnapshot) {
        self.push_at(epoch_millis(), snapshot);
    }

    /// Append a snapshot with an explicit capture time. Drivers that already
    /// timestamp their fetch cycle, and tests, use this directly.
    pub fn push_at(&mut self, captured_at: u64, snapshot: MetricSnapshot) {
        self.entries.push_back(HistoryEntry {
            captured_at,
            snapshot,
        });
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
        debug!(entries = self.entries.len(), "snapshot pushed");
    }

    /// Drop all entries. Used on reconnect or explicit reset.
    pub fn clear(&mut self) {
        self.entries.clear();
        debug!("history cleared");
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in arrival order, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    /// The most recently pushed entry.
    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    /// Difference of `extract` between the two most recent snapshots.
    ///
    /// `None` with fewer than two entries, and `None` when the delta is
    /// negative: a negative delta means the upstream counter reset, and the
    /// misleading negative rate is suppressed rather than reported.
    pub fn latest_delta<F>(&self, extract: F) -> Option<f64>
    where
        F: Fn(&MetricSnapshot) -> f64,
    {
        let len = self.entries.len();
        if len < 2 {
            return None;
        }
        let prev = &self.entries[len - 2].snapshot;
        let curr = &self.entries[len - 1].snapshot;
        let delta = extract(curr) - extract(prev);
        (delta >= 0.0).then_some(delta)
    }

    /// Queries answered during the most recent poll interval.
    pub fn queries_per_interval(&self) -> Option<f64> {
        self.latest_delta(|m| m.total_queries.unwrap_or(0.0))
    }

    /// Blocked responses during the most recent poll interval.
    pub fn blocked_per_interval(&self) -> Option<f64> {
        self.latest_delta(MetricSnapshot::blocked_responses)
    }

    /// Per-interval activity derived from every consecutive snapshot pair.
    ///
    /// A pair contributes a point only when both deltas are non-negative;
    /// pairs spanning a counter reset are dropped entirely rather than
    /// zero-filled, so the series may be shorter than `len() - 1` and have
    /// uneven time gaps. Missing counters count as zero here, because a
    /// snapshot without traffic fields still anchors the interval.
    pub fn activity(&self) -> Vec<ActivityPoint> {
        self.entries
            .iter()
            .zip(self.entries.iter().skip(1))
            .filter_map(|(prev, curr)| {
                let total = curr.snapshot.total_queries.unwrap_or(0.0)
                    - prev.snapshot.total_queries.unwrap_or(0.0);
                let blocked =
                    curr.snapshot.blocked_responses() - prev.snapshot.blocked_responses();
                (total >= 0.0 && blocked >= 0.0).then(|| ActivityPoint {
                    timestamp: curr.captured_at,
                    total,
                    blocked,
                })
            })
            .collect()
    }
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
