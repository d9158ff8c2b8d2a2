//! Per-file accumulator cache.
//!
//! Historical log files never change once their day rolls over, so their
//! aggregates are computed once and keyed by (mtime, size). Today's file
//! fails that check while Blocky appends to it and is re-parsed on each
//! request. The cache holds derived aggregates only and persists nothing.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, SystemTime};

use chrono::NaiveDateTime;
use tracing::debug;

use crate::files::{log_files_for_range, process_file};
use crate::stats::{StatsAccumulator, StatsReport};
use crate::timeline::{TimelineAccumulator, TimelineBucket};

/// Granularity of cached timelines. Coarser requests re-aggregate from this;
/// finer ones cannot split an hour bucket and bypass the cache.
const CACHE_INTERVAL: Duration = Duration::from_secs(3600);

struct CachedFile {
    modified: SystemTime,
    size: u64,
    stats: StatsAccumulator,
    timeline: TimelineAccumulator,
}

/// Read-through cache of per-file aggregates.
///
/// Safe to share behind an `Arc`: lookups take a read lock, (re)parsing a
/// file takes the write lock only to publish the finished accumulators.
#[derive(Default)]
pub struct StatsCache {
    files: RwLock<HashMap<PathBuf, CachedFile>>,
}

impl StatsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stats for a date range, reusing per-file aggregates where the file is
    /// unchanged since it was last parsed.
    pub fn compute_stats(
        &self,
        log_dir: &Path,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> StatsReport {
        let files = log_files_for_range(log_dir, start, end);
        let mut combined = StatsAccumulator::new(start, end);

        for path in &files {
            self.ensure_cached(path, start, end);
            let cached = self.files.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(file) = cached.get(path) {
                combined.merge(&file.stats);
            }
        }

        combined.finalize(files.len())
    }

    /// Timeline for a date range at the requested interval.
    pub fn compute_timeline(
        &self,
        log_dir: &Path,
        start: NaiveDateTime,
        end: NaiveDateTime,
        interval: Duration,
    ) -> Vec<TimelineBucket> {
        if interval < CACHE_INTERVAL {
            return self.timeline_uncached(log_dir, start, end, interval);
        }

        let files = log_files_for_range(log_dir, start, end);
        let mut combined = TimelineAccumulator::new(CACHE_INTERVAL);

        for path in &files {
            self.ensure_cached(path, start, end);
            let cached = self.files.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(file) = cached.get(path) {
                combined.merge(&file.timeline);
            }
        }

        if interval == CACHE_INTERVAL {
            combined.finalize()
        } else {
            combined.reaggregate_to(interval).finalize()
        }
    }

    /// Number of files currently cached.
    pub fn len(&self) -> usize {
        self.files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all cached aggregates.
    pub fn clear(&self) {
        self.files
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        debug!("stats cache cleared");
    }

    /// Sub-hour intervals are built from the entries directly.
    fn timeline_uncached(
        &self,
        log_dir: &Path,
        start: NaiveDateTime,
        end: NaiveDateTime,
        interval: Duration,
    ) -> Vec<TimelineBucket> {
        let files = log_files_for_range(log_dir, start, end);
        let mut accumulator = TimelineAccumulator::new(interval);
        for path in &files {
            let _ = process_file(path, |entry| accumulator.add(&entry));
        }
        accumulator.finalize()
    }

    /// Make sure `path` has a cache entry matching its current (mtime, size).
    /// Parsing happens outside any lock; an unreadable file caches whatever
    /// was accumulated before the failure, mirroring per-line tolerance.
    fn ensure_cached(&self, path: &Path, start: NaiveDateTime, end: NaiveDateTime) {
        let Ok(meta) = std::fs::metadata(path) else {
            return;
        };
        let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        let size = meta.len();

        {
            let cached = self.files.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(file) = cached.get(path) {
                if file.modified == modified && file.size == size {
                    return;
                }
            }
        }

        debug!(path = %path.display(), "stats cache miss, parsing");
        let mut stats = StatsAccumulator::new(start, end);
        let mut timeline = TimelineAccumulator::new(CACHE_INTERVAL);
        let _ = process_file(path, |entry| {
            stats.add(&entry);
            timeline.add(&entry);
        });

        let mut cached = self.files.write().unwrap_or_else(PoisonError::into_inner);
        cached.insert(
            path.to_path_buf(),
            CachedFile {
                modified,
                size,
                stats,
                timeline,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::fs;

    fn line(time: &str, domain: &str, reason: &str) -> String {
        format!(
            "{time}\t10.0.0.1\tlaptop\t5.0\t{reason}\t{domain}\t1.2.3.4\tNOERROR\tRESOLVED\tA\tupstream"
        )
    }

    fn range() -> (NaiveDateTime, NaiveDateTime) {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        (
            date.and_hms_opt(0, 0, 0).unwrap(),
            date.and_hms_opt(23, 59, 59).unwrap(),
        )
    }

    #[test]
    fn caches_per_file_aggregates() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("2024-03-01_ALL.log"),
            format!(
                "{}\n{}\n",
                line("2024-03-01 10:00:00", "a.example", "RESOLVED"),
                line("2024-03-01 11:00:00", "b.example", "BLOCKED_DENYLIST"),
            ),
        )
        .unwrap();

        let cache = StatsCache::new();
        let (start, end) = range();

        let report = cache.compute_stats(dir.path(), start, end);
        assert_eq!(report.summary.total_queries, 2);
        assert_eq!(report.summary.blocked_queries, 1);
        assert_eq!(cache.len(), 1);

        // Second request is served from the cached accumulator.
        let report = cache.compute_stats(dir.path(), start, end);
        assert_eq!(report.summary.total_queries, 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn changed_file_is_reparsed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("2024-03-01_ALL.log");
        fs::write(
            &path,
            format!("{}\n", line("2024-03-01 10:00:00", "a.example", "RESOLVED")),
        )
        .unwrap();

        let cache = StatsCache::new();
        let (start, end) = range();
        assert_eq!(cache.compute_stats(dir.path(), start, end).summary.total_queries, 1);

        // Append a line; size changes even if mtime granularity is coarse.
        let mut content = fs::read_to_string(&path).unwrap();
        content.push_str(&line("2024-03-01 12:00:00", "b.example", "CACHED"));
        content.push('\n');
        fs::write(&path, content).unwrap();

        let report = cache.compute_stats(dir.path(), start, end);
        assert_eq!(report.summary.total_queries, 2);
        assert_eq!(report.summary.cached_queries, 1);
    }

    #[test]
    fn timeline_reuses_hourly_cache_for_coarse_intervals() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("2024-03-01_ALL.log"),
            format!(
                "{}\n{}\n{}\n",
                line("2024-03-01 01:10:00", "a.example", "RESOLVED"),
                line("2024-03-01 01:40:00", "b.example", "BLOCKED_DENYLIST"),
                line("2024-03-01 13:20:00", "c.example", "RESOLVED"),
            ),
        )
        .unwrap();

        let cache = StatsCache::new();
        let (start, end) = range();

        let hourly = cache.compute_timeline(dir.path(), start, end, Duration::from_secs(3600));
        assert_eq!(hourly.len(), 2);
        assert_eq!(hourly[0].total, 2);
        assert_eq!(hourly[0].blocked, 1);

        let daily = cache.compute_timeline(dir.path(), start, end, Duration::from_secs(86_400));
        assert_eq!(daily.len(), 1);
        assert_eq!(daily[0].total, 3);
    }

    #[test]
    fn sub_hour_timeline_bypasses_the_cache() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("2024-03-01_ALL.log"),
            format!(
                "{}\n{}\n",
                line("2024-03-01 10:03:00", "a.example", "RESOLVED"),
                line("2024-03-01 10:22:00", "b.example", "RESOLVED"),
            ),
        )
        .unwrap();

        let cache = StatsCache::new();
        let (start, end) = range();

        let buckets = cache.compute_timeline(dir.path(), start, end, Duration::from_secs(900));
        assert_eq!(buckets.len(), 2);
        // The fine-grained request itself caches nothing.
        assert!(cache.is_empty());
    }

    #[test]
    fn clear_drops_cached_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("2024-03-01_ALL.log"),
            format!("{}\n", line("2024-03-01 10:00:00", "a.example", "RESOLVED")),
        )
        .unwrap();

        let cache = StatsCache::new();
        let (start, end) = range();
        cache.compute_stats(dir.path(), start, end);
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }
}
