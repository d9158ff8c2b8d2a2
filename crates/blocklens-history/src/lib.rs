//! blocklens-history — rolling snapshot history and rate derivation.
//!
//! Keeps the most recent [`MetricSnapshot`](blocklens_metrics::MetricSnapshot)s
//! pushed by the poll loop and derives per-interval figures from consecutive
//! pairs. Blocky's counters only move forward between scrapes; a decrease
//! means the upstream process restarted or a counter wrapped. Rather than
//! rebaselining, any interval with a negative delta is dropped, so a restart
//! costs one missing data point instead of a spurious spike or trough.
//!
//! Single writer, synchronous: the history is owned by one poll loop and
//! queried between writes.

pub mod history;

pub use history::{ActivityPoint, HistoryEntry, SnapshotHistory, DEFAULT_CAPACITY};
