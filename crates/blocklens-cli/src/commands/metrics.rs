//! Exposition-dump inspection.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use anyhow::Context;
use serde::Serialize;
use tracing::info;

use blocklens_history::{ActivityPoint, SnapshotHistory};
use blocklens_metrics::parse;

/// Parse one exposition dump and print the snapshot.
pub fn snapshot(file: &Path) -> anyhow::Result<()> {
    let text =
        fs::read_to_string(file).with_context(|| format!("read dump {}", file.display()))?;
    super::print_json(&parse(&text))
}

#[derive(Serialize)]
struct ActivityReport {
    queries_per_interval: Option<f64>,
    blocked_per_interval: Option<f64>,
    points: Vec<ActivityPoint>,
}

/// Replay a sequence of dumps through the snapshot history and print the
/// derived series, exactly as the dashboard would chart them.
pub fn activity(files: &[PathBuf]) -> anyhow::Result<()> {
    let mut history = SnapshotHistory::new();

    for file in files {
        let text =
            fs::read_to_string(file).with_context(|| format!("read dump {}", file.display()))?;
        let captured_at = fs::metadata(file)
            .and_then(|meta| meta.modified())
            .ok()
            .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or_default();
        history.push_at(captured_at, parse(&text));
    }

    info!(dumps = files.len(), retained = history.len(), "dumps replayed");

    super::print_json(&ActivityReport {
        queries_per_interval: history.queries_per_interval(),
        blocked_per_interval: history.blocked_per_interval(),
        points: history.activity(),
    })
}
