//! Stats and timeline aggregation over a query-log directory.

use std::path::Path;
use std::time::Duration;

use anyhow::bail;
use chrono::Local;

use blocklens_querylog::{
    process_files_streaming, StatsAccumulator, StatsPeriod, TimelineAccumulator,
};

pub fn stats(log_dir: &Path, period: StatsPeriod) -> anyhow::Result<()> {
    let (start, end) = period.resolve(Local::now().naive_local());

    let mut accumulator = StatsAccumulator::new(start, end);
    let files = process_files_streaming(log_dir, start, end, |entry| accumulator.add(&entry))?;

    super::print_json(&accumulator.finalize(files))
}

pub fn timeline(log_dir: &Path, period: StatsPeriod, interval: &str) -> anyhow::Result<()> {
    let interval = parse_interval(interval)?;
    let (start, end) = period.resolve(Local::now().naive_local());

    let mut accumulator = TimelineAccumulator::new(interval);
    process_files_streaming(log_dir, start, end, |entry| accumulator.add(&entry))?;

    super::print_json(&accumulator.finalize())
}

/// Bucket widths offered by the dashboard's timeline view.
fn parse_interval(s: &str) -> anyhow::Result<Duration> {
    let secs = match s {
        "5m" => 300,
        "15m" => 900,
        "1h" => 3_600,
        "1d" => 86_400,
        other => bail!("unsupported interval {other:?} (expected 5m, 15m, 1h or 1d)"),
    };
    Ok(Duration::from_secs(secs))
}
