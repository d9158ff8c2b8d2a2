//! Filtered, paginated log listings.

use std::path::Path;

use chrono::{Local, NaiveTime, TimeDelta};

use blocklens_querylog::{load_entries_for_range, paginate, LogFilter, StatsPeriod};

pub fn logs(
    log_dir: &Path,
    period: Option<StatsPeriod>,
    filter: LogFilter,
    limit: usize,
    offset: usize,
) -> anyhow::Result<()> {
    let now = Local::now().naive_local();
    let (start, end) = match period {
        Some(period) => period.resolve(now),
        // Listings default to today plus yesterday for more history.
        None => {
            let midnight = now.date().and_time(NaiveTime::MIN);
            (midnight - TimeDelta::days(1), now)
        }
    };

    let (entries, _files) = load_entries_for_range(log_dir, start, end)?;

    let mut filtered = filter.apply(entries);
    filtered.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    super::print_json(&paginate(filtered, offset, limit))
}
