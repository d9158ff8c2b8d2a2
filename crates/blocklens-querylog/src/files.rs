//! Log-file discovery and streaming.
//!
//! Blocky writes one file per day: `YYYY-MM-DD_ALL.log` in csv mode, or
//! `YYYY-MM-DD_<client>.log` per client in csv-client mode. When an `_ALL`
//! file exists it already contains every client's queries, so per-client
//! files for the same day are ignored.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::entry::{parse_line, LogEntry};

/// Log files for a single day, `_ALL` preferred, per-client files sorted.
pub fn log_files_for_date(log_dir: &Path, date: NaiveDate) -> Vec<PathBuf> {
    let date_str = date.format("%Y-%m-%d").to_string();

    let all = log_dir.join(format!("{date_str}_ALL.log"));
    if all.is_file() {
        return vec![all];
    }

    let prefix = format!("{date_str}_");
    let mut matches: Vec<PathBuf> = WalkDir::new(log_dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(&prefix) && name.ends_with(".log"))
        })
        .map(walkdir::DirEntry::into_path)
        .collect();
    matches.sort();
    matches
}

/// Log files for every day in the inclusive date range.
pub fn log_files_for_range(
    log_dir: &Path,
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut day = start.date();
    while day <= end.date() {
        files.extend(log_files_for_date(log_dir, day));
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }
    files
}

/// Parse one file, feeding each well-formed entry to `f`. Blank and
/// unparseable lines are skipped.
pub fn process_file(path: &Path, mut f: impl FnMut(LogEntry)) -> anyhow::Result<()> {
    let file =
        File::open(path).with_context(|| format!("open log file {}", path.display()))?;
    let reader = BufReader::new(file);

    for line in reader.lines() {
        let line = line.with_context(|| format!("read log file {}", path.display()))?;
        if line.is_empty() {
            continue;
        }
        match parse_line(&line) {
            Ok(entry) => f(entry),
            Err(_) => continue,
        }
    }
    Ok(())
}

/// Stream every entry in the date range into `f`, returning the number of
/// files visited. Unreadable files are skipped with a warning, the same
/// tolerance bulk parsing applies per line.
pub fn process_files_streaming(
    log_dir: &Path,
    start: NaiveDateTime,
    end: NaiveDateTime,
    mut f: impl FnMut(LogEntry),
) -> anyhow::Result<usize> {
    if !log_dir.is_dir() {
        bail!("log directory {} not found", log_dir.display());
    }

    let files = log_files_for_range(log_dir, start, end);
    debug!(files = files.len(), "streaming log files");

    for path in &files {
        if let Err(error) = process_file(path, &mut f) {
            warn!(path = %path.display(), error = %error, "skipping unreadable log file");
        }
    }
    Ok(files.len())
}

/// Load all entries in the date range into memory, returning them with the
/// number of files visited. Listings that need sorting and pagination use
/// this; aggregation should prefer [`process_files_streaming`].
pub fn load_entries_for_range(
    log_dir: &Path,
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> anyhow::Result<(Vec<LogEntry>, usize)> {
    let mut entries = Vec::new();
    let files = process_files_streaming(log_dir, start, end, |entry| entries.push(entry))?;
    Ok((entries, files))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn line(time: &str, domain: &str) -> String {
        format!(
            "{time}\t10.0.0.1\tlaptop\t5.0\tRESOLVED\t{domain}\t1.2.3.4\tNOERROR\tRESOLVED\tA\tupstream"
        )
    }

    fn range(day: &str) -> (NaiveDateTime, NaiveDateTime) {
        let date = NaiveDate::parse_from_str(day, "%Y-%m-%d").unwrap();
        (
            date.and_hms_opt(0, 0, 0).unwrap(),
            date.and_hms_opt(23, 59, 59).unwrap(),
        )
    }

    #[test]
    fn prefers_the_all_file_for_a_day() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("2024-03-01_ALL.log"), "").unwrap();
        fs::write(dir.path().join("2024-03-01_laptop.log"), "").unwrap();

        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let files = log_files_for_date(dir.path(), date);
        assert_eq!(files, vec![dir.path().join("2024-03-01_ALL.log")]);
    }

    #[test]
    fn falls_back_to_sorted_per_client_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("2024-03-01_phone.log"), "").unwrap();
        fs::write(dir.path().join("2024-03-01_laptop.log"), "").unwrap();
        fs::write(dir.path().join("2024-03-02_laptop.log"), "").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();

        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let files = log_files_for_date(dir.path(), date);
        assert_eq!(
            files,
            vec![
                dir.path().join("2024-03-01_laptop.log"),
                dir.path().join("2024-03-01_phone.log"),
            ]
        );
    }

    #[test]
    fn range_spans_multiple_days() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("2024-03-01_ALL.log"), "").unwrap();
        fs::write(dir.path().join("2024-03-02_ALL.log"), "").unwrap();
        fs::write(dir.path().join("2024-03-05_ALL.log"), "").unwrap();

        let start = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 3, 3)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        let files = log_files_for_range(dir.path(), start, end);
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn streaming_skips_blank_and_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let content = format!(
            "{}\n\nnot a log line\n{}\n",
            line("2024-03-01 10:00:00", "a.example"),
            line("2024-03-01 11:00:00", "b.example"),
        );
        fs::write(dir.path().join("2024-03-01_ALL.log"), content).unwrap();

        let (start, end) = range("2024-03-01");
        let mut seen = Vec::new();
        let files =
            process_files_streaming(dir.path(), start, end, |e| seen.push(e.domain)).unwrap();

        assert_eq!(files, 1);
        assert_eq!(seen, vec!["a.example", "b.example"]);
    }

    #[test]
    fn missing_log_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let (start, end) = range("2024-03-01");
        assert!(process_files_streaming(&missing, start, end, |_| {}).is_err());
    }

    #[test]
    fn load_entries_collects_across_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("2024-03-01_laptop.log"),
            format!("{}\n", line("2024-03-01 10:00:00", "a.example")),
        )
        .unwrap();
        fs::write(
            dir.path().join("2024-03-01_phone.log"),
            format!("{}\n", line("2024-03-01 11:00:00", "b.example")),
        )
        .unwrap();

        let (start, end) = range("2024-03-01");
        let (entries, files) = load_entries_for_range(dir.path(), start, end).unwrap();
        assert_eq!(files, 2);
        assert_eq!(entries.len(), 2);
    }
}
