//! Exposition parser — Prometheus text format into a [`MetricSnapshot`].
//!
//! The input is the line-oriented Prometheus text exposition format:
//! comment lines start with `#`, data lines are
//! `name{label="value",...} value [timestamp]`. The parser targets the
//! closed vocabulary of `blocky_*` metric names; anything outside it is
//! valid input that produces no output.
//!
//! Within one parse, repeated lines for the same counter accumulate by
//! summation, while single-instance gauges (cache size, blocking flag,
//! refresh timestamp) take the last value seen.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::trace;

use crate::snapshot::{Aggregate, BuildInfo, MetricSnapshot};

/// `name{labels} value`, label block optional. The value capture keeps the
/// rest of the line so an optional trailing timestamp can be ignored.
static LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\w+)(?:\{(.+?)\})?\s+(.+)$").expect("line regex"));

/// One `key="value"` pair inside a label block. No escape handling: Blocky
/// never emits quotes inside label values.
static LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(\w+)="([^"]*)""#).expect("label regex"));

/// One recognized data line, discarded after folding into the snapshot.
struct MetricLine<'a> {
    name: &'a str,
    labels: HashMap<&'a str, &'a str>,
    value: f64,
}

fn parse_line(line: &str) -> Option<MetricLine<'_>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let caps = LINE_RE.captures(line)?;
    let name = caps.get(1)?.as_str();

    // First token of the remainder is the value; a second token would be the
    // exposition timestamp, which carries no information for a live scrape.
    let value: f64 = caps.get(3)?.as_str().split_whitespace().next()?.parse().ok()?;
    if !value.is_finite() {
        return None;
    }

    let mut labels = HashMap::new();
    if let Some(block) = caps.get(2) {
        for pair in LABEL_RE.captures_iter(block.as_str()) {
            if let (Some(key), Some(val)) = (pair.get(1), pair.get(2)) {
                labels.insert(key.as_str(), val.as_str());
            }
        }
    }

    Some(MetricLine { name, labels, value })
}

fn add(aggregate: &mut Aggregate, key: &str, value: f64) {
    *aggregate.entry(key.to_string()).or_insert(0.0) += value;
}

/// Parse a Prometheus exposition payload into a snapshot.
///
/// Total over any input, including the empty string (which yields a snapshot
/// with no fields present). Lines that cannot be interpreted are skipped.
pub fn parse(text: &str) -> MetricSnapshot {
    let mut snapshot = MetricSnapshot::default();

    let mut cache_hits = 0.0;
    let mut cache_misses = 0.0;
    let mut total_queries = 0.0;
    let mut total_responses = 0.0;
    let mut duration_sum = 0.0;
    let mut duration_count = 0.0;
    let mut list_entries = Aggregate::new();
    let mut allowlist_entries = Aggregate::new();
    let mut queries_by_client = Aggregate::new();
    let mut queries_by_type = Aggregate::new();
    let mut responses_by_reason = Aggregate::new();
    let mut responses_by_type = Aggregate::new();
    let mut responses_by_code = Aggregate::new();

    for raw in text.lines() {
        let Some(line) = parse_line(raw) else { continue };

        match line.name {
            "blocky_cache_hits_total" => cache_hits += line.value,
            "blocky_cache_misses_total" => cache_misses += line.value,
            "blocky_cache_entries" => snapshot.cache_entry_count = Some(line.value),
            "blocky_denylist_cache_entries" => {
                if let Some(group) = line.labels.get("group") {
                    add(&mut list_entries, group, line.value);
                }
            }
            "blocky_allowlist_cache_entries" => {
                if let Some(group) = line.labels.get("group") {
                    add(&mut allowlist_entries, group, line.value);
                }
            }
            "blocky_prefetch_hits_total" => snapshot.prefetch_hits = Some(line.value),
            "blocky_prefetches_total" => snapshot.prefetches = Some(line.value),
            "blocky_error_total" => snapshot.errors = Some(line.value),
            "blocky_blocking_enabled" => snapshot.blocking_enabled = Some(line.value == 1.0),
            "blocky_query_total" => {
                total_queries += line.value;
                if let Some(client) = line.labels.get("client") {
                    add(&mut queries_by_client, client, line.value);
                }
                if let Some(query_type) = line.labels.get("type") {
                    add(&mut queries_by_type, query_type, line.value);
                }
            }
            "blocky_response_total" => {
                total_responses += line.value;
                if let Some(reason) = line.labels.get("reason") {
                    add(&mut responses_by_reason, reason, line.value);
                }
                if let Some(response_type) = line.labels.get("response_type") {
                    add(&mut responses_by_type, response_type, line.value);
                }
                if let Some(code) = line.labels.get("response_code") {
                    add(&mut responses_by_code, code, line.value);
                }
            }
            "blocky_request_duration_seconds_sum" => duration_sum += line.value,
            "blocky_request_duration_seconds_count" => duration_count += line.value,
            "blocky_last_list_group_refresh_timestamp_seconds" => {
                snapshot.last_list_refresh = Some(line.value);
            }
            "blocky_failed_downloads_total" => snapshot.failed_downloads = Some(line.value),
            "blocky_build_info" => {
                if let Some(version) = line.labels.get("version") {
                    snapshot.build_info = Some(BuildInfo {
                        version: (*version).to_string(),
                        build_time: line
                            .labels
                            .get("build_time")
                            .copied()
                            .unwrap_or_default()
                            .to_string(),
                    });
                }
            }
            other => trace!(metric = other, "unrecognized metric skipped"),
        }
    }

    if cache_hits > 0.0 {
        snapshot.cache_hits = Some(cache_hits);
    }
    if cache_misses > 0.0 {
        snapshot.cache_misses = Some(cache_misses);
    }
    if !list_entries.is_empty() {
        snapshot.list_entries = Some(list_entries);
    }
    if !allowlist_entries.is_empty() {
        snapshot.allowlist_entries = Some(allowlist_entries);
    }
    if total_queries > 0.0 {
        snapshot.total_queries = Some(total_queries);
        snapshot.queries_by_client = Some(queries_by_client);
        snapshot.queries_by_type = Some(queries_by_type);
    }
    if total_responses > 0.0 {
        snapshot.total_responses = Some(total_responses);
        snapshot.responses_by_reason = Some(responses_by_reason);
        snapshot.responses_by_type = Some(responses_by_type);
        snapshot.responses_by_code = Some(responses_by_code);
    }
    if duration_count > 0.0 {
        snapshot.request_duration_sum = Some(duration_sum);
        snapshot.request_duration_count = Some(duration_count);
    }

    snapshot
}
