//! Snapshot data model.
//!
//! A `MetricSnapshot` is one fully-parsed metrics payload captured at a
//! point in time. Every field is optional: absence means the metric was not
//! reported in that scrape, and consumers must treat it as "unknown", not as
//! zero. An accumulator that nets to exactly zero is indistinguishable from
//! one that was never reported and is likewise absent.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Label value → summed counter value.
pub type Aggregate = BTreeMap<String, f64>;

/// Reason substring marking a response as blocked, matched case-insensitively
/// so new Blocky block reasons (BLOCKED_DENYLIST, BLOCKED_IP, ...) count
/// without a hardcoded list.
const BLOCKED_MARKER: &str = "BLOCKED";

/// One parsed scrape of Blocky's metrics endpoint.
///
/// Serializes with camelCase keys and absent fields omitted, the shape the
/// dashboard consumes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_hits: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_misses: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_entry_count: Option<f64>,
    /// Denylist entry counts per list group.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_entries: Option<Aggregate>,
    /// Allowlist entry counts per list group.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowlist_entries: Option<Aggregate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefetch_hits: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefetches: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocking_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_queries: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queries_by_client: Option<Aggregate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queries_by_type: Option<Aggregate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_responses: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub responses_by_reason: Option<Aggregate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub responses_by_type: Option<Aggregate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub responses_by_code: Option<Aggregate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_duration_sum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_duration_count: Option<f64>,
    /// Unix timestamp of the last blocklist refresh.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_list_refresh: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_downloads: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_info: Option<BuildInfo>,
}

/// Version information lifted from the `blocky_build_info` labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfo {
    pub version: String,
    #[serde(default)]
    pub build_time: String,
}

impl MetricSnapshot {
    /// Sum of response counters whose reason marks a blocked answer.
    ///
    /// Returns 0.0 when `responses_by_reason` is absent, which makes the
    /// value directly usable in delta computations where absence counts
    /// as zero.
    pub fn blocked_responses(&self) -> f64 {
        let Some(reasons) = &self.responses_by_reason else {
            return 0.0;
        };
        reasons
            .iter()
            .filter(|(reason, _)| reason.to_uppercase().contains(BLOCKED_MARKER))
            .map(|(_, count)| count)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_with_reasons(pairs: &[(&str, f64)]) -> MetricSnapshot {
        let reasons: Aggregate = pairs
            .iter()
            .map(|(reason, count)| (reason.to_string(), *count))
            .collect();
        MetricSnapshot {
            responses_by_reason: Some(reasons),
            ..Default::default()
        }
    }

    #[test]
    fn blocked_responses_sums_matching_reasons() {
        let snapshot = snapshot_with_reasons(&[
            ("BLOCKED_DENYLIST", 3.0),
            ("BLOCKED_IP", 2.0),
            ("RESOLVED", 9.0),
        ]);
        assert_eq!(snapshot.blocked_responses(), 5.0);
    }

    #[test]
    fn blocked_responses_matches_case_insensitively() {
        let snapshot = snapshot_with_reasons(&[("blocked (custom)", 4.0), ("CACHED", 1.0)]);
        assert_eq!(snapshot.blocked_responses(), 4.0);
    }

    #[test]
    fn blocked_responses_absent_map_is_zero() {
        assert_eq!(MetricSnapshot::default().blocked_responses(), 0.0);
    }

    #[test]
    fn absent_fields_are_omitted_from_json() {
        let json = serde_json::to_string(&MetricSnapshot::default()).unwrap();
        assert_eq!(json, "{}");
    }

    #[test]
    fn present_fields_use_camel_case_keys() {
        let snapshot = MetricSnapshot {
            cache_entry_count: Some(500.0),
            build_info: Some(BuildInfo {
                version: "v0.24".to_string(),
                build_time: String::new(),
            }),
            ..Default::default()
        };
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"cacheEntryCount\":500.0"));
        assert!(json.contains("\"buildInfo\""));
        assert!(json.contains("\"buildTime\":\"\""));
    }
}
