//! Query-log line parsing.
//!
//! Blocky's csv log writer emits one tab-separated line per answered query:
//!
//! ```text
//! timestamp  client_ip  client_name  duration_ms  reason  domain  answer
//! return_code  category  query_type  source
//! ```

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Timestamp layout used by Blocky's log writer.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Fields expected per line. Newer Blocky versions may append columns, which
/// are ignored.
const FIELD_COUNT: usize = 11;

/// Errors from [`parse_line`].
#[derive(Debug, Error)]
pub enum LogParseError {
    #[error("expected {FIELD_COUNT} tab-separated fields, got {0}")]
    FieldCount(usize),

    #[error("bad timestamp {value:?}")]
    Timestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}

/// One answered DNS query as recorded by Blocky.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: NaiveDateTime,
    pub client_ip: String,
    pub client_name: String,
    /// Reverse-resolved client hostname, filled in by an external enricher.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resolved_name: String,
    pub duration_ms: f64,
    pub response_reason: String,
    pub domain: String,
    pub response_answer: String,
    pub return_code: String,
    pub response_category: String,
    pub query_type: String,
    pub source: String,
}

impl LogEntry {
    /// True when the query was answered from a blocklist.
    pub fn is_blocked(&self) -> bool {
        self.response_reason.to_uppercase().starts_with("BLOCKED")
    }

    /// True when the answer came from the resolver cache.
    pub fn is_cached(&self) -> bool {
        let upper = self.response_reason.to_uppercase();
        upper == "CACHED" || upper.starts_with("CACHED ")
    }
}

/// Parse a single TSV log line.
///
/// A malformed duration degrades to `0.0` rather than dropping the entry;
/// the other failure modes are typed errors so bulk loaders can decide to
/// skip.
pub fn parse_line(line: &str) -> Result<LogEntry, LogParseError> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < FIELD_COUNT {
        return Err(LogParseError::FieldCount(fields.len()));
    }

    let timestamp = NaiveDateTime::parse_from_str(fields[0], TIMESTAMP_FORMAT).map_err(
        |source| LogParseError::Timestamp {
            value: fields[0].to_string(),
            source,
        },
    )?;

    Ok(LogEntry {
        timestamp,
        client_ip: fields[1].to_string(),
        client_name: fields[2].to_string(),
        resolved_name: String::new(),
        duration_ms: fields[3].parse().unwrap_or(0.0),
        response_reason: fields[4].to_string(),
        domain: fields[5].to_string(),
        response_answer: fields[6].to_string(),
        return_code: fields[7].to_string(),
        response_category: fields[8].to_string(),
        query_type: fields[9].to_string(),
        source: fields[10].to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_line() -> String {
        [
            "2024-03-01 12:30:45",
            "10.0.0.2",
            "laptop",
            "23.5",
            "BLOCKED_DENYLIST (ads)",
            "tracker.example.com",
            "0.0.0.0",
            "NOERROR",
            "BLOCKED",
            "A",
            "denylist",
        ]
        .join("\t")
    }

    #[test]
    fn parses_a_well_formed_line() {
        let entry = parse_line(&sample_line()).unwrap();
        assert_eq!(
            entry.timestamp,
            NaiveDateTime::parse_from_str("2024-03-01 12:30:45", TIMESTAMP_FORMAT).unwrap()
        );
        assert_eq!(entry.client_ip, "10.0.0.2");
        assert_eq!(entry.client_name, "laptop");
        assert_eq!(entry.duration_ms, 23.5);
        assert_eq!(entry.response_reason, "BLOCKED_DENYLIST (ads)");
        assert_eq!(entry.domain, "tracker.example.com");
        assert_eq!(entry.return_code, "NOERROR");
        assert_eq!(entry.query_type, "A");
        assert_eq!(entry.source, "denylist");
        assert_eq!(entry.resolved_name, "");
    }

    #[test]
    fn too_few_fields_is_an_error() {
        let err = parse_line("2024-03-01 12:30:45\t10.0.0.2").unwrap_err();
        assert!(matches!(err, LogParseError::FieldCount(2)));
    }

    #[test]
    fn bad_timestamp_is_an_error() {
        let line = sample_line().replacen("2024-03-01 12:30:45", "yesterday-ish", 1);
        assert!(matches!(
            parse_line(&line).unwrap_err(),
            LogParseError::Timestamp { .. }
        ));
    }

    #[test]
    fn bad_duration_degrades_to_zero() {
        let line = sample_line().replacen("23.5", "fast", 1);
        assert_eq!(parse_line(&line).unwrap().duration_ms, 0.0);
    }

    #[test]
    fn extra_fields_are_tolerated() {
        let line = format!("{}\tfuture-column", sample_line());
        assert!(parse_line(&line).is_ok());
    }

    #[test]
    fn blocked_classification() {
        let mut entry = parse_line(&sample_line()).unwrap();
        assert!(entry.is_blocked());
        assert!(!entry.is_cached());

        entry.response_reason = "blocked_ip".to_string();
        assert!(entry.is_blocked());

        entry.response_reason = "RESOLVED".to_string();
        assert!(!entry.is_blocked());
    }

    #[test]
    fn cached_classification() {
        let mut entry = parse_line(&sample_line()).unwrap();

        entry.response_reason = "CACHED".to_string();
        assert!(entry.is_cached());

        entry.response_reason = "CACHED (expired)".to_string();
        assert!(entry.is_cached());

        // No word boundary after the prefix means a different reason.
        entry.response_reason = "CACHEDISH".to_string();
        assert!(!entry.is_cached());
    }
}
