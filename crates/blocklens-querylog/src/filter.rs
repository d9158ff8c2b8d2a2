//! Filtering and pagination of log listings.

use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

use crate::entry::LogEntry;

/// Coarse classification used by the `class` filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryClass {
    Blocked,
    Cached,
    /// Neither blocked nor served from cache.
    Resolved,
}

#[derive(Debug, Error)]
#[error("unknown entry class {0:?} (expected blocked, cached or resolved)")]
pub struct UnknownClassError(String);

impl FromStr for EntryClass {
    type Err = UnknownClassError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blocked" => Ok(Self::Blocked),
            "cached" => Ok(Self::Cached),
            "resolved" => Ok(Self::Resolved),
            other => Err(UnknownClassError(other.to_string())),
        }
    }
}

impl EntryClass {
    pub fn matches(self, entry: &LogEntry) -> bool {
        match self {
            Self::Blocked => entry.is_blocked(),
            Self::Cached => entry.is_cached(),
            Self::Resolved => !entry.is_blocked() && !entry.is_cached(),
        }
    }
}

/// Filter criteria for log listings. Empty criteria match everything.
#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    /// Case-insensitive substring matched against client IP, client name
    /// and resolved hostname.
    pub client: Option<String>,
    /// Case-insensitive substring matched against the queried domain.
    pub domain: Option<String>,
    pub class: Option<EntryClass>,
}

impl LogFilter {
    pub fn is_empty(&self) -> bool {
        self.client.is_none() && self.domain.is_none() && self.class.is_none()
    }

    pub fn matches(&self, entry: &LogEntry) -> bool {
        if let Some(client) = &self.client {
            let needle = client.to_lowercase();
            let hit = entry.client_ip.to_lowercase().contains(&needle)
                || entry.client_name.to_lowercase().contains(&needle)
                || entry.resolved_name.to_lowercase().contains(&needle);
            if !hit {
                return false;
            }
        }
        if let Some(domain) = &self.domain {
            if !entry.domain.to_lowercase().contains(&domain.to_lowercase()) {
                return false;
            }
        }
        if let Some(class) = self.class {
            if !class.matches(entry) {
                return false;
            }
        }
        true
    }

    pub fn apply(&self, entries: Vec<LogEntry>) -> Vec<LogEntry> {
        if self.is_empty() {
            return entries;
        }
        entries.into_iter().filter(|e| self.matches(e)).collect()
    }
}

/// One page of a log listing.
#[derive(Debug, Clone, Serialize)]
pub struct LogPage {
    /// Entries matching the filter before pagination.
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
    pub entries: Vec<LogEntry>,
}

/// Slice a page out of already-ordered entries. An offset beyond the end
/// yields an empty page with the correct total.
pub fn paginate(entries: Vec<LogEntry>, offset: usize, limit: usize) -> LogPage {
    let total = entries.len();
    let entries: Vec<LogEntry> = entries.into_iter().skip(offset).take(limit).collect();
    LogPage {
        total,
        offset,
        limit,
        entries,
    }
}
