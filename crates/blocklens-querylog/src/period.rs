//! Named reporting periods.
//!
//! The dashboard's range picker offers a fixed set of ranges; they resolve
//! against a caller-supplied clock so reports are reproducible in tests.

use std::str::FromStr;

use chrono::{NaiveDateTime, NaiveTime, TimeDelta};
use thiserror::Error;

/// A named date range ending now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatsPeriod {
    #[default]
    Today,
    Yesterday,
    Last7Days,
    Last30Days,
}

#[derive(Debug, Error)]
#[error("unknown period {0:?} (expected today, yesterday, 7d or 30d)")]
pub struct UnknownPeriodError(String);

impl FromStr for StatsPeriod {
    type Err = UnknownPeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "today" => Ok(Self::Today),
            "yesterday" => Ok(Self::Yesterday),
            "7d" => Ok(Self::Last7Days),
            "30d" => Ok(Self::Last30Days),
            other => Err(UnknownPeriodError(other.to_string())),
        }
    }
}

impl StatsPeriod {
    /// Resolve to a concrete `[start, end]` pair against the given clock.
    ///
    /// Yesterday ends one second before midnight so it never overlaps
    /// today's first entry; the multi-day ranges include today.
    pub fn resolve(self, now: NaiveDateTime) -> (NaiveDateTime, NaiveDateTime) {
        let midnight = now.date().and_time(NaiveTime::MIN);
        match self {
            Self::Today => (midnight, now),
            Self::Yesterday => (
                midnight - TimeDelta::days(1),
                midnight - TimeDelta::seconds(1),
            ),
            Self::Last7Days => (midnight - TimeDelta::days(6), now),
            Self::Last30Days => (midnight - TimeDelta::days(29), now),
        }
    }
}
