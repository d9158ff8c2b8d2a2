//! Aggregate statistics over query-log entries.
//!
//! `StatsAccumulator` is fed one entry at a time, merges with other
//! accumulators (the stats cache keeps one per file), and finalizes into the
//! report the dashboard renders.

use std::collections::{BTreeMap, HashMap};

use chrono::{NaiveDateTime, Timelike};
use serde::Serialize;

use crate::entry::LogEntry;

/// Breakdown lists are truncated to this many rows.
const TOP_N: usize = 20;

/// The full stats payload for one reporting period.
#[derive(Debug, Clone, Serialize)]
pub struct StatsReport {
    pub period: Period,
    pub summary: Summary,
    pub hourly: Vec<HourlyBucket>,
    pub top_domains: Vec<DomainCount>,
    pub top_blocked: Vec<BlockedDomain>,
    pub clients: Vec<ClientStats>,
    pub query_types: BTreeMap<String, u64>,
    pub response_categories: BTreeMap<String, u64>,
    pub return_codes: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Period {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub files_parsed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub total_queries: u64,
    pub blocked_queries: u64,
    pub cached_queries: u64,
    pub unique_domains: usize,
    pub unique_clients: usize,
    pub avg_duration_ms: f64,
    pub p95_duration_ms: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct HourlyBucket {
    pub hour: u32,
    pub total: u64,
    pub blocked: u64,
    pub cached: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DomainCount {
    pub domain: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BlockedDomain {
    pub domain: String,
    pub count: u64,
    /// Reason recorded the first time this domain was seen blocked.
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClientStats {
    pub ip: String,
    pub name: String,
    pub total: u64,
    pub blocked: u64,
}

/// Incremental aggregation of log entries for one reporting period.
#[derive(Debug)]
pub struct StatsAccumulator {
    start: NaiveDateTime,
    end: NaiveDateTime,
    hourly: [HourlyBucket; 24],
    domain_counts: HashMap<String, u64>,
    blocked_domains: HashMap<String, BlockedDomain>,
    clients: HashMap<String, ClientStats>,
    query_types: BTreeMap<String, u64>,
    response_categories: BTreeMap<String, u64>,
    return_codes: BTreeMap<String, u64>,
    durations: Vec<f64>,
    duration_sum: f64,
    total_queries: u64,
    blocked_queries: u64,
    cached_queries: u64,
}

impl StatsAccumulator {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        let mut hourly = [HourlyBucket::default(); 24];
        for (hour, bucket) in hourly.iter_mut().enumerate() {
            bucket.hour = hour as u32;
        }
        Self {
            start,
            end,
            hourly,
            domain_counts: HashMap::new(),
            blocked_domains: HashMap::new(),
            clients: HashMap::new(),
            query_types: BTreeMap::new(),
            response_categories: BTreeMap::new(),
            return_codes: BTreeMap::new(),
            durations: Vec::new(),
            duration_sum: 0.0,
            total_queries: 0,
            blocked_queries: 0,
            cached_queries: 0,
        }
    }

    /// Fold one entry into the running aggregates.
    pub fn add(&mut self, entry: &LogEntry) {
        self.total_queries += 1;

        let blocked = entry.is_blocked();
        let cached = entry.is_cached();
        if blocked {
            self.blocked_queries += 1;
        }
        if cached {
            self.cached_queries += 1;
        }

        let bucket = &mut self.hourly[entry.timestamp.hour() as usize];
        bucket.total += 1;
        if blocked {
            bucket.blocked += 1;
        }
        if cached {
            bucket.cached += 1;
        }

        *self.domain_counts.entry(entry.domain.clone()).or_insert(0) += 1;

        if blocked {
            self.blocked_domains
                .entry(entry.domain.clone())
                .and_modify(|d| d.count += 1)
                .or_insert_with(|| BlockedDomain {
                    domain: entry.domain.clone(),
                    count: 1,
                    reason: entry.response_reason.clone(),
                });
        }

        self.clients
            .entry(entry.client_ip.clone())
            .and_modify(|c| {
                c.total += 1;
                if blocked {
                    c.blocked += 1;
                }
            })
            .or_insert_with(|| ClientStats {
                ip: entry.client_ip.clone(),
                name: entry.client_name.clone(),
                total: 1,
                blocked: u64::from(blocked),
            });

        *self.query_types.entry(entry.query_type.clone()).or_insert(0) += 1;
        *self
            .response_categories
            .entry(entry.response_category.clone())
            .or_insert(0) += 1;
        *self.return_codes.entry(entry.return_code.clone()).or_insert(0) += 1;

        self.durations.push(entry.duration_ms);
        self.duration_sum += entry.duration_ms;
    }

    /// Fold another accumulator into this one. The reporting period stays
    /// this accumulator's; per-file accumulators are merged into a combined
    /// one that carries the request's period.
    pub fn merge(&mut self, other: &Self) {
        for (mine, theirs) in self.hourly.iter_mut().zip(other.hourly.iter()) {
            mine.total += theirs.total;
            mine.blocked += theirs.blocked;
            mine.cached += theirs.cached;
        }
        for (domain, count) in &other.domain_counts {
            *self.domain_counts.entry(domain.clone()).or_insert(0) += count;
        }
        for (domain, blocked) in &other.blocked_domains {
            self.blocked_domains
                .entry(domain.clone())
                .and_modify(|d| d.count += blocked.count)
                .or_insert_with(|| blocked.clone());
        }
        for (ip, client) in &other.clients {
            self.clients
                .entry(ip.clone())
                .and_modify(|c| {
                    c.total += client.total;
                    c.blocked += client.blocked;
                })
                .or_insert_with(|| client.clone());
        }
        for (key, count) in &other.query_types {
            *self.query_types.entry(key.clone()).or_insert(0) += count;
        }
        for (key, count) in &other.response_categories {
            *self.response_categories.entry(key.clone()).or_insert(0) += count;
        }
        for (key, count) in &other.return_codes {
            *self.return_codes.entry(key.clone()).or_insert(0) += count;
        }
        self.durations.extend_from_slice(&other.durations);
        self.duration_sum += other.duration_sum;
        self.total_queries += other.total_queries;
        self.blocked_queries += other.blocked_queries;
        self.cached_queries += other.cached_queries;
    }

    /// Produce the final report, consuming the accumulator.
    pub fn finalize(mut self, files_parsed: usize) -> StatsReport {
        let mut summary = Summary {
            total_queries: self.total_queries,
            blocked_queries: self.blocked_queries,
            cached_queries: self.cached_queries,
            unique_domains: self.domain_counts.len(),
            unique_clients: self.clients.len(),
            avg_duration_ms: 0.0,
            p95_duration_ms: 0.0,
        };

        if !self.durations.is_empty() {
            let avg = self.duration_sum / self.durations.len() as f64;
            summary.avg_duration_ms = (avg * 10.0).round() / 10.0;
            self.durations.sort_unstable_by(f64::total_cmp);
            let p95_idx = (self.durations.len() as f64 * 0.95) as usize;
            summary.p95_duration_ms = self.durations[p95_idx.min(self.durations.len() - 1)];
        }

        let top_domains = top_n(&self.domain_counts, TOP_N);

        let mut top_blocked: Vec<BlockedDomain> =
            self.blocked_domains.into_values().collect();
        top_blocked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.domain.cmp(&b.domain)));
        top_blocked.truncate(TOP_N);

        let mut clients: Vec<ClientStats> = self.clients.into_values().collect();
        clients.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.ip.cmp(&b.ip)));

        StatsReport {
            period: Period {
                start: self.start,
                end: self.end,
                files_parsed,
            },
            summary,
            hourly: self.hourly.to_vec(),
            top_domains,
            top_blocked,
            clients,
            query_types: self.query_types,
            response_categories: self.response_categories,
            return_codes: self.return_codes,
        }
    }
}

/// Convenience over the incremental API for callers that already hold all
/// entries in memory.
pub fn compute_stats(
    entries: &[LogEntry],
    start: NaiveDateTime,
    end: NaiveDateTime,
    files_parsed: usize,
) -> StatsReport {
    let mut accumulator = StatsAccumulator::new(start, end);
    for entry in entries {
        accumulator.add(entry);
    }
    accumulator.finalize(files_parsed)
}

fn top_n(counts: &HashMap<String, u64>, n: usize) -> Vec<DomainCount> {
    let mut list: Vec<DomainCount> = counts
        .iter()
        .map(|(domain, count)| DomainCount {
            domain: domain.clone(),
            count: *count,
        })
        .collect();
    list.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.domain.cmp(&b.domain)));
    list.truncate(n);
    list
}
