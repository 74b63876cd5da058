//! Running statistics over classified log entries
//!
//! The aggregator is owned by the watch loop and mutated from that task only.
//! Other tasks never touch it directly: once per cycle it publishes an
//! immutable [`StatsSnapshot`] into an `ArcSwap`, and readers load the latest
//! one through a [`SnapshotHandle`] without blocking the writer.

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use logwatch_types::{LevelCounts, LogEntry, LogLevel};

use crate::buffer::RingBuffer;
use crate::config::WatchConfig;
use crate::filter::KeywordFilter;

/// Shared log entry; one entry may sit in several lists at once
pub type ArcLogEntry = Arc<LogEntry>;

/// Mutable aggregate state
#[derive(Clone, Debug)]
struct AggregateStats {
    total_lines: u64,
    level_counts: LevelCounts,
    keyword_counts: BTreeMap<String, u64>,
    recent_entries: RingBuffer<ArcLogEntry>,
    error_entries: Vec<ArcLogEntry>,
    keyword_matches: RingBuffer<ArcLogEntry>,
    processing_time: Duration,
}

/// Result of recording one entry
#[derive(Clone, Debug)]
pub struct Recorded {
    pub entry: ArcLogEntry,
    pub keyword_match: bool,
}

/// Incrementally maintained counts, recent entries, errors and keyword matches
pub struct StatsAggregator {
    stats: AggregateStats,
    published: Arc<ArcSwap<StatsSnapshot>>,
}

impl StatsAggregator {
    /// Create an aggregator with explicit buffer sizes
    pub fn new(recent_capacity: usize, keyword_match_capacity: usize) -> Self {
        Self {
            stats: AggregateStats {
                total_lines: 0,
                level_counts: LevelCounts::default(),
                keyword_counts: BTreeMap::new(),
                recent_entries: RingBuffer::new(recent_capacity),
                error_entries: Vec::new(),
                keyword_matches: RingBuffer::new(keyword_match_capacity),
                processing_time: Duration::ZERO,
            },
            published: Arc::new(ArcSwap::from_pointee(StatsSnapshot::empty())),
        }
    }

    pub fn from_config(config: &WatchConfig) -> Self {
        Self::new(config.recent_capacity, config.keyword_match_capacity)
    }

    /// Record one entry: count it, keep it in the recent ring, and keep it
    /// in the error list if it is an error
    pub fn update(&mut self, entry: LogEntry) -> ArcLogEntry {
        let entry = Arc::new(entry);
        let stats = &mut self.stats;

        stats.total_lines += 1;
        stats.level_counts.increment(entry.level);
        stats.recent_entries.push(Arc::clone(&entry));
        if entry.is_error() {
            stats.error_entries.push(Arc::clone(&entry));
        }

        entry
    }

    /// Record an entry and track it if its raw line contains `keyword`
    /// (case-sensitive literal match)
    pub fn update_with_keyword(&mut self, entry: LogEntry, keyword: &str) -> Recorded {
        self.update_with_filter(entry, &KeywordFilter::new(keyword))
    }

    /// Record an entry and track it if `filter` matches its raw line
    pub fn update_with_filter(&mut self, entry: LogEntry, filter: &KeywordFilter) -> Recorded {
        let entry = self.update(entry);
        let keyword_match = filter.matches(&entry.raw_line);

        if keyword_match {
            self.stats.keyword_matches.push(Arc::clone(&entry));
            *self
                .stats
                .keyword_counts
                .entry(filter.keyword().to_string())
                .or_insert(0) += 1;
        }

        Recorded {
            entry,
            keyword_match,
        }
    }

    /// Add time spent classifying and aggregating
    pub fn add_processing_time(&mut self, elapsed: Duration) {
        self.stats.processing_time += elapsed;
    }

    pub fn total_lines(&self) -> u64 {
        self.stats.total_lines
    }

    /// Copy the current state into an immutable snapshot
    pub fn snapshot(&self) -> StatsSnapshot {
        let stats = &self.stats;
        StatsSnapshot {
            total_lines: stats.total_lines,
            level_counts: stats.level_counts,
            keyword_counts: stats.keyword_counts.clone(),
            recent_entries: stats.recent_entries.to_vec(),
            error_entries: stats.error_entries.clone(),
            keyword_matches: stats.keyword_matches.to_vec(),
            processing_time_ms: stats.processing_time.as_secs_f64() * 1000.0,
            captured_at: Utc::now(),
        }
    }

    /// Take a snapshot and make it the latest one seen by readers
    pub fn publish(&self) -> Arc<StatsSnapshot> {
        let snapshot = Arc::new(self.snapshot());
        self.published.store(Arc::clone(&snapshot));
        snapshot
    }

    /// Reader handle for the published snapshots
    pub fn handle(&self) -> SnapshotHandle {
        SnapshotHandle {
            inner: Arc::clone(&self.published),
        }
    }
}

/// Cloneable reader side of the snapshot swap
#[derive(Clone)]
pub struct SnapshotHandle {
    inner: Arc<ArcSwap<StatsSnapshot>>,
}

impl SnapshotHandle {
    /// Latest published snapshot (never blocks the aggregator)
    pub fn latest(&self) -> Arc<StatsSnapshot> {
        self.inner.load_full()
    }
}

/// Frozen view of the aggregates at one instant
#[derive(Clone, Debug)]
pub struct StatsSnapshot {
    pub total_lines: u64,
    pub level_counts: LevelCounts,
    pub keyword_counts: BTreeMap<String, u64>,

    /// Ring buffer contents, oldest first
    pub recent_entries: Vec<ArcLogEntry>,

    /// Every error seen, oldest first
    pub error_entries: Vec<ArcLogEntry>,

    /// Retained keyword matches, oldest first
    pub keyword_matches: Vec<ArcLogEntry>,

    pub processing_time_ms: f64,
    pub captured_at: DateTime<Utc>,
}

impl StatsSnapshot {
    /// Snapshot of an aggregator that has seen nothing
    pub fn empty() -> Self {
        Self {
            total_lines: 0,
            level_counts: LevelCounts::default(),
            keyword_counts: BTreeMap::new(),
            recent_entries: Vec::new(),
            error_entries: Vec::new(),
            keyword_matches: Vec::new(),
            processing_time_ms: 0.0,
            captured_at: Utc::now(),
        }
    }

    pub fn count(&self, level: LogLevel) -> u64 {
        self.level_counts.get(level)
    }

    pub fn error_count(&self) -> u64 {
        self.count(LogLevel::Error)
    }

    /// Share of `level` in percent; 0.0 before any line was seen
    pub fn percentage(&self, level: LogLevel) -> f64 {
        if self.total_lines == 0 {
            return 0.0;
        }
        self.count(level) as f64 / self.total_lines as f64 * 100.0
    }

    /// Level with the highest count.
    ///
    /// Ties go to the first level in ERROR, WARN, INFO, DEBUG, UNKNOWN order.
    /// `None` until at least one line was seen.
    pub fn most_common_level(&self) -> Option<LogLevel> {
        let mut best: Option<(LogLevel, u64)> = None;
        for level in LogLevel::BY_PRIORITY {
            let count = self.count(level);
            if count > best.map_or(0, |(_, c)| c) {
                best = Some((level, count));
            }
        }
        best.map(|(level, _)| level)
    }

    pub fn keyword_count(&self, keyword: &str) -> u64 {
        self.keyword_counts.get(keyword).copied().unwrap_or(0)
    }

    /// ERROR plus WARN lines
    pub fn issue_count(&self) -> u64 {
        self.count(LogLevel::Error) + self.count(LogLevel::Warn)
    }

    /// Whether errors make up more than `threshold` percent of all lines
    pub fn has_critical_issues(&self, threshold: f64) -> bool {
        self.percentage(LogLevel::Error) > threshold
    }

    /// Last `n` recent entries, oldest first
    pub fn recent(&self, n: usize) -> &[ArcLogEntry] {
        tail(&self.recent_entries, n)
    }

    /// Last `n` errors, oldest first
    pub fn recent_errors(&self, n: usize) -> &[ArcLogEntry] {
        tail(&self.error_entries, n)
    }

    /// Last `n` keyword matches, oldest first
    pub fn recent_keyword_matches(&self, n: usize) -> &[ArcLogEntry] {
        tail(&self.keyword_matches, n)
    }

    pub fn last_update_epoch_ms(&self) -> i64 {
        self.captured_at.timestamp_millis()
    }
}

fn tail<T>(items: &[T], n: usize) -> &[T] {
    &items[items.len().saturating_sub(n)..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::LineClassifier;

    fn aggregator() -> StatsAggregator {
        StatsAggregator::new(50, 1000)
    }

    #[test]
    fn test_counts_sum_to_total() {
        let mut agg = aggregator();
        let lines = [
            "10:00:00 INFO start",
            "10:00:01 DEBUG tick",
            "10:00:02 WARNING slow",
            "10:00:03 ERROR boom",
            "plain text",
            "10:00:04 info again",
        ];
        for line in lines {
            agg.update(LineClassifier::classify(line));
            let snap = agg.snapshot();
            assert_eq!(snap.level_counts.total(), snap.total_lines);
        }

        let snap = agg.snapshot();
        assert_eq!(snap.total_lines, 6);
        assert_eq!(snap.count(LogLevel::Info), 2);
        assert_eq!(snap.count(LogLevel::Unknown), 1);
        assert_eq!(snap.issue_count(), 2);
    }

    #[test]
    fn test_error_scenario() {
        let mut agg = aggregator();
        agg.update(LineClassifier::classify("2024-01-01 10:00:00 INFO: start"));
        agg.update(LineClassifier::classify("2024-01-01 10:00:05 ERROR: db down"));

        let snap = agg.snapshot();
        assert_eq!(snap.total_lines, 2);
        assert_eq!(snap.count(LogLevel::Error), 1);
        assert_eq!(snap.count(LogLevel::Info), 1);
        assert_eq!(snap.error_entries.len(), 1);
        assert_eq!(snap.error_entries[0].message, "db down");
    }

    #[test]
    fn test_keyword_scenario() {
        let mut agg = aggregator();
        let first = agg.update_with_keyword(
            LineClassifier::classify("2024-01-01 10:00:00 INFO: start"),
            "db",
        );
        let second = agg.update_with_keyword(
            LineClassifier::classify("2024-01-01 10:00:05 ERROR: db down"),
            "db",
        );
        assert!(!first.keyword_match);
        assert!(second.keyword_match);

        let snap = agg.snapshot();
        assert_eq!(snap.keyword_count("db"), 1);
        assert_eq!(snap.keyword_matches.len(), 1);
    }

    #[test]
    fn test_keyword_match_is_case_sensitive() {
        let mut agg = aggregator();
        agg.update_with_keyword(LineClassifier::classify("ERROR: DB down"), "db");
        assert_eq!(agg.snapshot().keyword_count("db"), 0);
    }

    #[test]
    fn test_empty_keyword_is_ignored() {
        let mut agg = aggregator();
        let recorded = agg.update_with_keyword(LineClassifier::classify("anything"), "");
        assert!(!recorded.keyword_match);
        assert!(agg.snapshot().keyword_counts.is_empty());
    }

    #[test]
    fn test_unknown_line_is_counted_but_not_an_error() {
        let mut agg = aggregator();
        agg.update(LineClassifier::classify("just some text"));

        let snap = agg.snapshot();
        assert_eq!(snap.total_lines, 1);
        assert_eq!(snap.count(LogLevel::Unknown), 1);
        assert!(snap.error_entries.is_empty());
        assert_eq!(snap.recent_entries.len(), 1);
    }

    #[test]
    fn test_recent_ring_keeps_last_fifty() {
        let mut agg = aggregator();
        for i in 0..75 {
            agg.update(LineClassifier::classify(&format!("INFO line {}", i)));
        }

        let snap = agg.snapshot();
        assert_eq!(snap.total_lines, 75);
        assert_eq!(snap.recent_entries.len(), 50);
        assert_eq!(snap.recent_entries[0].message, "line 25");
        assert_eq!(snap.recent(20).len(), 20);
        assert_eq!(snap.recent(20)[19].message, "line 74");
    }

    #[test]
    fn test_errors_are_not_evicted() {
        let mut agg = aggregator();
        for i in 0..120 {
            agg.update(LineClassifier::classify(&format!("ERROR failure {}", i)));
        }

        let snap = agg.snapshot();
        assert_eq!(snap.error_entries.len(), 120);
        let last_ten = snap.recent_errors(10);
        assert_eq!(last_ten.len(), 10);
        assert_eq!(last_ten[0].message, "failure 110");
    }

    #[test]
    fn test_keyword_matches_are_bounded() {
        let mut agg = StatsAggregator::new(50, 3);
        for i in 0..5 {
            agg.update_with_keyword(LineClassifier::classify(&format!("INFO db {}", i)), "db");
        }

        let snap = agg.snapshot();
        assert_eq!(snap.keyword_count("db"), 5);
        assert_eq!(snap.keyword_matches.len(), 3);
        assert_eq!(snap.keyword_matches[0].message, "db 2");
    }

    #[test]
    fn test_percentage_bounds() {
        let mut agg = aggregator();
        let empty = agg.snapshot();
        for level in LogLevel::ALL {
            assert_eq!(empty.percentage(level), 0.0);
        }

        agg.update(LineClassifier::classify("ERROR a"));
        agg.update(LineClassifier::classify("INFO b"));
        agg.update(LineClassifier::classify("INFO c"));
        agg.update(LineClassifier::classify("INFO d"));

        let snap = agg.snapshot();
        for level in LogLevel::ALL {
            let pct = snap.percentage(level);
            assert!((0.0..=100.0).contains(&pct));
        }
        assert_eq!(snap.percentage(LogLevel::Error), 25.0);
        assert!(snap.has_critical_issues(10.0));
        assert!(!snap.has_critical_issues(30.0));
    }

    #[test]
    fn test_most_common_level() {
        let mut agg = aggregator();
        assert_eq!(agg.snapshot().most_common_level(), None);

        agg.update(LineClassifier::classify("INFO a"));
        agg.update(LineClassifier::classify("INFO b"));
        agg.update(LineClassifier::classify("DEBUG c"));
        assert_eq!(agg.snapshot().most_common_level(), Some(LogLevel::Info));
    }

    #[test]
    fn test_most_common_level_tie_break() {
        let mut agg = aggregator();
        agg.update(LineClassifier::classify("DEBUG a"));
        agg.update(LineClassifier::classify("WARN b"));
        agg.update(LineClassifier::classify("plain"));
        assert_eq!(agg.snapshot().most_common_level(), Some(LogLevel::Warn));

        agg.update(LineClassifier::classify("ERROR c"));
        assert_eq!(agg.snapshot().most_common_level(), Some(LogLevel::Error));
    }

    #[test]
    fn test_snapshot_is_frozen() {
        let mut agg = aggregator();
        agg.update(LineClassifier::classify("INFO a"));
        let snap = agg.snapshot();

        agg.update(LineClassifier::classify("ERROR b"));
        assert_eq!(snap.total_lines, 1);
        assert!(snap.error_entries.is_empty());
    }

    #[test]
    fn test_handle_sees_only_published_state() {
        let mut agg = aggregator();
        let handle = agg.handle();
        assert_eq!(handle.latest().total_lines, 0);

        agg.update(LineClassifier::classify("INFO a"));
        assert_eq!(handle.latest().total_lines, 0);

        agg.publish();
        assert_eq!(handle.latest().total_lines, 1);
    }

    #[test]
    fn test_handle_reads_from_other_thread() {
        let mut agg = aggregator();
        let handle = agg.handle();
        agg.update(LineClassifier::classify("ERROR a"));
        agg.publish();

        let seen = std::thread::spawn(move || handle.latest().error_count())
            .join()
            .unwrap();
        assert_eq!(seen, 1);
    }

    #[test]
    fn test_processing_time_accumulates() {
        let mut agg = aggregator();
        agg.add_processing_time(Duration::from_millis(3));
        agg.add_processing_time(Duration::from_micros(500));
        assert!((agg.snapshot().processing_time_ms - 3.5).abs() < 1e-9);
    }
}
