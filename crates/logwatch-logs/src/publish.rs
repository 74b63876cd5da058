//! Machine-readable snapshot documents for external pollers

use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use logwatch_types::LogLevel;

use crate::config::WatchConfig;
use crate::error::WatchError;
use crate::stats::{ArcLogEntry, StatsSnapshot};

/// Small status document for cheap polling
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusDocument<'a> {
    /// At least one error has been seen since the watch started
    pub has_new_error: bool,
    pub error_count: u64,
    pub total_lines: u64,
    pub last_update_epoch_ms: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword_count: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSummary {
    pub total_lines: u64,
    pub last_update_epoch_ms: i64,
    pub most_common_level: Option<LogLevel>,
    pub processing_time_ms: f64,
}

/// Detailed stats document
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsDocument<'a> {
    pub summary: StatsSummary,

    /// Non-zero levels only
    pub level_counts: BTreeMap<LogLevel, u64>,
    pub recent_logs: &'a [ArcLogEntry],
    pub error_logs: &'a [ArcLogEntry],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword_counts: Option<&'a BTreeMap<String, u64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword_matches: Option<&'a [ArcLogEntry]>,
}

/// How many entries of each list go into the stats document
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DisplayLimits {
    pub recent: usize,
    pub errors: usize,
    pub keyword_matches: usize,
}

impl Default for DisplayLimits {
    fn default() -> Self {
        Self {
            recent: 20,
            errors: 10,
            keyword_matches: 20,
        }
    }
}

/// Writes the status and stats documents for each published snapshot
#[derive(Clone, Debug)]
pub struct SnapshotPublisher {
    status_path: PathBuf,
    stats_path: PathBuf,
    keyword: Option<String>,
    limits: DisplayLimits,
}

impl SnapshotPublisher {
    pub fn new(status_path: impl Into<PathBuf>, stats_path: impl Into<PathBuf>) -> Self {
        Self {
            status_path: status_path.into(),
            stats_path: stats_path.into(),
            keyword: None,
            limits: DisplayLimits::default(),
        }
    }

    pub fn from_config(config: &WatchConfig) -> Self {
        Self::new(&config.status_path, &config.stats_path).with_limits(DisplayLimits {
            recent: config.recent_display_limit,
            errors: config.error_display_limit,
            keyword_matches: config.keyword_display_limit,
        })
    }

    /// Report keyword bookkeeping for `keyword` (ignored if empty)
    pub fn with_keyword(mut self, keyword: Option<String>) -> Self {
        self.keyword = keyword.filter(|k| !k.is_empty());
        self
    }

    pub fn with_limits(mut self, limits: DisplayLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn status_path(&self) -> &Path {
        &self.status_path
    }

    pub fn stats_path(&self) -> &Path {
        &self.stats_path
    }

    pub fn status_document<'a>(&'a self, snapshot: &StatsSnapshot) -> StatusDocument<'a> {
        StatusDocument {
            has_new_error: snapshot.error_count() > 0,
            error_count: snapshot.error_count(),
            total_lines: snapshot.total_lines,
            last_update_epoch_ms: snapshot.last_update_epoch_ms(),
            keyword: self.keyword.as_deref(),
            keyword_count: self.keyword.as_deref().map(|k| snapshot.keyword_count(k)),
        }
    }

    pub fn stats_document<'a>(&self, snapshot: &'a StatsSnapshot) -> StatsDocument<'a> {
        let has_keyword = self.keyword.is_some();
        StatsDocument {
            summary: StatsSummary {
                total_lines: snapshot.total_lines,
                last_update_epoch_ms: snapshot.last_update_epoch_ms(),
                most_common_level: snapshot.most_common_level(),
                processing_time_ms: snapshot.processing_time_ms,
            },
            level_counts: snapshot.level_counts.non_zero().collect(),
            recent_logs: snapshot.recent(self.limits.recent),
            error_logs: snapshot.recent_errors(self.limits.errors),
            keyword_counts: has_keyword.then_some(&snapshot.keyword_counts),
            keyword_matches: has_keyword
                .then(|| snapshot.recent_keyword_matches(self.limits.keyword_matches)),
        }
    }

    /// Write both documents.
    ///
    /// Both writes are attempted even if the first fails; the first failure
    /// is returned.
    pub fn publish(&self, snapshot: &StatsSnapshot) -> Result<(), WatchError> {
        let status = write_json(&self.status_path, &self.status_document(snapshot));
        let stats = write_json(&self.stats_path, &self.stats_document(snapshot));
        status.and(stats)
    }
}

/// Serialize `value` as pretty JSON and write it atomically
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), WatchError> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|source| WatchError::Encode {
        path: path.to_path_buf(),
        source,
    })?;
    write_atomic(path, &bytes).map_err(|source| WatchError::Publish {
        path: path.to_path_buf(),
        source,
    })
}

/// Write to a sibling temp file, then rename over `path`.
///
/// Readers see either the previous document or the new one, never a
/// partially written file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
    let mut temp_name = std::ffi::OsString::from(".");
    temp_name.push(file_name);
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    let result = File::create(&temp_path).and_then(|mut file| {
        file.write_all(bytes)?;
        file.flush()
    });
    if let Err(e) = result {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }

    fs::rename(&temp_path, path).inspect_err(|_| {
        let _ = fs::remove_file(&temp_path);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::LineClassifier;
    use crate::stats::StatsAggregator;
    use serde_json::Value;

    fn sample_snapshot(keyword: &str) -> StatsSnapshot {
        let mut agg = StatsAggregator::new(50, 1000);
        agg.update_with_keyword(
            LineClassifier::classify("2024-01-01 10:00:00 INFO: start"),
            keyword,
        );
        agg.update_with_keyword(
            LineClassifier::classify("2024-01-01 10:00:05 ERROR: db down"),
            keyword,
        );
        agg.snapshot()
    }

    fn read_json(path: &Path) -> Value {
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn test_publish_writes_both_documents() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = SnapshotPublisher::new(
            dir.path().join("status.json"),
            dir.path().join("stats.json"),
        );
        let snapshot = sample_snapshot("");

        publisher.publish(&snapshot).unwrap();

        let status = read_json(publisher.status_path());
        assert_eq!(status["hasNewError"], true);
        assert_eq!(status["errorCount"], 1);
        assert_eq!(status["totalLines"], 2);
        assert!(status["lastUpdateEpochMs"].as_i64().unwrap() > 0);
        assert!(status.get("keyword").is_none());

        let stats = read_json(publisher.stats_path());
        assert_eq!(stats["summary"]["totalLines"], 2);
        assert_eq!(stats["summary"]["mostCommonLevel"], "ERROR");
        assert_eq!(stats["levelCounts"]["ERROR"], 1);
        assert_eq!(stats["levelCounts"]["INFO"], 1);
        assert!(stats["levelCounts"].get("DEBUG").is_none());
        assert_eq!(stats["recentLogs"].as_array().unwrap().len(), 2);
        assert_eq!(stats["recentLogs"][1]["message"], "db down");
        assert_eq!(stats["recentLogs"][1]["rawLine"], "2024-01-01 10:00:05 ERROR: db down");
        assert_eq!(stats["errorLogs"][0]["timestamp"], "2024-01-01 10:00:05");
        assert!(stats.get("keywordMatches").is_none());
    }

    #[test]
    fn test_keyword_fields() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = SnapshotPublisher::new(
            dir.path().join("status.json"),
            dir.path().join("stats.json"),
        )
        .with_keyword(Some("db".to_string()));
        let snapshot = sample_snapshot("db");

        publisher.publish(&snapshot).unwrap();

        let status = read_json(publisher.status_path());
        assert_eq!(status["keyword"], "db");
        assert_eq!(status["keywordCount"], 1);

        let stats = read_json(publisher.stats_path());
        assert_eq!(stats["keywordCounts"]["db"], 1);
        assert_eq!(stats["keywordMatches"].as_array().unwrap().len(), 1);
        assert_eq!(stats["keywordMatches"][0]["level"], "ERROR");
    }

    #[test]
    fn test_recent_logs_capped() {
        let mut agg = StatsAggregator::new(50, 1000);
        for i in 0..40 {
            agg.update(LineClassifier::classify(&format!("INFO line {}", i)));
        }
        let publisher = SnapshotPublisher::new("status.json", "stats.json");
        let snapshot = agg.snapshot();
        let doc = publisher.stats_document(&snapshot);
        assert_eq!(doc.recent_logs.len(), 20);
        assert_eq!(doc.recent_logs[19].message, "line 39");
    }

    #[test]
    fn test_empty_keyword_is_not_reported() {
        let publisher =
            SnapshotPublisher::new("status.json", "stats.json").with_keyword(Some(String::new()));
        let snapshot = StatsSnapshot::empty();
        let status = publisher.status_document(&snapshot);
        assert!(status.keyword.is_none());
        assert!(!status.has_new_error);
    }

    #[test]
    fn test_write_atomic_replaces_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");

        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_publish_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = SnapshotPublisher::new(
            dir.path().join("missing-dir").join("status.json"),
            dir.path().join("stats.json"),
        );

        let err = publisher.publish(&StatsSnapshot::empty()).unwrap_err();
        assert!(matches!(err, WatchError::Publish { .. }));
        assert!(!err.is_fatal());
        // the second document is still written
        assert!(dir.path().join("stats.json").exists());
    }
}
