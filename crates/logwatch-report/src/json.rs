//! Whole-run analysis report as JSON

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

use logwatch_logs::{ArcLogEntry, LogLevel, StatsSnapshot, write_atomic};

/// Most recent keyword matches included in the report
const REPORT_KEYWORD_MATCHES: usize = 10;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub total_lines: u64,
    pub most_common_level: Option<LogLevel>,
    pub processing_time_ms: f64,
}

#[derive(Debug, Serialize)]
pub struct LevelShare {
    pub count: u64,
    pub percentage: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport<'a> {
    pub summary: ReportSummary,
    pub level_counts: BTreeMap<LogLevel, LevelShare>,
    pub keyword_counts: &'a BTreeMap<String, u64>,
    pub error_entries: &'a [ArcLogEntry],
    pub keyword_matches: &'a [ArcLogEntry],
}

impl<'a> AnalysisReport<'a> {
    pub fn from_snapshot(snapshot: &'a StatsSnapshot) -> Self {
        let level_counts = snapshot
            .level_counts
            .non_zero()
            .map(|(level, count)| {
                (
                    level,
                    LevelShare {
                        count,
                        percentage: snapshot.percentage(level),
                    },
                )
            })
            .collect();

        Self {
            summary: ReportSummary {
                total_lines: snapshot.total_lines,
                most_common_level: snapshot.most_common_level(),
                processing_time_ms: snapshot.processing_time_ms,
            },
            level_counts,
            keyword_counts: &snapshot.keyword_counts,
            error_entries: &snapshot.error_entries,
            keyword_matches: snapshot.recent_keyword_matches(REPORT_KEYWORD_MATCHES),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to encode analysis report")
    }

    /// Write the report, replacing any previous file atomically
    pub fn write(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        write_atomic(path, json.as_bytes())
            .with_context(|| format!("failed to write JSON report {}", path.display()))
    }
}
