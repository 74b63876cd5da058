//! Plain-text summary printed at the end of a run

use std::fmt::Write;

use logwatch_logs::{ArcLogEntry, LogLevel, StatsSnapshot};

/// ERROR share (percent) above which the summary flags critical issues
pub const CRITICAL_ERROR_PERCENT: f64 = 10.0;

/// Render a human-readable summary of `snapshot`.
///
/// `file_size` is shown when known.
pub fn render_summary(
    snapshot: &StatsSnapshot,
    keyword: Option<&str>,
    file_size: Option<u64>,
) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "=== Log analysis summary ===");
    if let Some(size) = file_size {
        let _ = writeln!(out, "File size:      {}", format_file_size(size));
    }
    let _ = writeln!(out, "Total lines:    {}", snapshot.total_lines);

    for (level, count) in snapshot.level_counts.non_zero() {
        let _ = writeln!(
            out,
            "  {:<8} {:>8}  ({:.1}%)",
            level.as_str(),
            count,
            snapshot.percentage(level)
        );
    }

    let most_common = snapshot
        .most_common_level()
        .map_or("-", |level| level.as_str());
    let _ = writeln!(out, "Most common:    {}", most_common);

    if let Some(keyword) = keyword.filter(|k| !k.is_empty()) {
        let _ = writeln!(
            out,
            "Keyword '{}':  {} matches",
            keyword,
            snapshot.keyword_count(keyword)
        );
    }

    let _ = writeln!(out, "Errors:         {}", snapshot.count(LogLevel::Error));
    let _ = writeln!(out, "Issues:         {} (ERROR + WARN)", snapshot.issue_count());
    if snapshot.has_critical_issues(CRITICAL_ERROR_PERCENT) {
        let _ = writeln!(
            out,
            "CRITICAL: errors make up {:.1}% of all lines",
            snapshot.percentage(LogLevel::Error)
        );
    }
    let _ = writeln!(out, "Processing:     {:.2} ms", snapshot.processing_time_ms);

    out
}

/// Levels listed in the detailed table even when nothing was seen
const ALWAYS_SHOWN: [LogLevel; 3] = [LogLevel::Error, LogLevel::Warn, LogLevel::Info];

/// Per-level table with a bar of one block per two percent
pub fn render_detailed(snapshot: &StatsSnapshot) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "=== Level breakdown ===");
    let _ = writeln!(out, "{:<8} {:>8} {:>8}", "LEVEL", "COUNT", "PERCENT");
    for level in LogLevel::BY_PRIORITY {
        let count = snapshot.count(level);
        if count == 0 && !ALWAYS_SHOWN.contains(&level) {
            continue;
        }
        let percentage = snapshot.percentage(level);
        let bar = "\u{2588}".repeat((percentage / 2.0) as usize);
        let _ = writeln!(
            out,
            "{:<8} {:>8} {:>7.1}% {}",
            level.as_str(),
            count,
            percentage,
            bar
        );
    }

    out
}

/// Numbered listing of every entry of `level`
pub fn render_level_entries(level: LogLevel, entries: &[ArcLogEntry]) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "=== {} entries ===", level);
    for (i, entry) in entries.iter().enumerate() {
        let _ = writeln!(out, "[{}] {}", i + 1, entry.raw_line);
    }
    if entries.is_empty() {
        let _ = writeln!(out, "No {} entries found", level);
    } else {
        let _ = writeln!(out, "Found {} {} entries", entries.len(), level);
    }

    out
}

/// Format a byte count as bytes, KB, MB or GB with two decimals
pub fn format_file_size(size: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    let bytes = size as f64;
    if bytes < KB {
        format!("{} bytes", size)
    } else if bytes < MB {
        format!("{:.2} KB", bytes / KB)
    } else if bytes < GB {
        format!("{:.2} MB", bytes / MB)
    } else {
        format!("{:.2} GB", bytes / GB)
    }
}
