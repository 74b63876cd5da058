//! Self-contained HTML dashboard rendered from a snapshot

use anyhow::{Context, Result};
use std::fmt::Write;
use std::path::Path;

use logwatch_logs::{ArcLogEntry, KeywordFilter, LogLevel, StatsSnapshot, write_atomic};

use crate::console::{CRITICAL_ERROR_PERCENT, format_file_size};

const STYLE: &str = r#"
body { font-family: -apple-system, "Segoe UI", sans-serif; background: #f4f6f8; color: #222; margin: 0; }
.container { max-width: 1100px; margin: 0 auto; padding: 24px; }
.header h1 { margin: 0 0 4px 0; }
.meta { color: #666; font-size: 0.9em; }
.cards { display: flex; gap: 12px; margin: 20px 0; flex-wrap: wrap; }
.card { background: #fff; border-radius: 8px; padding: 14px 18px; min-width: 140px; box-shadow: 0 1px 3px rgba(0,0,0,.1); }
.card .value { font-size: 1.6em; font-weight: bold; }
.card.critical { border-left: 4px solid #d32f2f; }
table { border-collapse: collapse; width: 100%; background: #fff; }
th, td { text-align: left; padding: 6px 10px; border-bottom: 1px solid #eee; }
section { margin-top: 28px; }
.entry { font-family: monospace; white-space: pre-wrap; word-break: break-all; padding: 4px 8px; border-bottom: 1px solid #eee; background: #fff; }
.level-ERROR { color: #d32f2f; }
.level-WARN { color: #ef6c00; }
.level-INFO { color: #1565c0; }
.level-DEBUG { color: #6a1b9a; }
.level-UNKNOWN { color: #757575; }
mark { background: #fff176; }
.empty { color: #2e7d32; }
.more { color: #666; font-style: italic; }
"#;

/// HTML report settings
#[derive(Clone, Debug)]
pub struct HtmlReport {
    log_path: String,
    keyword: Option<KeywordFilter>,
    file_size: Option<u64>,

    /// Seconds between browser reloads (watch mode only)
    auto_refresh: Option<u64>,

    error_limit: usize,
    recent_limit: usize,
}

impl HtmlReport {
    pub fn new(log_path: impl Into<String>) -> Self {
        Self {
            log_path: log_path.into(),
            keyword: None,
            file_size: None,
            auto_refresh: None,
            error_limit: 10,
            recent_limit: 20,
        }
    }

    /// Highlight and list matches of `filter`
    pub fn with_keyword(mut self, filter: Option<KeywordFilter>) -> Self {
        self.keyword = filter.filter(|f| !f.is_empty());
        self
    }

    pub fn with_file_size(mut self, size: Option<u64>) -> Self {
        self.file_size = size;
        self
    }

    /// Make the page reload itself every `seconds`
    pub fn with_auto_refresh(mut self, seconds: u64) -> Self {
        self.auto_refresh = Some(seconds.max(1));
        self
    }

    pub fn with_limits(mut self, errors: usize, recent: usize) -> Self {
        self.error_limit = errors;
        self.recent_limit = recent;
        self
    }

    pub fn render(&self, snapshot: &StatsSnapshot) -> String {
        let mut html = String::with_capacity(16 * 1024);

        html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
        html.push_str("<meta charset=\"UTF-8\">\n");
        html.push_str(
            "<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n",
        );
        if let Some(seconds) = self.auto_refresh {
            let _ = writeln!(html, "<meta http-equiv=\"refresh\" content=\"{}\">", seconds);
        }
        html.push_str("<title>Log monitoring report</title>\n<style>");
        html.push_str(STYLE);
        html.push_str("</style>\n</head>\n<body>\n<div class=\"container\">\n");

        let _ = writeln!(
            html,
            "<div class=\"header\"><h1>Log monitoring report</h1>\
             <div class=\"meta\">File: {}</div>\
             <div class=\"meta\">Last update: {}</div></div>",
            escape_html(&self.log_path),
            snapshot.captured_at.format("%Y-%m-%d %H:%M:%S UTC"),
        );

        self.render_cards(&mut html, snapshot);
        self.render_levels(&mut html, snapshot);
        self.render_errors(&mut html, snapshot);
        if let Some(filter) = &self.keyword {
            self.render_keyword_matches(&mut html, snapshot, filter);
        }
        self.render_recent(&mut html, snapshot);

        let _ = writeln!(
            html,
            "<section class=\"meta\"><p>Processing time: {:.2} ms</p></section>",
            snapshot.processing_time_ms
        );
        html.push_str("</div>\n</body>\n</html>\n");
        html
    }

    /// Render and write atomically
    pub fn write(&self, path: &Path, snapshot: &StatsSnapshot) -> Result<()> {
        write_atomic(path, self.render(snapshot).as_bytes())
            .with_context(|| format!("failed to write HTML report {}", path.display()))
    }

    fn render_cards(&self, html: &mut String, snapshot: &StatsSnapshot) {
        html.push_str("<div class=\"cards\">\n");
        card(html, "Total lines", &snapshot.total_lines.to_string(), false);
        card(
            html,
            "Errors",
            &snapshot.error_count().to_string(),
            snapshot.has_critical_issues(CRITICAL_ERROR_PERCENT),
        );
        card(html, "Warnings", &snapshot.count(LogLevel::Warn).to_string(), false);
        card(
            html,
            "Most common",
            snapshot.most_common_level().map_or("-", |l| l.as_str()),
            false,
        );
        if let Some(filter) = &self.keyword {
            card(
                html,
                &format!("Keyword \"{}\"", filter.keyword()),
                &snapshot.keyword_count(filter.keyword()).to_string(),
                false,
            );
        }
        if let Some(size) = self.file_size {
            card(html, "File size", &format_file_size(size), false);
        }
        html.push_str("</div>\n");
    }

    fn render_levels(&self, html: &mut String, snapshot: &StatsSnapshot) {
        html.push_str("<section><h2>Levels</h2><table>\n");
        html.push_str("<tr><th>Level</th><th>Count</th><th>Share</th></tr>\n");
        for (level, count) in snapshot.level_counts.iter() {
            let _ = writeln!(
                html,
                "<tr><td class=\"level-{0}\">{0}</td><td>{1}</td><td>{2:.1}%</td></tr>",
                level.as_str(),
                count,
                snapshot.percentage(level)
            );
        }
        html.push_str("</table></section>\n");
    }

    fn render_errors(&self, html: &mut String, snapshot: &StatsSnapshot) {
        html.push_str("<section><h2>Recent errors</h2>\n");
        if snapshot.error_entries.is_empty() {
            html.push_str("<p class=\"empty\">No errors logged.</p>\n");
        } else {
            for entry in snapshot.recent_errors(self.error_limit).iter().rev() {
                self.render_entry(html, entry);
            }
            let total = snapshot.error_entries.len();
            if total > self.error_limit {
                let _ = writeln!(
                    html,
                    "<p class=\"more\">Showing the {} most recent of {} errors</p>",
                    self.error_limit, total
                );
            }
        }
        html.push_str("</section>\n");
    }

    fn render_keyword_matches(
        &self,
        html: &mut String,
        snapshot: &StatsSnapshot,
        filter: &KeywordFilter,
    ) {
        let _ = writeln!(
            html,
            "<section><h2>Keyword matches for \"{}\"</h2>",
            escape_html(filter.keyword())
        );
        let matches = snapshot.recent_keyword_matches(self.recent_limit);
        if matches.is_empty() {
            html.push_str("<p class=\"empty\">No matches.</p>\n");
        }
        for entry in matches.iter().rev() {
            self.render_entry(html, entry);
        }
        html.push_str("</section>\n");
    }

    fn render_recent(&self, html: &mut String, snapshot: &StatsSnapshot) {
        html.push_str("<section><h2>Recent entries</h2>\n");
        for entry in snapshot.recent(self.recent_limit).iter().rev() {
            self.render_entry(html, entry);
        }
        html.push_str("</section>\n");
    }

    fn render_entry(&self, html: &mut String, entry: &ArcLogEntry) {
        let text = match &self.keyword {
            Some(filter) => highlight(&entry.raw_line, filter),
            None => escape_html(&entry.raw_line),
        };
        let _ = writeln!(
            html,
            "<div class=\"entry level-{}\">{}</div>",
            entry.level.as_str(),
            text
        );
    }
}

fn card(html: &mut String, label: &str, value: &str, critical: bool) {
    let _ = writeln!(
        html,
        "<div class=\"card{}\"><div>{}</div><div class=\"value\">{}</div></div>",
        if critical { " critical" } else { "" },
        escape_html(label),
        escape_html(value)
    );
}

/// Escape text and wrap keyword matches in `<mark>`
fn highlight(text: &str, filter: &KeywordFilter) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for (start, end) in filter.find_matches(text) {
        out.push_str(&escape_html(&text[last..start]));
        out.push_str("<mark>");
        out.push_str(&escape_html(&text[start..end]));
        out.push_str("</mark>");
        last = end;
    }
    out.push_str(&escape_html(&text[last..]));
    out
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}
