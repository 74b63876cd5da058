//! Presentation of logwatch snapshots
//!
//! Everything here only reads a [`StatsSnapshot`](logwatch_logs::StatsSnapshot);
//! nothing feeds back into the watch loop.

mod console;
mod html;
mod json;

pub use console::{
    CRITICAL_ERROR_PERCENT, format_file_size, render_detailed, render_level_entries,
    render_summary,
};
pub use html::{HtmlReport, escape_html};
pub use json::{AnalysisReport, LevelShare, ReportSummary};
