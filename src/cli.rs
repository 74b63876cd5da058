use clap::Parser;
use std::path::PathBuf;

use logwatch_logs::{LogLevel, WatchConfig, WatchError};

/// logwatch - tail a log file, classify lines by severity and publish statistics
#[derive(Parser, Debug)]
#[command(name = "logwatch")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Log file to analyse
    #[arg(value_name = "LOGFILE")]
    pub log_file: PathBuf,

    /// Keyword to count and report (case-sensitive unless --ignore-case)
    #[arg(value_name = "KEYWORD")]
    pub keyword: Option<String>,

    /// Write a JSON analysis report
    #[arg(long, value_name = "PATH")]
    pub output_json: Option<PathBuf>,

    /// Write an HTML report (refreshed every interval in watch mode)
    #[arg(long, value_name = "PATH")]
    pub html_output: Option<PathBuf>,

    /// Keep following the file until interrupted
    #[arg(long)]
    pub watch: bool,

    /// TOML configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Poll interval in milliseconds
    #[arg(long, value_name = "MS")]
    pub interval_ms: Option<u64>,

    /// Where to write the status document in watch mode
    #[arg(long, value_name = "PATH")]
    pub status_file: Option<PathBuf>,

    /// Where to write the stats document in watch mode
    #[arg(long, value_name = "PATH")]
    pub stats_file: Option<PathBuf>,

    /// Skip content already in the file when watching starts
    #[arg(long)]
    pub from_end: bool,

    /// Match the keyword ignoring case
    #[arg(long)]
    pub ignore_case: bool,

    /// List entries of this level (debug, info, warn, error, unknown)
    #[arg(long, value_name = "LEVEL")]
    pub level: Option<LogLevel>,

    /// Print a per-level table with percentage bars
    #[arg(long)]
    pub detailed: bool,
}

impl Args {
    /// Configuration file (or defaults) with command-line overrides applied
    pub fn watch_config(&self) -> Result<WatchConfig, WatchError> {
        let mut config = match &self.config {
            Some(path) => WatchConfig::load(path)?,
            None => WatchConfig::default(),
        };

        if let Some(ms) = self.interval_ms {
            config.poll_interval_ms = ms;
        }
        if let Some(path) = &self.status_file {
            config.status_path = path.clone();
        }
        if let Some(path) = &self.stats_file {
            config.stats_path = path.clone();
        }
        if self.from_end {
            config.start_at_end = true;
        }
        if self.ignore_case {
            config.keyword_case_insensitive = true;
        }

        config.validate()?;
        Ok(config)
    }

    /// Keyword, if one was given and is not empty
    pub fn keyword(&self) -> Option<&str> {
        self.keyword.as_deref().filter(|k| !k.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positional_arguments() {
        let args = Args::try_parse_from(["logwatch", "app.log", "db"]).unwrap();
        assert_eq!(args.log_file, PathBuf::from("app.log"));
        assert_eq!(args.keyword(), Some("db"));
        assert!(!args.watch);
    }

    #[test]
    fn test_missing_log_file_is_an_error() {
        assert!(Args::try_parse_from(["logwatch"]).is_err());
    }

    #[test]
    fn test_empty_keyword_is_ignored() {
        let args = Args::try_parse_from(["logwatch", "app.log", ""]).unwrap();
        assert_eq!(args.keyword(), None);
    }

    #[test]
    fn test_flags_override_defaults() {
        let args = Args::try_parse_from([
            "logwatch",
            "app.log",
            "--watch",
            "--interval-ms",
            "250",
            "--status-file",
            "/tmp/s.json",
            "--from-end",
            "--ignore-case",
        ])
        .unwrap();
        let config = args.watch_config().unwrap();

        assert!(args.watch);
        assert_eq!(config.poll_interval_ms, 250);
        assert_eq!(config.status_path, PathBuf::from("/tmp/s.json"));
        assert_eq!(config.stats_path, PathBuf::from("stats.json"));
        assert!(config.start_at_end);
        assert!(config.keyword_case_insensitive);
    }

    #[test]
    fn test_level_and_detailed() {
        let args =
            Args::try_parse_from(["logwatch", "app.log", "--level", "Warning", "--detailed"])
                .unwrap();
        assert_eq!(args.level, Some(LogLevel::Warn));
        assert!(args.detailed);

        let args = Args::try_parse_from(["logwatch", "app.log"]).unwrap();
        assert_eq!(args.level, None);
        assert!(!args.detailed);
    }

    #[test]
    fn test_unknown_level_is_rejected() {
        let err = Args::try_parse_from(["logwatch", "app.log", "--level", "fatal"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let args = Args::try_parse_from(["logwatch", "app.log", "--interval-ms", "0"]).unwrap();
        let err = args.watch_config().unwrap_err();
        assert!(matches!(err, WatchError::Config(_)));
    }

    #[test]
    fn test_flags_win_over_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logwatch.toml");
        std::fs::write(&path, "poll_interval_ms = 5000\nrecent_capacity = 10\n").unwrap();

        let args = Args::try_parse_from([
            "logwatch",
            "app.log",
            "--config",
            path.to_str().unwrap(),
            "--interval-ms",
            "100",
        ])
        .unwrap();
        let config = args.watch_config().unwrap();

        assert_eq!(config.poll_interval_ms, 100);
        assert_eq!(config.recent_capacity, 10);
    }
}
