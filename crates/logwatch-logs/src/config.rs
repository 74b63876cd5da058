//! Runtime knobs for the watch loop, loadable from a TOML file

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::WatchError;

/// Watch loop configuration.
///
/// Every field has a default so a config file only needs the keys it changes.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatchConfig {
    /// Delay between polls
    pub poll_interval_ms: u64,

    /// Size of the recent-entries ring buffer
    pub recent_capacity: usize,

    /// Recent entries included in the stats document
    pub recent_display_limit: usize,

    /// Most recent errors included in documents and reports
    pub error_display_limit: usize,

    /// Keyword matches retained by the aggregator (oldest evicted first)
    pub keyword_match_capacity: usize,

    /// Most recent keyword matches included in the stats document
    pub keyword_display_limit: usize,

    /// Match the keyword ignoring ASCII case
    pub keyword_case_insensitive: bool,

    /// Skip content already in the file when watching starts
    pub start_at_end: bool,

    /// Where the status document is written
    pub status_path: PathBuf,

    /// Where the stats document is written
    pub stats_path: PathBuf,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            recent_capacity: 50,
            recent_display_limit: 20,
            error_display_limit: 10,
            keyword_match_capacity: 1000,
            keyword_display_limit: 20,
            keyword_case_insensitive: false,
            start_at_end: false,
            status_path: PathBuf::from("status.json"),
            stats_path: PathBuf::from("stats.json"),
        }
    }
}

impl WatchConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, WatchError> {
        let content = fs::read_to_string(path).map_err(|e| {
            WatchError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content).map_err(|e| match e {
            WatchError::Config(msg) => WatchError::Config(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self, WatchError> {
        let config: Self =
            toml::from_str(content).map_err(|e| WatchError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the watch loop cannot run with
    pub fn validate(&self) -> Result<(), WatchError> {
        if self.poll_interval_ms == 0 {
            return Err(WatchError::Config("poll_interval_ms must be > 0".to_string()));
        }
        if self.recent_capacity == 0 {
            return Err(WatchError::Config("recent_capacity must be > 0".to_string()));
        }
        if self.keyword_match_capacity == 0 {
            return Err(WatchError::Config(
                "keyword_match_capacity must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
