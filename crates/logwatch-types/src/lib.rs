//! Shared types for logwatch
//!
//! This crate contains the value types passed between the tailing core and
//! the presentation layer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Log Types
// ============================================================================

/// Log severity level
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    #[default]
    Unknown,
}

impl LogLevel {
    /// All levels, in declaration order
    pub const ALL: [LogLevel; 5] = [
        Self::Debug,
        Self::Info,
        Self::Warn,
        Self::Error,
        Self::Unknown,
    ];

    /// Levels in classification priority order.
    ///
    /// Also the tie-break order when two levels share the highest count.
    pub const BY_PRIORITY: [LogLevel; 5] = [
        Self::Error,
        Self::Warn,
        Self::Info,
        Self::Debug,
        Self::Unknown,
    ];

    /// Upper-case name used in published documents
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Lower-case token searched for during classification (None for Unknown)
    pub fn token(&self) -> Option<&'static str> {
        match self {
            Self::Debug => Some("debug"),
            Self::Info => Some("info"),
            Self::Warn => Some("warn"),
            Self::Error => Some("error"),
            Self::Unknown => None,
        }
    }

    fn index(&self) -> usize {
        match self {
            Self::Debug => 0,
            Self::Info => 1,
            Self::Warn => 2,
            Self::Error => 3,
            Self::Unknown => 4,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses a level name as typed on a command line ("warn", "WARNING", ...)
impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            "unknown" => Ok(Self::Unknown),
            other => Err(format!(
                "unknown log level '{}' (expected debug, info, warn, error or unknown)",
                other
            )),
        }
    }
}

/// A single classified log line.
///
/// Immutable once built by the classifier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// Timestamp substring found in the line (empty if none)
    pub timestamp: String,

    /// Detected log level
    pub level: LogLevel,

    /// Line with timestamp, level token and separators removed
    pub message: String,

    /// Original raw log line
    pub raw_line: String,
}

impl LogEntry {
    /// Create a new log entry
    pub fn new(
        timestamp: impl Into<String>,
        level: LogLevel,
        message: impl Into<String>,
        raw_line: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: timestamp.into(),
            level,
            message: message.into(),
            raw_line: raw_line.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == LogLevel::Error
    }
}

/// Counts per log level
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LevelCounts {
    counts: [u64; 5],
}

impl LevelCounts {
    pub fn get(&self, level: LogLevel) -> u64 {
        self.counts[level.index()]
    }

    pub fn increment(&mut self, level: LogLevel) {
        self.counts[level.index()] += 1;
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Iterate `(level, count)` pairs in declaration order, zero counts included
    pub fn iter(&self) -> impl Iterator<Item = (LogLevel, u64)> + '_ {
        LogLevel::ALL.iter().map(|level| (*level, self.get(*level)))
    }

    /// Iterate only the levels that have been seen at least once
    pub fn non_zero(&self) -> impl Iterator<Item = (LogLevel, u64)> + '_ {
        self.iter().filter(|(_, count)| *count > 0)
    }
}
