//! Log tailing core for logwatch
//!
//! This crate reads newly appended lines from a growing log file, classifies
//! them, keeps running statistics and publishes immutable snapshots of those
//! statistics for concurrent readers.

mod buffer;
mod config;
mod error;
mod filter;
mod parser;
mod publish;
mod reader;
mod stats;
mod watch;

pub use buffer::RingBuffer;
pub use config::WatchConfig;
pub use error::WatchError;
pub use filter::KeywordFilter;
pub use parser::LineClassifier;
pub use publish::{
    DisplayLimits, SnapshotPublisher, StatsDocument, StatsSummary, StatusDocument, write_atomic,
    write_json,
};
pub use reader::{IncrementalReader, PollBatch, ReadCursor};
pub use stats::{ArcLogEntry, Recorded, SnapshotHandle, StatsAggregator, StatsSnapshot};
pub use watch::{CycleOutcome, WatchEvent, WatchLoop, WatchState};

// Re-export types used in our public API
pub use logwatch_types::{LevelCounts, LogEntry, LogLevel};
