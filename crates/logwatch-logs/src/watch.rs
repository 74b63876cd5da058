//! The poll, classify, aggregate and publish cycle
//!
//! A cycle reads the file and writes the snapshot documents with blocking
//! `std::fs` calls on the task that drives [`WatchLoop::run`]. Each cycle
//! touches one small file region and two small documents, so the loop is
//! meant to run on its own task of a multi-thread runtime.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::WatchConfig;
use crate::error::WatchError;
use crate::filter::KeywordFilter;
use crate::parser::LineClassifier;
use crate::publish::SnapshotPublisher;
use crate::reader::IncrementalReader;
use crate::stats::{ArcLogEntry, Recorded, SnapshotHandle, StatsAggregator, StatsSnapshot};
use logwatch_types::LogLevel;

/// Where the loop is in its cycle
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WatchState {
    #[default]
    Idle,
    Polling,
    Processing,
    Sleeping,
    Stopped,
}

/// Immediate notifications, sent as lines are processed
#[derive(Clone, Debug)]
pub enum WatchEvent {
    ErrorDetected(ArcLogEntry),
    KeywordMatched { keyword: String, entry: ArcLogEntry },
    /// An entry of the level selected with [`WatchLoop::with_level`]
    LevelMatched(ArcLogEntry),
    Rotated { path: PathBuf },
}

/// What one cycle did
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CycleOutcome {
    pub lines: usize,
    pub errors: usize,
    pub keyword_matches: usize,
    pub level_matches: usize,
    pub rotated: bool,
}

/// Ties the reader, classifier and aggregator together on a fixed interval.
///
/// The loop is the only writer of the aggregates. Other tasks observe them
/// through [`WatchLoop::snapshots`].
pub struct WatchLoop {
    reader: IncrementalReader,
    aggregator: StatsAggregator,
    filter: Option<KeywordFilter>,
    level: Option<LogLevel>,
    publisher: Option<SnapshotPublisher>,
    events: Option<mpsc::UnboundedSender<WatchEvent>>,
    interval: Duration,
    state: WatchState,
}

impl WatchLoop {
    /// Build a loop over `reader`. An empty keyword disables keyword tracking.
    pub fn new(
        reader: IncrementalReader,
        config: &WatchConfig,
        keyword: Option<&str>,
    ) -> Result<Self, WatchError> {
        let filter = match keyword.filter(|k| !k.is_empty()) {
            Some(k) if config.keyword_case_insensitive => Some(
                KeywordFilter::new_case_insensitive(k)
                    .map_err(|e| WatchError::Config(format!("invalid keyword {:?}: {}", k, e)))?,
            ),
            Some(k) => Some(KeywordFilter::new(k)),
            None => None,
        };

        Ok(Self {
            reader,
            aggregator: StatsAggregator::from_config(config),
            filter,
            level: None,
            publisher: None,
            events: None,
            interval: config.poll_interval(),
            state: WatchState::Idle,
        })
    }

    /// Write status and stats documents after every cycle
    pub fn with_publisher(mut self, publisher: SnapshotPublisher) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Emit [`WatchEvent::LevelMatched`] for every entry of `level`
    pub fn with_level(mut self, level: Option<LogLevel>) -> Self {
        self.level = level;
        self
    }

    /// Send [`WatchEvent`]s to `sender`
    pub fn with_events(mut self, sender: mpsc::UnboundedSender<WatchEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    pub fn keyword(&self) -> Option<&str> {
        self.filter.as_ref().map(|f| f.keyword())
    }

    pub fn filter(&self) -> Option<&KeywordFilter> {
        self.filter.as_ref()
    }

    /// Reader handle for the snapshots published by this loop
    pub fn snapshots(&self) -> SnapshotHandle {
        self.aggregator.handle()
    }

    /// Run one poll, process and publish cycle.
    ///
    /// Read failures are logged and leave the reader where it was, so the
    /// next cycle picks up from the same place. A snapshot is published
    /// every cycle, new lines or not.
    pub fn run_cycle(&mut self) -> CycleOutcome {
        self.set_state(WatchState::Polling);
        let mut outcome = CycleOutcome::default();

        match self.reader.poll() {
            Ok(batch) => {
                outcome.rotated = batch.rotated;
                if batch.rotated {
                    self.emit(WatchEvent::Rotated {
                        path: self.reader.path().to_path_buf(),
                    });
                }
                if !batch.is_empty() {
                    self.set_state(WatchState::Processing);
                    self.process(batch.lines, &mut outcome);
                }
            }
            Err(e) => {
                tracing::warn!(
                    error = &e as &(dyn std::error::Error + 'static),
                    "poll failed, retrying next cycle"
                );
            }
        }

        self.publish();
        self.set_state(WatchState::Sleeping);
        outcome
    }

    /// Read the whole remaining file once, including a final line without
    /// a newline, and return the resulting snapshot
    pub fn drain(&mut self) -> Result<Arc<StatsSnapshot>, WatchError> {
        self.set_state(WatchState::Polling);
        let batch = self.reader.read_remaining()?;

        let mut outcome = CycleOutcome::default();
        self.set_state(WatchState::Processing);
        self.process(batch.lines, &mut outcome);

        let snapshot = self.publish();
        self.set_state(WatchState::Stopped);
        Ok(snapshot)
    }

    /// Cycle until `cancel` fires, then return the last published snapshot.
    ///
    /// Cancellation is only observed while sleeping, so a cycle in progress
    /// always completes.
    pub async fn run(&mut self, cancel: CancellationToken) -> Arc<StatsSnapshot> {
        tracing::info!(
            path = %self.reader.path().display(),
            interval_ms = self.interval.as_millis() as u64,
            keyword = self.keyword().unwrap_or(""),
            "watching log file"
        );

        loop {
            let outcome = self.run_cycle();
            if outcome.lines > 0 {
                tracing::debug!(
                    lines = outcome.lines,
                    errors = outcome.errors,
                    keyword_matches = outcome.keyword_matches,
                    "processed new lines"
                );
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        self.set_state(WatchState::Stopped);
        tracing::info!(
            total_lines = self.aggregator.total_lines(),
            "watch stopped"
        );
        self.aggregator.handle().latest()
    }

    fn set_state(&mut self, next: WatchState) {
        if self.state != next {
            tracing::debug!(from = ?self.state, to = ?next, "watch state");
            self.state = next;
        }
    }

    fn process(&mut self, lines: Vec<String>, outcome: &mut CycleOutcome) {
        let started = Instant::now();

        for line in lines {
            let entry = LineClassifier::classify(&line);
            let recorded = match &self.filter {
                Some(filter) => self.aggregator.update_with_filter(entry, filter),
                None => Recorded {
                    entry: self.aggregator.update(entry),
                    keyword_match: false,
                },
            };
            outcome.lines += 1;

            if recorded.entry.is_error() {
                outcome.errors += 1;
                tracing::debug!(line = %recorded.entry.raw_line, "error detected");
                self.emit(WatchEvent::ErrorDetected(Arc::clone(&recorded.entry)));
            }
            if self.level == Some(recorded.entry.level) {
                outcome.level_matches += 1;
                self.emit(WatchEvent::LevelMatched(Arc::clone(&recorded.entry)));
            }
            if recorded.keyword_match {
                outcome.keyword_matches += 1;
                let keyword = self.keyword().unwrap_or_default().to_string();
                tracing::debug!(%keyword, line = %recorded.entry.raw_line, "keyword matched");
                self.emit(WatchEvent::KeywordMatched {
                    keyword,
                    entry: recorded.entry,
                });
            }
        }

        self.aggregator.add_processing_time(started.elapsed());
    }

    fn publish(&self) -> Arc<StatsSnapshot> {
        let snapshot = self.aggregator.publish();
        if let Some(publisher) = &self.publisher {
            if let Err(e) = publisher.publish(&snapshot) {
                tracing::warn!(
                    error = &e as &(dyn std::error::Error + 'static),
                    "failed to publish snapshot"
                );
            }
        }
        snapshot
    }

    fn emit(&self, event: WatchEvent) {
        if let Some(sender) = &self.events {
            // A closed receiver only means nobody is listening any more
            let _ = sender.send(event);
        }
    }
}
