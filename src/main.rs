mod cli;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use logwatch_logs::{
    ArcLogEntry, IncrementalReader, KeywordFilter, SnapshotHandle, SnapshotPublisher,
    StatsSnapshot, WatchConfig, WatchEvent, WatchLoop,
};
use logwatch_report::{
    AnalysisReport, HtmlReport, render_detailed, render_level_entries, render_summary,
};

use cli::Args;

#[tokio::main]
async fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            // --help and --version also arrive here
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    init_tracing();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr; stdout is for the user-facing output
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(args: Args) -> Result<()> {
    let config = args.watch_config()?;

    let reader = if args.watch && config.start_at_end {
        IncrementalReader::open_at_end(&args.log_file)?
    } else {
        IncrementalReader::open(&args.log_file)?
    };

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let watch = WatchLoop::new(reader, &config, args.keyword())?
        .with_level(args.level)
        .with_events(event_tx);

    if args.watch {
        run_watch(&args, &config, watch, event_rx).await
    } else {
        run_batch(&args, &config, watch, event_rx)
    }
}

/// Analyse the whole file once
fn run_batch(
    args: &Args,
    config: &WatchConfig,
    mut watch: WatchLoop,
    mut events: mpsc::UnboundedReceiver<WatchEvent>,
) -> Result<()> {
    let snapshot = watch.drain()?;
    let mut level_entries = Vec::new();
    while let Ok(event) = events.try_recv() {
        match event {
            WatchEvent::LevelMatched(entry) => level_entries.push(entry),
            other => print_event(&other),
        }
    }

    finish(args, config, watch.filter().cloned(), &snapshot, &level_entries)
}

/// Follow the file until Ctrl-C
async fn run_watch(
    args: &Args,
    config: &WatchConfig,
    watch: WatchLoop,
    events: mpsc::UnboundedReceiver<WatchEvent>,
) -> Result<()> {
    let publisher =
        SnapshotPublisher::from_config(config).with_keyword(args.keyword().map(str::to_string));
    let mut watch = watch.with_publisher(publisher);
    let filter = watch.filter().cloned();
    let cancel = CancellationToken::new();

    let printer = tokio::spawn(print_events(events));

    let refresher = args.html_output.clone().map(|path| {
        let report = html_report(&args.log_file, config, filter.clone())
            .with_auto_refresh(config.poll_interval().as_secs().max(1));
        tokio::spawn(refresh_html(
            path,
            report,
            watch.snapshots(),
            config.poll_interval(),
            cancel.clone(),
        ))
    });

    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move { watch.run(cancel).await })
    };

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    tracing::info!("interrupt received, finishing current cycle");
    cancel.cancel();

    // The loop owned the event sender, so the printer drains and ends
    let snapshot = watcher.await.context("watch task failed")?;
    if let Some(task) = refresher {
        let _ = task.await;
    }
    let _ = printer.await;

    // Level entries were printed as they arrived
    finish(args, config, filter, &snapshot, &[])
}

/// Print the summary and write the requested reports
fn finish(
    args: &Args,
    config: &WatchConfig,
    filter: Option<KeywordFilter>,
    snapshot: &StatsSnapshot,
    level_entries: &[ArcLogEntry],
) -> Result<()> {
    let file_size = fs::metadata(&args.log_file).ok().map(|m| m.len());
    println!();
    print!("{}", render_summary(snapshot, args.keyword(), file_size));
    if args.detailed {
        println!();
        print!("{}", render_detailed(snapshot));
    }
    if let Some(level) = args.level.filter(|_| !args.watch) {
        println!();
        print!("{}", render_level_entries(level, level_entries));
    }

    if let Some(path) = &args.output_json {
        AnalysisReport::from_snapshot(snapshot).write(path)?;
        println!("JSON report written to {}", path.display());
    }
    if let Some(path) = &args.html_output {
        html_report(&args.log_file, config, filter).write(path, snapshot)?;
        println!("HTML report written to {}", path.display());
    }
    Ok(())
}

fn html_report(
    log_file: &Path,
    config: &WatchConfig,
    filter: Option<KeywordFilter>,
) -> HtmlReport {
    HtmlReport::new(log_file.display().to_string())
        .with_keyword(filter)
        .with_file_size(fs::metadata(log_file).ok().map(|m| m.len()))
        .with_limits(config.error_display_limit, config.recent_display_limit)
}

fn print_event(event: &WatchEvent) {
    match event {
        WatchEvent::ErrorDetected(entry) => println!("[ERROR] {}", entry.raw_line),
        WatchEvent::KeywordMatched { entry, .. } => println!("[KEYWORD] {}", entry.raw_line),
        WatchEvent::Rotated { path } => println!("[ROTATED] {}", path.display()),
        // Errors are already reported by ErrorDetected
        WatchEvent::LevelMatched(entry) if entry.is_error() => {}
        WatchEvent::LevelMatched(entry) => println!("[{}] {}", entry.level, entry.raw_line),
    }
}

async fn print_events(mut events: mpsc::UnboundedReceiver<WatchEvent>) {
    while let Some(event) = events.recv().await {
        print_event(&event);
    }
}

/// Re-render the HTML report from the latest snapshot every `interval`.
///
/// Rendering and the file write run on the blocking pool.
async fn refresh_html(
    path: PathBuf,
    report: HtmlReport,
    snapshots: SnapshotHandle,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            _ = ticker.tick() => {
                let (report, path, snapshot) = (report.clone(), path.clone(), snapshots.latest());
                match tokio::task::spawn_blocking(move || report.write(&path, &snapshot)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        tracing::warn!(error = %format!("{:#}", e), "failed to refresh HTML report");
                    }
                    Err(e) => tracing::warn!(error = %e, "HTML refresh task failed"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logwatch_logs::{LineClassifier, StatsAggregator};
    use std::time::Instant;

    #[tokio::test]
    async fn test_refresh_html_follows_latest_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.html");
        let mut agg = StatsAggregator::new(50, 1000);
        agg.update(LineClassifier::classify("ERROR: first failure"));
        agg.publish();
        let cancel = CancellationToken::new();

        let task = tokio::spawn(refresh_html(
            path.clone(),
            HtmlReport::new("app.log"),
            agg.handle(),
            Duration::from_millis(10),
            cancel.clone(),
        ));

        let deadline = Instant::now() + Duration::from_secs(5);
        while !fs::read_to_string(&path).is_ok_and(|html| html.contains("first failure")) {
            assert!(Instant::now() < deadline, "report never written");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }
}
