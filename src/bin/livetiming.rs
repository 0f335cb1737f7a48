//! livetiming - decode, replay and resynchronize timing captures
//!
//! Usage:
//!     livetiming watch race.txt
//!     livetiming watch --pace --speed 4 race.txt
//!     livetiming replay --speed 2 race.txt > paced.txt
//!     livetiming resync race.txt --sample 81=0.412 --sample 63=1.024

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use livetiming::driver::Driver;
use livetiming::history::Intervals;
use livetiming::provider::Provider;
use livetiming::providers::{CaptureProvider, HistoryProvider, ReplayProvider};
use livetiming::{
    ConnectionState, Interval, Pipeline, PositionTracker, ReplayOptions, TimingConnection,
    TimingLine,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "livetiming")]
#[command(about = "Decode, replay and resynchronize live timing captures")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode a capture, print its events and the final classification
    Watch {
        /// Capture file, or `-` for standard input
        capture: PathBuf,

        /// Keep the capture's original spacing between updates
        #[arg(long)]
        pace: bool,

        /// Speed multiplier when pacing
        #[arg(long, default_value_t = 1.0)]
        speed: f64,

        /// Print only the final classification
        #[arg(short, long)]
        quiet: bool,
    },

    /// Re-emit a capture's records to standard output with their original pacing
    Replay {
        capture: PathBuf,

        #[arg(long, default_value_t = 1.0)]
        speed: f64,

        /// Longest wait between two records, in seconds
        #[arg(long, default_value_t = 5.0)]
        max_wait: f64,
    },

    /// Find where an observed set of intervals occurred in a capture
    Resync {
        capture: PathBuf,

        /// Observed interval as DRIVER=SECONDS, repeatable
        #[arg(short, long = "sample", value_parser = parse_sample, required = true)]
        samples: Vec<(u32, Interval)>,
    },
}

fn parse_sample(value: &str) -> Result<(u32, Interval), String> {
    let (driver, interval) = value
        .split_once('=')
        .ok_or_else(|| format!("expected DRIVER=SECONDS, got '{value}'"))?;
    let driver = driver.trim().parse().map_err(|_| format!("'{driver}' is not a driver number"))?;
    let interval = interval.parse().map_err(|e: livetiming::InvalidInterval| e.to_string())?;
    Ok((driver, interval))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match Args::parse().command {
        Command::Watch { capture, pace, speed, quiet } => watch(capture, pace, speed, quiet).await,
        Command::Replay { capture, speed, max_wait } => replay(capture, speed, max_wait).await,
        Command::Resync { capture, samples } => resync(capture, samples).await,
    }
}

async fn watch(capture: PathBuf, pace: bool, speed: f64, quiet: bool) -> anyhow::Result<()> {
    let provider = CaptureProvider::open(&capture).await?;
    let pipeline = Pipeline::new();
    // Subscribe before the driver starts so the roster is not missed
    let mut events = Box::pin(pipeline.events());

    let connection = if pace {
        let options = ReplayOptions::default().with_multiplier(speed);
        TimingConnection::from_provider(ReplayProvider::with_options(provider, options), pipeline)
    } else {
        TimingConnection::from_provider(provider, pipeline)
    };

    while let Some(event) = events.next().await {
        if !quiet {
            println!("{}", serde_json::to_string(&*event)?);
        }
    }

    match connection.finished().await {
        ConnectionState::Failed { reason } => {
            bail!("decoding {} failed: {reason}", capture.display())
        }
        state => info!(?state, "Capture decoded"),
    }

    print_classification(&connection.current_standings());
    Ok(())
}

async fn replay(capture: PathBuf, speed: f64, max_wait: f64) -> anyhow::Result<()> {
    if !max_wait.is_finite() || max_wait < 0.0 {
        bail!("--max-wait must be a non-negative number of seconds");
    }
    let options = ReplayOptions {
        max_wait: std::time::Duration::from_secs_f64(max_wait),
        ..ReplayOptions::default().with_multiplier(speed)
    };
    let capture = CaptureProvider::open(&capture).await?;
    let mut provider = ReplayProvider::with_options(capture, options);

    let mut records = 0u64;
    while let Some(update) = provider.next_update().await? {
        println!("{}", update.to_record());
        records += 1;
    }
    info!(records, "Replay finished");
    Ok(())
}

async fn resync(capture: PathBuf, samples: Vec<(u32, Interval)>) -> anyhow::Result<()> {
    let observed: Intervals = samples.into_iter().collect();

    let provider = HistoryProvider::new(CaptureProvider::open(&capture).await?);
    let history = provider.history();
    let mut pipeline = Pipeline::new();
    pipeline.subscribe(history.interval_recorder());

    let outcome = Driver::spawn(provider, pipeline)
        .wait()
        .await
        .with_context(|| format!("recording {}", capture.display()))?;
    info!(updates = outcome.updates, snapshots = history.snapshot_count(), "Capture recorded");

    let found = history.find(&observed)?;
    println!(
        "Matched sequence {} ({} of {} drivers exact)",
        found.sequence, found.score, found.observed
    );

    let (replay, continuation) = outcome.provider.resume_from(found.sequence)?;
    let tracker = Arc::new(Mutex::new(PositionTracker::new()));
    let mut rebuilt = Pipeline::new();
    rebuilt.subscribe(tracker.clone());
    for update in &replay {
        rebuilt.feed(update)?;
    }
    drop(continuation);

    println!(
        "{} updates to rebuild state, {} after the match",
        replay.len(),
        history.len().saturating_sub(replay.len())
    );
    let order = tracker
        .lock()
        .map_err(|_| anyhow::anyhow!("tracker lock poisoned"))?
        .running_order();
    print_classification(&order);
    Ok(())
}

fn print_classification(lines: &[TimingLine]) {
    for line in lines.iter().filter(|line| !line.retired) {
        let position = line.position.map_or_else(|| "-".to_string(), |p| format!("P{p}"));
        let gap = line.interval.map_or_else(String::new, |i| format!("+{:.3}", i.as_secs_f64()));
        println!("{position:>4}  {:>3}  {:<20} {gap}", line.number, line.broadcast_name);
    }
    let retired: Vec<String> =
        lines.iter().filter(|line| line.retired).map(|l| l.number.to_string()).collect();
    if !retired.is_empty() {
        println!("  NC  {}", retired.join(", "));
    }
}
