//! # Tick Demo
//!
//! Drives a TickScheduler through a full lifecycle: tick, pause, change the interval, resume,
//! then stop and print the drift metrics.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{TimeZone, Utc};
use clap::Parser;
use tick_scheduler::{EventKind, TickScheduler, TimerConfig, TimerEvent};
use tokio::sync::mpsc;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "tick-demo")]
#[command(about = "Run a self-correcting tick scheduler through start, pause, resume and stop")]
#[command(version)]
struct Cli {
    /// Tick interval in milliseconds
    #[arg(short, long, default_value = "1000", allow_hyphen_values = true)]
    interval: i64,

    /// Load interval and precision from a TOML file instead
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Disable drift correction
    #[arg(long)]
    no_precision: bool,

    /// Ticks to run before pausing, and again after resuming
    #[arg(short, long, default_value = "5")]
    ticks: u64,

    /// How long to stay paused, in milliseconds
    #[arg(long, default_value = "3000")]
    pause_ms: u64,

    /// Interval to switch to while paused
    #[arg(long)]
    resume_interval: Option<i64>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

fn format_wall(ms: u64) -> String {
    i64::try_from(ms)
        .ok()
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .map(|time| time.to_rfc3339())
        .unwrap_or_else(|| ms.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt().with_max_level(level).init();

    let mut config = match &cli.config {
        Some(path) => TimerConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => TimerConfig::from(cli.interval),
    };
    if cli.no_precision {
        config.precision = false;
    }

    let timer = TickScheduler::new(config);
    info!("Timer interval {}ms, precision {}", timer.interval(), timer.precision());

    // handlers run synchronously, so forward everything to the main task
    let (tx, mut rx) = mpsc::unbounded_channel::<(EventKind, u64)>();
    for kind in
        [EventKind::Start, EventKind::Stop, EventKind::Pause, EventKind::Resume, EventKind::Tick]
    {
        let tx = tx.clone();
        timer.on(kind, move |event: &TimerEvent| {
            tx.send((event.name, event.timer.tick_count()))?;
            Ok(())
        });
    }
    drop(tx);

    let ticks = cli.ticks.max(1);
    timer.start()?;

    let mut resumed = false;
    while let Some((kind, tick_count)) = rx.recv().await {
        match kind {
            EventKind::Start => info!("Timer started at {}", format_wall(timer.time().started)),
            EventKind::Pause => info!("Timer paused"),
            EventKind::Resume => info!("Timer resumed"),
            EventKind::Stop => {
                info!("Timer stopped at {}", format_wall(timer.time().stopped));
                break;
            }
            EventKind::Tick => {
                info!("Tick count: {}", tick_count);
                if !resumed && tick_count == ticks {
                    timer.pause()?;
                    info!("...waiting for {}ms before resuming", cli.pause_ms);
                    tokio::time::sleep(Duration::from_millis(cli.pause_ms)).await;
                    if let Some(interval) = cli.resume_interval {
                        info!("...changing timer interval to {}ms", interval);
                        timer.set_interval(interval);
                    }
                    resumed = true;
                    timer.resume()?;
                } else if resumed && tick_count >= ticks * 2 {
                    timer.stop()?;
                }
            }
            EventKind::Reset => {}
        }
    }

    let time = timer.time();
    info!("Ran for {}ms over {} ticks", time.elapsed, timer.tick_count());
    println!("{}", serde_json::to_string_pretty(&timer.metrics())?);

    Ok(())
}
