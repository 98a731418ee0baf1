//! Weakspot Engine — Entry Point
//!
//! Runs one batch scoring pass for a target date and exits.
//!
//! Wiring sequence:
//! 1. Parse CLI args
//! 2. Load config.toml + validate (fail fast before any data is read)
//! 3. Init tracing (JSON structured logging)
//! 4. Create file adapters (event store, odds, report writer)
//! 5. Run DailyRun for the target date
//! 6. Write the Prometheus metrics textfile

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::Parser;
use tracing::{info, warn};

use weakspot_engine::adapters::metrics::RunMetrics;
use weakspot_engine::adapters::persistence::{FileEventStore, FileQuoteStore, ReportWriter};
use weakspot_engine::config;
use weakspot_engine::usecases::DailyRun;

#[derive(Parser)]
#[command(name = "weakspot")]
#[command(about = "Rank pitcher weak spots and score home-run matchups for a date")]
struct Args {
    /// Path to configuration file (TOML)
    #[arg(long, short, default_value = "config.toml", env = "WEAKSPOT_CONFIG")]
    config: PathBuf,

    /// Target date (YYYY-MM-DD); defaults to today (UTC)
    #[arg(long, short)]
    date: Option<NaiveDate>,

    /// Override `run.data_dir`
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Override `run.output_dir`
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Override `run.workers` (0 = one per core)
    #[arg(long)]
    workers: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // ── 1. Load configuration ───────────────────────────────
    let mut config = config::loader::load_config(&args.config)
        .context("Failed to load configuration")?;
    if let Some(dir) = args.data_dir {
        config.run.data_dir = dir;
    }
    if let Some(dir) = args.output_dir {
        config.run.output_dir = dir;
    }
    if let Some(workers) = args.workers {
        config.run.workers = workers;
    }

    // ── 2. Initialize structured JSON logging ───────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.run.log_level)),
        )
        .json()
        .init();

    let target_date = args.date.unwrap_or_else(|| Utc::now().date_naive());

    info!(
        path = %args.config.display(),
        variance_threshold = config.ensemble.variance_threshold,
        workers = config.run.workers,
        "Configuration loaded successfully"
    );
    info!(
        run = %config.run.name,
        version = env!("CARGO_PKG_VERSION"),
        date = %target_date,
        data_dir = %config.run.data_dir.display(),
        lookback_days = config.run.lookback_days,
        "Starting weakspot run"
    );

    // ── 3. Adapters ─────────────────────────────────────────
    let events = Arc::new(FileEventStore::new(&config.run.data_dir));
    let quotes = Arc::new(FileQuoteStore::new(&config.run.data_dir));
    let sink = Arc::new(
        ReportWriter::new(&config.run.output_dir)
            .await
            .context("Failed to prepare output directory")?,
    );
    let metrics = RunMetrics::new().context("Failed to register metrics")?;

    // ── 4. Run ──────────────────────────────────────────────
    let started = Instant::now();
    let run = DailyRun::new(
        Arc::clone(&events),
        Arc::clone(&quotes),
        sink,
        config.clone(),
    );
    let report = run.run(target_date).await?;

    for skip in &report.skipped {
        warn!(
            kind = ?skip.kind,
            pitcher_id = skip.pitcher_id,
            batter_id = ?skip.batter_id,
            name = ?skip.name,
            reason = %skip.reason,
            "Skipped"
        );
    }

    // ── 5. Metrics ──────────────────────────────────────────
    if config.metrics.enabled {
        metrics.observe_report(&report);
        metrics
            .quarantined
            .inc_by((events.quarantined() + quotes.quarantined()) as u64);
        metrics
            .run_duration_seconds
            .set(started.elapsed().as_secs_f64());
        let path = config.run.output_dir.join(&config.metrics.textfile);
        metrics.write_textfile(&path).await?;
    }

    info!(
        run_id = %report.run_id,
        predictions = report.summary.predictions,
        top = ?report.predictions().next().map(|r| r.batter_id),
        "Run finished"
    );
    Ok(())
}
