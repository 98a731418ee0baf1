//! Daily Run - One Batch Scoring Pass for a Target Date
//!
//! The main use case that:
//! 1. Loads the event store snapshot, slate and quotes via the ports
//! 2. Builds a vulnerability profile for every slate pitcher in parallel
//! 3. Predicts every pairing in parallel against the finished profiles
//! 4. Ranks the results and publishes the daily report
//!
//! Entities that cannot be scored land in the skip list; only invalid
//! configuration aborts a run.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rayon::prelude::*;
use tracing::{debug, info, instrument, warn};

use crate::config::AppConfig;
use crate::domain::event::{Matchup, PlayerId};
use crate::domain::vulnerability::PitcherVulnerabilityProfile;
use crate::ports::event_source::EventSource;
use crate::ports::quote_source::QuoteSource;
use crate::ports::report_sink::ReportSink;

use super::ranking::{DailyReport, SkipKind, SkippedEntity};
use super::run_context::RunContext;

/// Daily run orchestrating load, score, rank and publish.
pub struct DailyRun<E: EventSource, Q: QuoteSource, R: ReportSink> {
  /// Event store adapter.
  events: Arc<E>,
  /// Market quote adapter.
  quotes: Arc<Q>,
  /// Report destination.
  sink: Arc<R>,
  /// Validated configuration.
  config: AppConfig,
}

impl<E: EventSource, Q: QuoteSource, R: ReportSink> DailyRun<E, Q, R> {
  /// Create a new daily run.
  pub fn new(events: Arc<E>, quotes: Arc<Q>, sink: Arc<R>, config: AppConfig) -> Self {
    Self {
      events,
      quotes,
      sink,
      config,
    }
  }

  /// Score the slate for `target_date` and publish the report.
  ///
  /// # Errors
  /// Adapter failures, or an `EngineError::Configuration` when the
  /// window cannot be formed. Per-entity failures are not errors.
  #[instrument(skip(self), fields(run = %self.config.run.name))]
  pub async fn run(&self, target_date: NaiveDate) -> Result<DailyReport> {
    let started = Instant::now();

    let snapshot = self
      .events
      .load_snapshot()
      .await
      .context("Failed to load event snapshot")?;
    let slate = self
      .events
      .load_slate(target_date)
      .await
      .with_context(|| format!("Failed to load slate for {target_date}"))?;
    let quotes = self
      .quotes
      .load_quotes(target_date)
      .await
      .with_context(|| format!("Failed to load quotes for {target_date}"))?;

    info!(
      events = snapshot.event_count(),
      pitchers = snapshot.pitcher_count(),
      matchups = slate.len(),
      quotes = quotes.len(),
      "Inputs loaded"
    );

    let ctx = RunContext::new(&self.config, target_date, snapshot, quotes)?;
    let workers = self.config.run.workers;
    let report = tokio::task::spawn_blocking(move || score_slate(&ctx, &slate, workers))
      .await
      .context("Scoring task panicked")??;

    self
      .sink
      .publish(&report)
      .await
      .context("Failed to publish daily report")?;

    info!(
      run_id = %report.run_id,
      predictions = report.summary.predictions,
      skipped = report.summary.skipped,
      elapsed_ms = started.elapsed().as_millis() as u64,
      "Daily run complete"
    );

    Ok(report)
  }
}

/// Score a slate against a run context on a dedicated worker pool.
///
/// Output order depends only on the inputs: profiles are keyed by
/// pitcher id and predictions keep slate order before ranking.
///
/// # Errors
/// Only if the worker pool cannot be created.
pub fn score_slate(ctx: &RunContext, slate: &[Matchup], workers: usize) -> Result<DailyReport> {
  let pool = rayon::ThreadPoolBuilder::new()
    .num_threads(workers)
    .thread_name(|i| format!("weakspot-worker-{i}"))
    .build()
    .context("Failed to build scoring thread pool")?;

  let matchups = dedup_slate(slate);
  let pitcher_ids: Vec<PlayerId> = matchups
    .iter()
    .map(|m| m.pitcher_id)
    .collect::<BTreeSet<_>>()
    .into_iter()
    .collect();

  let ((by_pitcher, mut skipped), predictions) = pool.install(|| {
    let profiles: Vec<_> = pitcher_ids
      .par_iter()
      .map(|id| (*id, ctx.analyze(*id)))
      .collect();

    let mut by_pitcher: BTreeMap<PlayerId, PitcherVulnerabilityProfile> = BTreeMap::new();
    let mut skipped = Vec::new();
    for (pitcher_id, result) in profiles {
      match result {
        Ok(profile) => {
          debug!(
            pitcher_id,
            composite = profile.composite_score,
            at_bats = profile.total_at_bats,
            "Profile built"
          );
          by_pitcher.insert(pitcher_id, profile);
        }
        Err(e) => {
          warn!(pitcher_id, error = %e, "Skipping pitcher profile");
          skipped.push(SkippedEntity {
            kind: SkipKind::Pitcher,
            pitcher_id,
            batter_id: None,
            name: ctx
              .snapshot()
              .pitcher_stats(pitcher_id)
              .and_then(|p| p.name.clone()),
            reason: e.to_string(),
          });
        }
      }
    }

    let predictions: Vec<_> = matchups
      .par_iter()
      .map(|m| {
        (
          *m,
          ctx.predict(m.batter_id, m.pitcher_id, by_pitcher.get(&m.pitcher_id)),
        )
      })
      .collect();

    ((by_pitcher, skipped), predictions)
  });

  let mut records = Vec::with_capacity(predictions.len());
  for (matchup, result) in predictions {
    match result {
      Ok(record) => records.push(record),
      Err(e) => {
        warn!(
          batter_id = matchup.batter_id,
          pitcher_id = matchup.pitcher_id,
          error = %e,
          "Skipping pairing"
        );
        skipped.push(SkippedEntity {
          kind: SkipKind::Pairing,
          pitcher_id: matchup.pitcher_id,
          batter_id: Some(matchup.batter_id),
          name: None,
          reason: e.to_string(),
        });
      }
    }
  }

  let named: Vec<_> = by_pitcher
    .into_values()
    .map(|p| {
      let name = ctx
        .snapshot()
        .pitcher_stats(p.pitcher_id)
        .and_then(|s| s.name.clone());
      (p, name)
    })
    .collect();

  Ok(DailyReport::assemble(
    ctx.target_date(),
    ctx.window(),
    records,
    &named,
    skipped,
  ))
}

/// Drop repeated pairings, keeping first occurrence.
fn dedup_slate(slate: &[Matchup]) -> Vec<Matchup> {
  let mut seen = BTreeSet::new();
  slate
    .iter()
    .filter(|m| seen.insert((m.batter_id, m.pitcher_id)))
    .copied()
    .collect()
}
