//! Run Context - Per-run State Passed to Every Scoring Call
//!
//! Holds the immutable event store snapshot, the day's market quotes,
//! the analysis window and the configured analyzers. There is no
//! process-wide cache: a context is built for one target date, shared
//! read-only across worker threads, and dropped when the run ends.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::config::AppConfig;
use crate::domain::ensemble::{EnsemblePredictor, PredictionInputs};
use crate::domain::error::EngineError;
use crate::domain::event::{DateWindow, MarketQuote, PlayerId};
use crate::domain::prediction::PredictionRecord;
use crate::domain::vulnerability::{PitcherVulnerabilityProfile, VulnerabilityAnalyzer};
use crate::ports::event_source::EventSnapshot;

/// Everything a worker needs to score the slate, read-only.
#[derive(Debug, Clone)]
pub struct RunContext {
  target_date: NaiveDate,
  window: DateWindow,
  snapshot: EventSnapshot,
  quotes: BTreeMap<PlayerId, MarketQuote>,
  analyzer: VulnerabilityAnalyzer,
  predictor: EnsemblePredictor,
}

impl RunContext {
  /// Build a context for `target_date` from validated configuration.
  ///
  /// # Errors
  /// `EngineError::Configuration` if the lookback window cannot be formed.
  pub fn new(
    config: &AppConfig,
    target_date: NaiveDate,
    snapshot: EventSnapshot,
    quotes: BTreeMap<PlayerId, MarketQuote>,
  ) -> Result<Self, EngineError> {
    let window = DateWindow::lookback(target_date, config.run.lookback_days)?;
    Ok(Self {
      target_date,
      window,
      snapshot,
      quotes,
      analyzer: VulnerabilityAnalyzer::new(config.vulnerability.clone()),
      predictor: EnsemblePredictor::new(
        config.ensemble.clone(),
        config.batter_quality.clone(),
        config.pathway,
        config.market.clone(),
      ),
    })
  }

  pub fn target_date(&self) -> NaiveDate {
    self.target_date
  }

  pub fn window(&self) -> DateWindow {
    self.window
  }

  pub fn snapshot(&self) -> &EventSnapshot {
    &self.snapshot
  }

  pub fn quote_count(&self) -> usize {
    self.quotes.len()
  }

  /// Vulnerability profile of `pitcher_id` over the run window.
  ///
  /// # Errors
  /// `EngineError::InsufficientData` when the pitcher has no events in
  /// the window.
  pub fn analyze(&self, pitcher_id: PlayerId) -> Result<PitcherVulnerabilityProfile, EngineError> {
    self.analyzer.analyze(
      pitcher_id,
      self.window,
      self.snapshot.events_for_pitcher(pitcher_id),
    )
  }

  /// Prediction for one pairing on the target date.
  ///
  /// `profile` is the pitcher's precomputed vulnerability profile, if
  /// one could be built.
  ///
  /// # Errors
  /// `EngineError::NoProfile` when neither player is known.
  pub fn predict(
    &self,
    batter_id: PlayerId,
    pitcher_id: PlayerId,
    profile: Option<&PitcherVulnerabilityProfile>,
  ) -> Result<PredictionRecord, EngineError> {
    let inputs = PredictionInputs {
      batter_id,
      pitcher_id,
      date: self.target_date,
      batter: self.snapshot.batter(batter_id),
      vulnerability: profile,
      pitcher_stats: self.snapshot.pitcher_stats(pitcher_id),
      quote: self
        .quotes
        .get(&batter_id)
        .filter(|q| q.date == self.target_date),
      batter_known: self.snapshot.knows_batter(batter_id),
      pitcher_known: self.snapshot.knows_pitcher(pitcher_id),
    };
    self.predictor.predict(&inputs)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::event::{AtBatEvent, Outcome};

  fn date(m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, m, d).unwrap()
  }

  fn context(events: Vec<AtBatEvent>) -> RunContext {
    let snapshot = EventSnapshot::new(events, vec![], vec![]);
    RunContext::new(&AppConfig::default(), date(7, 1), snapshot, BTreeMap::new()).unwrap()
  }

  fn event(day: NaiveDate) -> AtBatEvent {
    AtBatEvent {
      pitcher_id: 3,
      batter_id: 4,
      date: day,
      inning: 2,
      lineup_slot: 6,
      pitches: Vec::new(),
      outcome: Outcome::HomeRun,
    }
  }

  #[test]
  fn test_window_excludes_target_day() {
    let ctx = context(vec![event(date(7, 1))]);
    assert_eq!(ctx.window().end, date(6, 30));
    assert!(matches!(
      ctx.analyze(3),
      Err(EngineError::InsufficientData { pitcher_id: 3, .. })
    ));
  }

  #[test]
  fn test_unknown_pair_is_no_profile() {
    let ctx = context(vec![event(date(6, 20))]);
    assert!(ctx.analyze(3).is_ok());
    assert!(matches!(
      ctx.predict(77, 88, None),
      Err(EngineError::NoProfile { batter_id: 77, pitcher_id: 88 })
    ));
    // Batter 4 is known from events alone.
    assert!(ctx.predict(4, 88, None).is_ok());
  }
}
