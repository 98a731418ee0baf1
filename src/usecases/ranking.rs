//! Ranking - Ordering, Summary and Daily Report Assembly
//!
//! Turns the run's raw prediction records, pitcher profiles and skip list
//! into one deterministic `DailyReport`. Ordering never depends on thread
//! scheduling: every sort has a total tie-break down to player id.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::event::{DateWindow, PlayerId};
use crate::domain::prediction::{MarketAssessment, Pathway, PredictionRecord};
use crate::domain::sequence::ExploitationPotential;
use crate::domain::vulnerability::PitcherVulnerabilityProfile;

/// What kind of entity a skip refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipKind {
  /// No vulnerability profile could be built.
  Pitcher,
  /// No prediction could be made for the pairing.
  Pairing,
}

/// An entity that could not be scored, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedEntity {
  pub kind: SkipKind,
  pub pitcher_id: PlayerId,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub batter_id: Option<PlayerId>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  pub reason: String,
}

/// A prediction with its position in the day's ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedPrediction {
  pub rank: u32,
  pub prediction: PredictionRecord,
}

/// One pitcher's place in the weak-spot ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PitcherRanking {
  pub rank: u32,
  pub pitcher_id: PlayerId,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  pub composite_score: f64,
  pub composite_confidence: f64,
  pub total_at_bats: u32,
  pub most_vulnerable_slot: Option<u8>,
  pub most_vulnerable_inning: Option<u8>,
  pub fatigue_detected: bool,
  pub predictability_score: f64,
  pub exploitation_potential: ExploitationPotential,
}

/// Aggregate view of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
  pub predictions: usize,
  pub pitchers_profiled: usize,
  pub skipped: usize,
  pub mean_score: f64,
  pub max_score: f64,
  pub quoted: usize,
  pub by_pathway: BTreeMap<Pathway, usize>,
  pub by_market: BTreeMap<MarketAssessment, usize>,
  /// Batter ids per pathway, in rank order.
  pub picks_by_pathway: BTreeMap<Pathway, Vec<PlayerId>>,
}

/// Output of one daily run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyReport {
  pub run_id: Uuid,
  pub target_date: NaiveDate,
  pub window: DateWindow,
  pub generated_at: DateTime<Utc>,
  pub records: Vec<RankedPrediction>,
  pub pitcher_rankings: Vec<PitcherRanking>,
  pub skipped: Vec<SkippedEntity>,
  pub summary: ReportSummary,
}

impl DailyReport {
  /// Rank and summarize a run's results.
  pub fn assemble(
    target_date: NaiveDate,
    window: DateWindow,
    records: Vec<PredictionRecord>,
    profiles: &[(PitcherVulnerabilityProfile, Option<String>)],
    skipped: Vec<SkippedEntity>,
  ) -> Self {
    let records = rank_predictions(records);
    let pitcher_rankings = rank_pitchers(profiles);
    let summary = summarize(&records, pitcher_rankings.len(), skipped.len());
    Self {
      run_id: Uuid::new_v4(),
      target_date,
      window,
      generated_at: Utc::now(),
      records,
      pitcher_rankings,
      skipped,
      summary,
    }
  }

  /// The records alone, in rank order.
  pub fn predictions(&self) -> impl Iterator<Item = &PredictionRecord> {
    self.records.iter().map(|r| &r.prediction)
  }
}

/// Sort by combined score, then interval lower bound, then batter id.
pub fn rank_predictions(mut records: Vec<PredictionRecord>) -> Vec<RankedPrediction> {
  records.sort_by(|a, b| {
    b.combined_score
      .total_cmp(&a.combined_score)
      .then_with(|| {
        b.confidence_interval
          .lower
          .total_cmp(&a.confidence_interval.lower)
      })
      .then_with(|| a.batter_id.cmp(&b.batter_id))
      .then_with(|| a.pitcher_id.cmp(&b.pitcher_id))
  });
  records
    .into_iter()
    .zip(1u32..)
    .map(|(prediction, rank)| RankedPrediction { rank, prediction })
    .collect()
}

/// Sort pitchers by composite score, then id.
pub fn rank_pitchers(
  profiles: &[(PitcherVulnerabilityProfile, Option<String>)],
) -> Vec<PitcherRanking> {
  let mut sorted: Vec<_> = profiles.iter().collect();
  sorted.sort_by(|(a, _), (b, _)| {
    b.composite_score
      .total_cmp(&a.composite_score)
      .then_with(|| a.pitcher_id.cmp(&b.pitcher_id))
  });
  sorted
    .into_iter()
    .zip(1u32..)
    .map(|((p, name), rank)| PitcherRanking {
      rank,
      pitcher_id: p.pitcher_id,
      name: name.clone(),
      composite_score: p.composite_score,
      composite_confidence: p.composite_confidence,
      total_at_bats: p.total_at_bats,
      most_vulnerable_slot: p.lineup.most_vulnerable_slot,
      most_vulnerable_inning: p.inning.most_vulnerable_inning,
      fatigue_detected: p.inning.fatigue_detected,
      predictability_score: p.sequence.predictability_score,
      exploitation_potential: p.sequence.exploitation_potential,
    })
    .collect()
}

fn summarize(records: &[RankedPrediction], pitchers: usize, skipped: usize) -> ReportSummary {
  let mut summary = ReportSummary {
    predictions: records.len(),
    pitchers_profiled: pitchers,
    skipped,
    ..ReportSummary::default()
  };
  if records.is_empty() {
    return summary;
  }

  let mut total = 0.0;
  for r in records {
    let p = &r.prediction;
    total += p.combined_score;
    summary.max_score = summary.max_score.max(p.combined_score);
    if p.market.quoted {
      summary.quoted += 1;
    }
    *summary.by_pathway.entry(p.pathway).or_default() += 1;
    *summary.by_market.entry(p.market.assessment).or_default() += 1;
    summary
      .picks_by_pathway
      .entry(p.pathway)
      .or_default()
      .push(p.batter_id);
  }
  #[allow(clippy::cast_precision_loss)]
  let n = records.len() as f64;
  summary.mean_score = total / n;
  summary
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::ensemble::{EnsemblePredictor, PredictionInputs};
  use crate::domain::event::BatterProfile;

  fn record(batter_id: PlayerId, score: f64, lower: f64) -> PredictionRecord {
    let batter = BatterProfile {
      batter_id,
      ..BatterProfile::default()
    };
    let mut r = EnsemblePredictor::default()
      .predict(&PredictionInputs {
        batter_id,
        pitcher_id: 1,
        date: NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
        batter: Some(&batter),
        vulnerability: None,
        pitcher_stats: None,
        quote: None,
        batter_known: true,
        pitcher_known: false,
      })
      .unwrap();
    r.combined_score = score;
    r.confidence_interval.lower = lower;
    r
  }

  #[test]
  fn test_rank_order_and_tie_breaks() {
    let ranked = rank_predictions(vec![
      record(5, 60.0, 50.0),
      record(3, 70.0, 55.0),
      record(9, 60.0, 52.0),
      record(2, 60.0, 50.0),
    ]);
    let ids: Vec<_> = ranked.iter().map(|r| r.prediction.batter_id).collect();
    assert_eq!(ids, vec![3, 9, 2, 5]);
    let ranks: Vec<_> = ranked.iter().map(|r| r.rank).collect();
    assert_eq!(ranks, vec![1, 2, 3, 4]);
  }

  #[test]
  fn test_summary_counts() {
    let window = DateWindow::lookback(NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(), 30).unwrap();
    let report = DailyReport::assemble(
      NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
      window,
      vec![record(1, 40.0, 30.0), record(2, 60.0, 50.0)],
      &[],
      vec![SkippedEntity {
        kind: SkipKind::Pitcher,
        pitcher_id: 4,
        batter_id: None,
        name: None,
        reason: "insufficient data".into(),
      }],
    );
    assert_eq!(report.summary.predictions, 2);
    assert_eq!(report.summary.skipped, 1);
    assert!((report.summary.mean_score - 50.0).abs() < 1e-12);
    assert!((report.summary.max_score - 60.0).abs() < 1e-12);
    assert_eq!(report.summary.by_market.get(&MarketAssessment::Neutral), Some(&2));
    assert_eq!(report.predictions().next().unwrap().batter_id, 2);
  }
}
