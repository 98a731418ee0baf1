//! Prediction output types.
//!
//! A `PredictionRecord` is created once per batter/pitcher pairing per
//! run and never mutated afterwards. Its combined score is always the
//! sum of the recorded component contributions, so every pick can be
//! traced back to the exact scores and weights that produced it.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::event::PlayerId;
use super::market::MarketEvaluation;

/// Named ensemble component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    PitcherVulnerability,
    BatterQuality,
    RecentForm,
    HistoricalTrend,
    Market,
}

impl ComponentKind {
    pub const ALL: [Self; 5] = [
        Self::PitcherVulnerability,
        Self::BatterQuality,
        Self::RecentForm,
        Self::HistoricalTrend,
        Self::Market,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::PitcherVulnerability => "pitcher vulnerability",
            Self::BatterQuality => "batter quality",
            Self::RecentForm => "recent form",
            Self::HistoricalTrend => "historical trend",
            Self::Market => "market",
        }
    }
}

impl std::fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Where a component score came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentSource {
    /// Computed from observed data for this player.
    Observed,
    /// League or season prior; carries a wider variance.
    Prior,
    /// No input at all; the component's weight is zero.
    Unavailable,
}

/// One component of the ensemble, as used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentScore {
    /// 0-100.
    pub score: f64,
    /// Variance on the 0-100 scale.
    pub variance: f64,
    /// Weight from configuration.
    pub configured_weight: f64,
    /// Weight actually applied after renormalization.
    pub effective_weight: f64,
    /// `effective_weight * score`.
    pub contribution: f64,
    pub source: ComponentSource,
    /// Short human-readable note on the inputs.
    pub detail: String,
}

/// Why a prediction scored the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Pathway {
    PerfectStorm,
    BatterDriven,
    PitcherDriven,
    Standard,
}

impl std::fmt::Display for Pathway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::PerfectStorm => "perfect-storm",
            Self::BatterDriven => "batter-driven",
            Self::PitcherDriven => "pitcher-driven",
            Self::Standard => "standard",
        };
        f.write_str(label)
    }
}

/// Sign and size of the model's edge over the market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MarketAssessment {
    StronglyNegative,
    SlightNegative,
    Neutral,
    SlightPositive,
    Positive,
}

impl std::fmt::Display for MarketAssessment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::StronglyNegative => "strongly-negative",
            Self::SlightNegative => "slight-negative",
            Self::Neutral => "neutral",
            Self::SlightPositive => "slight-positive",
            Self::Positive => "positive",
        };
        f.write_str(label)
    }
}

/// 95% interval around the combined score, clamped to [0, 100].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
}

impl ConfidenceInterval {
    pub fn around(score: f64, variance: f64) -> Self {
        let half = 1.96 * variance.max(0.0).sqrt();
        Self {
            lower: (score - half).clamp(0.0, 100.0),
            upper: (score + half).clamp(0.0, 100.0),
        }
    }

    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub batter_id: PlayerId,
    pub pitcher_id: PlayerId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batter_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pitcher_name: Option<String>,
    pub date: NaiveDate,
    pub component_scores: BTreeMap<ComponentKind, ComponentScore>,
    /// 0-100.
    pub combined_score: f64,
    /// Floored total variance behind the interval.
    pub total_variance: f64,
    pub confidence_interval: ConfidenceInterval,
    /// Calibrated probability of a home run.
    pub hr_probability: f64,
    pub pathway: Pathway,
    pub market: MarketEvaluation,
    pub rationale: String,
}

impl PredictionRecord {
    pub fn market_assessment(&self) -> MarketAssessment {
        self.market.assessment
    }

    pub fn component(&self, kind: ComponentKind) -> Option<&ComponentScore> {
        self.component_scores.get(&kind)
    }

    /// Sum of component contributions; equals `combined_score` up to the
    /// [0, 100] clamp.
    pub fn contribution_sum(&self) -> f64 {
        self.component_scores.values().map(|c| c.contribution).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_clamped() {
        let ci = ConfidenceInterval::around(3.0, 25.0);
        assert_eq!(ci.lower, 0.0);
        assert!((ci.upper - 12.8).abs() < 1e-9);

        let ci = ConfidenceInterval::around(99.0, 4.0);
        assert_eq!(ci.upper, 100.0);
        assert!((ci.lower - 95.08).abs() < 1e-9);
    }

    #[test]
    fn test_enum_labels() {
        assert_eq!(Pathway::PerfectStorm.to_string(), "perfect-storm");
        assert_eq!(
            serde_json::to_string(&MarketAssessment::SlightPositive).unwrap(),
            "\"slight-positive\""
        );
        assert_eq!(
            serde_json::to_string(&ComponentKind::RecentForm).unwrap(),
            "\"recent_form\""
        );
    }
}
