//! Market efficiency evaluator.
//!
//! Converts a sportsbook price to an implied probability and measures the
//! model's edge against it. Odds conversion runs on `Decimal` so that
//! American prices map to exact decimal odds; callers see `f64`.

use rust_decimal::Decimal;
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::error::EngineError;
use super::event::{MarketQuote, Odds};
use super::prediction::MarketAssessment;

/// Assessment boundaries and market-component tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSettings {
    /// Edges at or below this are strongly negative.
    #[serde(default = "default_strongly_negative")]
    pub strongly_negative: f64,
    /// Edges at or below this are slightly negative.
    #[serde(default = "default_slight_negative")]
    pub slight_negative: f64,
    /// Edges at or above this are slightly positive.
    #[serde(default = "default_slight_positive")]
    pub slight_positive: f64,
    /// Edges at or above this are positive.
    #[serde(default = "default_positive")]
    pub positive: f64,
    /// Edge that moves the market component score by 50 points.
    #[serde(default = "default_edge_scale")]
    pub edge_scale: f64,
    /// Variance of the market component score.
    #[serde(default = "default_market_variance")]
    pub variance: f64,
    /// Implied-probability change below which a line is stable.
    #[serde(default = "default_movement_threshold")]
    pub movement_threshold: f64,
}

impl MarketSettings {
    /// # Errors
    /// Returns `EngineError::Configuration` unless the boundaries strictly
    /// ascend and the scale and variance are positive.
    pub fn validate(&self) -> Result<(), EngineError> {
        let bounds = [
            self.strongly_negative,
            self.slight_negative,
            self.slight_positive,
            self.positive,
        ];
        if bounds.iter().any(|b| !b.is_finite()) || bounds.windows(2).any(|w| w[0] >= w[1]) {
            return Err(EngineError::Configuration(format!(
                "market boundaries must strictly ascend, got {bounds:?}"
            )));
        }
        if !(self.edge_scale.is_finite() && self.edge_scale > 0.0) {
            return Err(EngineError::Configuration(format!(
                "market.edge_scale must be positive, got {}",
                self.edge_scale
            )));
        }
        if !(self.variance.is_finite() && self.variance > 0.0) {
            return Err(EngineError::Configuration(format!(
                "market.variance must be positive, got {}",
                self.variance
            )));
        }
        if !(self.movement_threshold.is_finite() && self.movement_threshold >= 0.0) {
            return Err(EngineError::Configuration(format!(
                "market.movement_threshold must be >= 0, got {}",
                self.movement_threshold
            )));
        }
        Ok(())
    }
}

impl Default for MarketSettings {
    fn default() -> Self {
        Self {
            strongly_negative: default_strongly_negative(),
            slight_negative: default_slight_negative(),
            slight_positive: default_slight_positive(),
            positive: default_positive(),
            edge_scale: default_edge_scale(),
            variance: default_market_variance(),
            movement_threshold: default_movement_threshold(),
        }
    }
}

fn default_strongly_negative() -> f64 {
    -0.05
}

fn default_slight_negative() -> f64 {
    -0.01
}

fn default_slight_positive() -> f64 {
    0.01
}

fn default_positive() -> f64 {
    0.05
}

fn default_edge_scale() -> f64 {
    0.10
}

fn default_market_variance() -> f64 {
    64.0
}

fn default_movement_threshold() -> f64 {
    0.01
}

// ────────────────────────────────────────────
// Odds conversion
// ────────────────────────────────────────────

impl Odds {
    /// Exact decimal odds, or `None` for an invalid price.
    pub fn to_decimal(self) -> Option<Decimal> {
        match self {
            Self::Decimal(d) => {
                let d = Decimal::from_f64(d)?;
                (d > Decimal::ONE).then_some(d)
            }
            Self::American(a) => {
                let a = Decimal::from(a);
                let hundred = dec!(100);
                if a >= hundred {
                    Some(Decimal::ONE + a / hundred)
                } else if a <= -hundred {
                    Some(Decimal::ONE + hundred / a.abs())
                } else {
                    None
                }
            }
        }
    }

    /// Decimal odds as `f64`.
    pub fn decimal_odds(self) -> Option<f64> {
        self.to_decimal()?.to_f64()
    }

    /// `1 / decimal_odds`.
    pub fn implied_probability(self) -> Option<f64> {
        let d = self.to_decimal()?;
        (Decimal::ONE / d).to_f64()
    }

    pub fn is_valid(self) -> bool {
        self.to_decimal().is_some()
    }
}

/// Direction the price moved since opening.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineMovement {
    Stable,
    /// Implied probability rose: money came in on the home run.
    Shortened,
    Lengthened,
}

/// Result of comparing a model probability with a quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketEvaluation {
    pub assessment: MarketAssessment,
    /// False when no valid quote was available.
    pub quoted: bool,
    /// `model_probability - implied_probability`; zero when unquoted.
    pub edge: f64,
    pub model_probability: f64,
    pub implied_probability: Option<f64>,
    pub decimal_odds: Option<f64>,
    /// Expected profit per unit stake at the current price.
    pub expected_value: Option<f64>,
    pub movement: Option<LineMovement>,
}

impl MarketEvaluation {
    fn unquoted(model_probability: f64) -> Self {
        Self {
            assessment: MarketAssessment::Neutral,
            quoted: false,
            edge: 0.0,
            model_probability,
            implied_probability: None,
            decimal_odds: None,
            expected_value: None,
            movement: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MarketEvaluator {
    settings: MarketSettings,
}

impl MarketEvaluator {
    pub fn new(settings: MarketSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &MarketSettings {
        &self.settings
    }

    /// Compares `model_probability` against the quote.
    ///
    /// A missing or unparseable quote yields a neutral, unquoted result;
    /// no edge is ever invented.
    pub fn evaluate(&self, quote: Option<&MarketQuote>, model_probability: f64) -> MarketEvaluation {
        let Some(quote) = quote else {
            return MarketEvaluation::unquoted(model_probability);
        };
        let (Some(implied), Some(decimal)) = (
            quote.current.implied_probability(),
            quote.current.decimal_odds(),
        ) else {
            return MarketEvaluation::unquoted(model_probability);
        };

        let edge = model_probability - implied;
        let movement = quote
            .opening
            .and_then(Odds::implied_probability)
            .map(|opening| self.movement(opening, implied));

        MarketEvaluation {
            assessment: self.assess(edge),
            quoted: true,
            edge,
            model_probability,
            implied_probability: Some(implied),
            decimal_odds: Some(decimal),
            expected_value: Some(model_probability * decimal - 1.0),
            movement,
        }
    }

    pub fn assess(&self, edge: f64) -> MarketAssessment {
        let s = &self.settings;
        if edge <= s.strongly_negative {
            MarketAssessment::StronglyNegative
        } else if edge <= s.slight_negative {
            MarketAssessment::SlightNegative
        } else if edge < s.slight_positive {
            MarketAssessment::Neutral
        } else if edge < s.positive {
            MarketAssessment::SlightPositive
        } else {
            MarketAssessment::Positive
        }
    }

    /// Market component score: 50 at zero edge, 0 or 100 at one
    /// `edge_scale` either side.
    pub fn component_score(&self, evaluation: &MarketEvaluation) -> f64 {
        (50.0 + 50.0 * evaluation.edge / self.settings.edge_scale).clamp(0.0, 100.0)
    }

    fn movement(&self, opening_implied: f64, current_implied: f64) -> LineMovement {
        let delta = current_implied - opening_implied;
        if delta.abs() < self.settings.movement_threshold {
            LineMovement::Stable
        } else if delta > 0.0 {
            LineMovement::Shortened
        } else {
            LineMovement::Lengthened
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn quote(current: Odds, opening: Option<Odds>) -> MarketQuote {
        MarketQuote {
            batter_id: 1,
            date: NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
            current,
            opening,
        }
    }

    #[test]
    fn test_american_conversion() {
        assert_eq!(Odds::American(350).to_decimal(), Some(dec!(4.5)));
        assert_eq!(Odds::American(-200).to_decimal(), Some(dec!(1.5)));
        assert_eq!(Odds::American(50).to_decimal(), None);
        assert_eq!(Odds::Decimal(1.0).to_decimal(), None);
        let p = Odds::American(300).implied_probability().unwrap();
        assert!((p - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_positive_edge_at_decimal_three() {
        let eval = MarketEvaluator::default().evaluate(Some(&quote(Odds::Decimal(3.0), None)), 0.40);
        assert!(eval.quoted);
        assert!((eval.implied_probability.unwrap() - 1.0 / 3.0).abs() < 1e-9);
        assert!((eval.edge - 0.0667).abs() < 1e-3);
        assert_eq!(eval.assessment, MarketAssessment::Positive);
        assert!((eval.expected_value.unwrap() - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_buckets() {
        let m = MarketEvaluator::default();
        assert_eq!(m.assess(-0.08), MarketAssessment::StronglyNegative);
        assert_eq!(m.assess(-0.02), MarketAssessment::SlightNegative);
        assert_eq!(m.assess(0.0), MarketAssessment::Neutral);
        assert_eq!(m.assess(0.03), MarketAssessment::SlightPositive);
        assert_eq!(m.assess(0.05), MarketAssessment::Positive);
    }

    #[test]
    fn test_missing_quote_is_neutral() {
        let m = MarketEvaluator::default();
        let eval = m.evaluate(None, 0.12);
        assert!(!eval.quoted);
        assert_eq!(eval.edge, 0.0);
        assert_eq!(eval.assessment, MarketAssessment::Neutral);
        assert!(eval.implied_probability.is_none());

        let bad = m.evaluate(Some(&quote(Odds::American(20), None)), 0.12);
        assert!(!bad.quoted);
    }

    #[test]
    fn test_line_movement() {
        let m = MarketEvaluator::default();
        let shortened = m.evaluate(
            Some(&quote(Odds::American(300), Some(Odds::American(400)))),
            0.2,
        );
        assert_eq!(shortened.movement, Some(LineMovement::Shortened));

        let stable = m.evaluate(
            Some(&quote(Odds::American(400), Some(Odds::American(410)))),
            0.2,
        );
        assert_eq!(stable.movement, Some(LineMovement::Stable));

        let lengthened = m.evaluate(
            Some(&quote(Odds::Decimal(6.0), Some(Odds::Decimal(4.0)))),
            0.2,
        );
        assert_eq!(lengthened.movement, Some(LineMovement::Lengthened));
    }

    #[test]
    fn test_component_score() {
        let m = MarketEvaluator::default();
        let mut eval = m.evaluate(None, 0.1);
        assert!((m.component_score(&eval) - 50.0).abs() < 1e-12);
        eval.edge = 0.05;
        assert!((m.component_score(&eval) - 75.0).abs() < 1e-12);
        eval.edge = 0.5;
        assert_eq!(m.component_score(&eval), 100.0);
    }

    #[test]
    fn test_settings_validation() {
        let mut s = MarketSettings::default();
        assert!(s.validate().is_ok());
        s.slight_positive = -0.02;
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_settings_reject_nan() {
        let mut s = MarketSettings::default();
        s.slight_positive = f64::NAN;
        assert!(s.validate().is_err());

        let mut s = MarketSettings::default();
        s.edge_scale = f64::NAN;
        assert!(s.validate().is_err());

        let mut s = MarketSettings::default();
        s.variance = f64::INFINITY;
        assert!(s.validate().is_err());

        let mut s = MarketSettings::default();
        s.movement_threshold = f64::NAN;
        assert!(s.validate().is_err());
    }
}
