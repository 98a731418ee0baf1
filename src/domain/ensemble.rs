//! Ensemble prediction engine.
//!
//! Fuses five component scores (pitcher vulnerability, batter quality,
//! recent form, historical trend, market) into one 0-100 score with an
//! explicit variance. Missing inputs never fall back to a bare constant:
//! they resolve to a Bayesian prior with a wider variance, and the total
//! variance is floored so sparse data always produces a visible
//! uncertainty band.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::confidence::{
    decay_weight, probability_from_score, proportion_variance, BetaPosterior, PriorSettings,
};
use super::error::EngineError;
use super::event::{BatterProfile, MarketQuote, PitcherSeasonStats, PlayerId};
use super::market::{MarketEvaluation, MarketEvaluator, MarketSettings};
use super::prediction::{
    ComponentKind, ComponentScore, ComponentSource, ConfidenceInterval, Pathway, PredictionRecord,
};
use super::vulnerability::{validate_weight_set, PitcherVulnerabilityProfile};

// ────────────────────────────────────────────
// Settings
// ────────────────────────────────────────────

/// Configured component weights. Must sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComponentWeights {
    #[serde(default = "default_w_vulnerability")]
    pub pitcher_vulnerability: f64,
    #[serde(default = "default_w_batter_quality")]
    pub batter_quality: f64,
    #[serde(default = "default_w_recent_form")]
    pub recent_form: f64,
    #[serde(default = "default_w_trend")]
    pub historical_trend: f64,
    #[serde(default = "default_w_market")]
    pub market: f64,
}

impl ComponentWeights {
    pub const fn get(&self, kind: ComponentKind) -> f64 {
        match kind {
            ComponentKind::PitcherVulnerability => self.pitcher_vulnerability,
            ComponentKind::BatterQuality => self.batter_quality,
            ComponentKind::RecentForm => self.recent_form,
            ComponentKind::HistoricalTrend => self.historical_trend,
            ComponentKind::Market => self.market,
        }
    }

    /// # Errors
    /// `EngineError::Configuration` unless the weights are in [0, 1] and
    /// sum to 1. User weights are never silently renormalized.
    pub fn validate(&self) -> Result<(), EngineError> {
        let weights = [
            ("pitcher_vulnerability", self.pitcher_vulnerability),
            ("batter_quality", self.batter_quality),
            ("recent_form", self.recent_form),
            ("historical_trend", self.historical_trend),
            ("market", self.market),
        ];
        validate_weight_set("ensemble.weights", &weights)
    }
}

impl Default for ComponentWeights {
    fn default() -> Self {
        Self {
            pitcher_vulnerability: default_w_vulnerability(),
            batter_quality: default_w_batter_quality(),
            recent_form: default_w_recent_form(),
            historical_trend: default_w_trend(),
            market: default_w_market(),
        }
    }
}

fn default_w_vulnerability() -> f64 {
    0.30
}

fn default_w_batter_quality() -> f64 {
    0.25
}

fn default_w_recent_form() -> f64 {
    0.20
}

fn default_w_trend() -> f64 {
    0.15
}

fn default_w_market() -> f64 {
    0.10
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleSettings {
    #[serde(default)]
    pub weights: ComponentWeights,
    /// Games in the recent-form window.
    #[serde(default = "default_recent_games")]
    pub recent_games: usize,
    /// Per-season decay for the historical trend.
    #[serde(default = "default_decay_factor")]
    pub decay_factor: f64,
    /// Floor on total prediction variance.
    #[serde(default = "default_variance_threshold")]
    pub variance_threshold: f64,
    /// Variance assigned to a component resolved from the league prior.
    #[serde(default = "default_prior_variance")]
    pub prior_variance: f64,
    /// League HR rate times this maps to a component score of 100.
    #[serde(default = "default_rate_scale")]
    pub rate_scale: f64,
    /// Cap on the year-over-year trend adjustment, in score points.
    #[serde(default = "default_trend_gain")]
    pub trend_gain: f64,
    /// Log-odds shift between a score of 50 and 100.
    #[serde(default = "default_calibration_steepness")]
    pub calibration_steepness: f64,
    #[serde(default)]
    pub prior: PriorSettings,
}

impl EnsembleSettings {
    /// # Errors
    /// Returns the first `EngineError::Configuration` found.
    pub fn validate(&self) -> Result<(), EngineError> {
        self.weights.validate()?;
        self.prior.validate()?;
        if !(self.variance_threshold.is_finite() && self.variance_threshold > 0.0) {
            return Err(EngineError::Configuration(format!(
                "ensemble.variance_threshold must be positive, got {}",
                self.variance_threshold
            )));
        }
        if !(self.decay_factor > 0.0 && self.decay_factor <= 1.0) {
            return Err(EngineError::Configuration(format!(
                "ensemble.decay_factor must be in (0, 1], got {}",
                self.decay_factor
            )));
        }
        if self.recent_games == 0 {
            return Err(EngineError::Configuration(
                "ensemble.recent_games must be >= 1".to_string(),
            ));
        }
        for (name, v) in [
            ("prior_variance", self.prior_variance),
            ("rate_scale", self.rate_scale),
            ("calibration_steepness", self.calibration_steepness),
        ] {
            if !(v.is_finite() && v > 0.0) {
                return Err(EngineError::Configuration(format!(
                    "ensemble.{name} must be positive, got {v}"
                )));
            }
        }
        if !(self.trend_gain.is_finite() && self.trend_gain >= 0.0) {
            return Err(EngineError::Configuration(format!(
                "ensemble.trend_gain must be >= 0, got {}",
                self.trend_gain
            )));
        }
        Ok(())
    }
}

impl Default for EnsembleSettings {
    fn default() -> Self {
        Self {
            weights: ComponentWeights::default(),
            recent_games: default_recent_games(),
            decay_factor: default_decay_factor(),
            variance_threshold: default_variance_threshold(),
            prior_variance: default_prior_variance(),
            rate_scale: default_rate_scale(),
            trend_gain: default_trend_gain(),
            calibration_steepness: default_calibration_steepness(),
            prior: PriorSettings::default(),
        }
    }
}

fn default_recent_games() -> usize {
    12
}

fn default_decay_factor() -> f64 {
    0.85
}

fn default_variance_threshold() -> f64 {
    5.0
}

fn default_prior_variance() -> f64 {
    225.0
}

fn default_rate_scale() -> f64 {
    2.0
}

fn default_trend_gain() -> f64 {
    25.0
}

fn default_calibration_steepness() -> f64 {
    1.5
}

/// Linear normalization range and league average for one batter metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricBounds {
    pub min: f64,
    pub max: f64,
    pub league_average: f64,
}

impl MetricBounds {
    /// Maps `value` to 0-100 within the bounds.
    pub fn normalize(&self, value: f64) -> f64 {
        ((value - self.min) / (self.max - self.min) * 100.0).clamp(0.0, 100.0)
    }

    fn validate(&self, name: &str) -> Result<(), EngineError> {
        if !(self.min.is_finite() && self.max.is_finite() && self.min < self.max) {
            return Err(EngineError::Configuration(format!(
                "batter_quality.{name}: min ({}) must be below max ({})",
                self.min, self.max
            )));
        }
        if !self.league_average.is_finite() {
            return Err(EngineError::Configuration(format!(
                "batter_quality.{name}: league_average must be finite, got {}",
                self.league_average
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityWeights {
    #[serde(default = "default_qw_exit_velocity")]
    pub exit_velocity: f64,
    #[serde(default = "default_qw_isolated_power")]
    pub isolated_power: f64,
    #[serde(default = "default_qw_hard_hit")]
    pub hard_hit_rate: f64,
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            exit_velocity: default_qw_exit_velocity(),
            isolated_power: default_qw_isolated_power(),
            hard_hit_rate: default_qw_hard_hit(),
        }
    }
}

fn default_qw_exit_velocity() -> f64 {
    0.35
}

fn default_qw_isolated_power() -> f64 {
    0.35
}

fn default_qw_hard_hit() -> f64 {
    0.30
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatterQualitySettings {
    #[serde(default = "default_iso_bounds")]
    pub isolated_power: MetricBounds,
    #[serde(default = "default_ev_bounds")]
    pub exit_velocity: MetricBounds,
    #[serde(default = "default_hard_hit_bounds")]
    pub hard_hit_rate: MetricBounds,
    #[serde(default)]
    pub weights: QualityWeights,
}

impl BatterQualitySettings {
    /// # Errors
    /// Returns `EngineError::Configuration` for inverted bounds or
    /// weights that do not sum to 1.
    pub fn validate(&self) -> Result<(), EngineError> {
        self.isolated_power.validate("isolated_power")?;
        self.exit_velocity.validate("exit_velocity")?;
        self.hard_hit_rate.validate("hard_hit_rate")?;
        validate_weight_set(
            "batter_quality.weights",
            &[
                ("exit_velocity", self.weights.exit_velocity),
                ("isolated_power", self.weights.isolated_power),
                ("hard_hit_rate", self.weights.hard_hit_rate),
            ],
        )
    }

    /// (label, normalized score, weight, raw value) per metric present.
    fn metrics(&self, batter: &BatterProfile) -> Vec<(&'static str, f64, f64, f64)> {
        [
            (
                "EV",
                batter.exit_velocity,
                self.exit_velocity,
                self.weights.exit_velocity,
            ),
            (
                "ISO",
                batter.isolated_power,
                self.isolated_power,
                self.weights.isolated_power,
            ),
            (
                "hard-hit",
                batter.hard_hit_rate,
                self.hard_hit_rate,
                self.weights.hard_hit_rate,
            ),
        ]
        .into_iter()
        .filter_map(|(name, value, bounds, weight)| {
            value
                .filter(|v| v.is_finite())
                .map(|v| (name, bounds.normalize(v), weight, v))
        })
        .collect()
    }

    /// Score of a league-average batter.
    fn league_score(&self) -> f64 {
        self.weights.exit_velocity * self.exit_velocity.normalize(self.exit_velocity.league_average)
            + self.weights.isolated_power
                * self.isolated_power.normalize(self.isolated_power.league_average)
            + self.weights.hard_hit_rate
                * self.hard_hit_rate.normalize(self.hard_hit_rate.league_average)
    }
}

impl Default for BatterQualitySettings {
    fn default() -> Self {
        Self {
            isolated_power: default_iso_bounds(),
            exit_velocity: default_ev_bounds(),
            hard_hit_rate: default_hard_hit_bounds(),
            weights: QualityWeights::default(),
        }
    }
}

fn default_iso_bounds() -> MetricBounds {
    MetricBounds {
        min: 0.050,
        max: 0.350,
        league_average: 0.165,
    }
}

fn default_ev_bounds() -> MetricBounds {
    MetricBounds {
        min: 82.0,
        max: 95.0,
        league_average: 88.5,
    }
}

fn default_hard_hit_bounds() -> MetricBounds {
    MetricBounds {
        min: 0.20,
        max: 0.55,
        league_average: 0.39,
    }
}

/// Pathway thresholds on the 0-100 component scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathwaySettings {
    #[serde(default = "default_storm_threshold")]
    pub perfect_storm_vulnerability: f64,
    #[serde(default = "default_storm_threshold")]
    pub perfect_storm_batter: f64,
    /// Minimum score for a single side to count as dominant.
    #[serde(default = "default_dominant_score")]
    pub dominant_score: f64,
    /// How far the dominant side must lead the other.
    #[serde(default = "default_dominance_margin")]
    pub dominance_margin: f64,
}

impl PathwaySettings {
    /// # Errors
    /// Returns `EngineError::Configuration` for thresholds outside [0, 100].
    pub fn validate(&self) -> Result<(), EngineError> {
        for (name, v) in [
            ("perfect_storm_vulnerability", self.perfect_storm_vulnerability),
            ("perfect_storm_batter", self.perfect_storm_batter),
            ("dominant_score", self.dominant_score),
            ("dominance_margin", self.dominance_margin),
        ] {
            if !(0.0..=100.0).contains(&v) {
                return Err(EngineError::Configuration(format!(
                    "pathway.{name} must be in [0, 100], got {v}"
                )));
            }
        }
        Ok(())
    }

    /// Perfect storm first, then batter-driven, then pitcher-driven.
    pub fn classify(&self, vulnerability: f64, batter_quality: f64) -> Pathway {
        if vulnerability > self.perfect_storm_vulnerability
            && batter_quality > self.perfect_storm_batter
        {
            Pathway::PerfectStorm
        } else if batter_quality >= self.dominant_score
            && batter_quality - vulnerability >= self.dominance_margin
        {
            Pathway::BatterDriven
        } else if vulnerability >= self.dominant_score
            && vulnerability - batter_quality >= self.dominance_margin
        {
            Pathway::PitcherDriven
        } else {
            Pathway::Standard
        }
    }
}

impl Default for PathwaySettings {
    fn default() -> Self {
        Self {
            perfect_storm_vulnerability: default_storm_threshold(),
            perfect_storm_batter: default_storm_threshold(),
            dominant_score: default_dominant_score(),
            dominance_margin: default_dominance_margin(),
        }
    }
}

fn default_storm_threshold() -> f64 {
    70.0
}

fn default_dominant_score() -> f64 {
    65.0
}

fn default_dominance_margin() -> f64 {
    10.0
}

// ────────────────────────────────────────────
// Inputs
// ────────────────────────────────────────────

/// Everything the predictor may know about one pairing.
///
/// Each reference is optional; the `*_known` flags record whether the
/// event store has ever heard of the player at all.
#[derive(Debug, Clone, Copy)]
pub struct PredictionInputs<'a> {
    pub batter_id: PlayerId,
    pub pitcher_id: PlayerId,
    pub date: NaiveDate,
    pub batter: Option<&'a BatterProfile>,
    pub vulnerability: Option<&'a PitcherVulnerabilityProfile>,
    pub pitcher_stats: Option<&'a PitcherSeasonStats>,
    pub quote: Option<&'a MarketQuote>,
    pub batter_known: bool,
    pub pitcher_known: bool,
}

// ────────────────────────────────────────────
// Predictor
// ────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct EnsemblePredictor {
    settings: EnsembleSettings,
    quality: BatterQualitySettings,
    pathway: PathwaySettings,
    market: MarketEvaluator,
}

/// Component before weights are applied.
struct Raw {
    score: f64,
    variance: f64,
    source: ComponentSource,
    detail: String,
}

impl EnsemblePredictor {
    pub fn new(
        settings: EnsembleSettings,
        quality: BatterQualitySettings,
        pathway: PathwaySettings,
        market: MarketSettings,
    ) -> Self {
        Self {
            settings,
            quality,
            pathway,
            market: MarketEvaluator::new(market),
        }
    }

    pub fn settings(&self) -> &EnsembleSettings {
        &self.settings
    }

    /// Scores one pairing.
    ///
    /// # Errors
    /// `EngineError::NoProfile` only when neither player is known.
    pub fn predict(&self, inputs: &PredictionInputs<'_>) -> Result<PredictionRecord, EngineError> {
        if !inputs.batter_known && !inputs.pitcher_known {
            return Err(EngineError::NoProfile {
                batter_id: inputs.batter_id,
                pitcher_id: inputs.pitcher_id,
            });
        }

        let mut raw: BTreeMap<ComponentKind, Raw> = BTreeMap::new();
        raw.insert(
            ComponentKind::PitcherVulnerability,
            self.pitcher_vulnerability(inputs.vulnerability, inputs.pitcher_stats),
        );
        raw.insert(ComponentKind::BatterQuality, self.batter_quality(inputs.batter));
        raw.insert(
            ComponentKind::RecentForm,
            self.recent_form(inputs.batter, inputs.date),
        );
        raw.insert(
            ComponentKind::HistoricalTrend,
            self.historical_trend(inputs.batter, inputs.date),
        );

        // The market is judged against what the model says without it.
        let weights = &self.settings.weights;
        let (num, den) = raw.iter().fold((0.0, 0.0), |(num, den), (kind, r)| {
            let w = weights.get(*kind);
            (num + w * r.score, den + w)
        });
        let blend = if den > 0.0 { num / den } else { 50.0 };
        let model_probability = self.calibrate(blend);
        let evaluation = self.market.evaluate(inputs.quote, model_probability);
        raw.insert(ComponentKind::Market, self.market_component(&evaluation));

        let components = self.weigh(raw);
        let combined_score = components
            .values()
            .map(|c| c.contribution)
            .sum::<f64>()
            .clamp(0.0, 100.0);
        let total_variance = components
            .values()
            .map(|c| c.effective_weight * c.effective_weight * c.variance)
            .sum::<f64>()
            .max(self.settings.variance_threshold);

        let vulnerability_score = components
            .get(&ComponentKind::PitcherVulnerability)
            .map_or(0.0, |c| c.score);
        let quality_score = components
            .get(&ComponentKind::BatterQuality)
            .map_or(0.0, |c| c.score);
        let pathway = self.pathway.classify(vulnerability_score, quality_score);

        let rationale = rationale(pathway, &components, inputs.vulnerability, &evaluation);

        Ok(PredictionRecord {
            batter_id: inputs.batter_id,
            pitcher_id: inputs.pitcher_id,
            batter_name: inputs.batter.and_then(|b| b.name.clone()),
            pitcher_name: inputs.pitcher_stats.and_then(|p| p.name.clone()),
            date: inputs.date,
            component_scores: components,
            combined_score,
            total_variance,
            confidence_interval: ConfidenceInterval::around(combined_score, total_variance),
            hr_probability: self.calibrate(combined_score),
            pathway,
            market: evaluation,
            rationale,
        })
    }

    /// Calibrated HR probability for a 0-100 score.
    pub fn calibrate(&self, score: f64) -> f64 {
        probability_from_score(
            score,
            self.settings.prior.hr_rate,
            self.settings.calibration_steepness,
        )
    }

    /// Score points per unit of HR rate.
    fn rate_factor(&self) -> f64 {
        100.0 / (self.settings.prior.hr_rate * self.settings.rate_scale)
    }

    /// Maps a Beta posterior over a HR rate to a component.
    fn rate_component(&self, posterior: BetaPosterior, source: ComponentSource, detail: String) -> Raw {
        let factor = self.rate_factor();
        Raw {
            score: (posterior.mean * factor).clamp(0.0, 100.0),
            variance: posterior.variance * factor * factor,
            source,
            detail,
        }
    }

    fn prior_component(&self, score: f64, detail: &str) -> Raw {
        Raw {
            score,
            variance: self.settings.prior_variance,
            source: ComponentSource::Prior,
            detail: detail.to_string(),
        }
    }

    fn pitcher_vulnerability(
        &self,
        profile: Option<&PitcherVulnerabilityProfile>,
        stats: Option<&PitcherSeasonStats>,
    ) -> Raw {
        if let Some(p) = profile {
            let slot = p
                .lineup
                .most_vulnerable_slot
                .map_or_else(|| "none".to_string(), |s| s.to_string());
            return Raw {
                score: p.composite_score,
                variance: proportion_variance(p.composite_score / 100.0, p.total_at_bats),
                source: ComponentSource::Observed,
                detail: format!(
                    "composite {:.1} over {} AB, weakest slot {slot}",
                    p.composite_score, p.total_at_bats
                ),
            };
        }
        match stats.filter(|s| s.batters_faced > 0) {
            Some(s) => {
                let posterior = self.settings.prior.beta().posterior(
                    f64::from(s.home_runs_allowed),
                    f64::from(s.batters_faced),
                );
                self.rate_component(
                    posterior,
                    ComponentSource::Prior,
                    format!(
                        "season prior: {} HR allowed in {} BF",
                        s.home_runs_allowed, s.batters_faced
                    ),
                )
            }
            None => self.prior_component(50.0, "league prior, no pitcher history"),
        }
    }

    fn batter_quality(&self, batter: Option<&BatterProfile>) -> Raw {
        let metrics = batter.map(|b| self.quality.metrics(b)).unwrap_or_default();
        let coverage: f64 = metrics.iter().map(|(_, _, w, _)| w).sum();
        if metrics.is_empty() || coverage <= 0.0 {
            return self.prior_component(self.quality.league_score(), "league-average metrics");
        }

        let score = metrics.iter().map(|(_, s, w, _)| s * w).sum::<f64>() / coverage;
        let coverage = coverage.min(1.0);
        let prior_variance = self.settings.prior_variance;
        let detail = metrics
            .iter()
            .map(|(name, _, _, v)| format!("{name} {v}"))
            .collect::<Vec<_>>()
            .join(", ");
        Raw {
            score,
            variance: prior_variance * (1.0 - coverage) + prior_variance / 9.0 * coverage,
            source: ComponentSource::Observed,
            detail,
        }
    }

    fn recent_form(&self, batter: Option<&BatterProfile>, date: NaiveDate) -> Raw {
        let prior = self.settings.prior.beta();
        let mut games: Vec<_> = batter
            .map(|b| b.recent_games.iter().filter(|g| g.date < date).collect())
            .unwrap_or_default();
        games.sort_by(|a, b| b.date.cmp(&a.date));
        games.truncate(self.settings.recent_games);

        let pa: u32 = games.iter().map(|g| g.plate_appearances).sum();
        let hr: u32 = games.iter().map(|g| g.home_runs).sum();
        let posterior = prior.posterior(f64::from(hr), f64::from(pa));
        let source = if pa > 0 {
            ComponentSource::Observed
        } else {
            ComponentSource::Prior
        };
        self.rate_component(
            posterior,
            source,
            format!("{hr} HR in {pa} PA over {} games", games.len()),
        )
    }

    fn historical_trend(&self, batter: Option<&BatterProfile>, date: NaiveDate) -> Raw {
        let target = date.year();
        let mut seasons: Vec<_> = batter
            .map(|b| {
                b.seasons
                    .iter()
                    .filter(|s| s.season <= target && s.plate_appearances > 0)
                    .collect()
            })
            .unwrap_or_default();
        if seasons.is_empty() {
            return self.prior_component(self.prior_level_score(), "no season history");
        }
        seasons.sort_by(|a, b| b.season.cmp(&a.season));

        let (successes, trials) = seasons.iter().fold((0.0, 0.0), |(s, t), line| {
            let age = u32::try_from(target - line.season).unwrap_or(0);
            let w = decay_weight(age, self.settings.decay_factor);
            (
                s + w * f64::from(line.home_runs),
                t + w * f64::from(line.plate_appearances),
            )
        });
        let posterior = self.settings.prior.beta().posterior(successes, trials);
        let mut component = self.rate_component(posterior, ComponentSource::Observed, String::new());

        let delta = match (
            seasons.first().and_then(|s| s.hr_rate()),
            seasons.get(1).and_then(|s| s.hr_rate()),
        ) {
            (Some(latest), Some(previous)) => latest - previous,
            _ => 0.0,
        };
        let gain = self.settings.trend_gain;
        let adjustment = (gain * delta / self.settings.prior.hr_rate).clamp(-gain, gain);
        component.score = (component.score + adjustment).clamp(0.0, 100.0);
        component.detail = format!(
            "{} seasons, YoY delta {:+.4}, adjustment {adjustment:+.1}",
            seasons.len(),
            delta
        );
        component
    }

    fn prior_level_score(&self) -> f64 {
        (self.settings.prior.hr_rate * self.rate_factor()).clamp(0.0, 100.0)
    }

    fn market_component(&self, evaluation: &MarketEvaluation) -> Raw {
        let variance = self.market.settings().variance;
        if evaluation.quoted {
            Raw {
                score: self.market.component_score(evaluation),
                variance,
                source: ComponentSource::Observed,
                detail: format!(
                    "edge {:+.3} vs implied {:.3}",
                    evaluation.edge,
                    evaluation.implied_probability.unwrap_or_default()
                ),
            }
        } else {
            Raw {
                score: 50.0,
                variance,
                source: ComponentSource::Unavailable,
                detail: "no quote".to_string(),
            }
        }
    }

    /// Applies weights, dropping unavailable components and renormalizing
    /// the rest.
    fn weigh(&self, raw: BTreeMap<ComponentKind, Raw>) -> BTreeMap<ComponentKind, ComponentScore> {
        let weights = &self.settings.weights;
        let active: f64 = raw
            .iter()
            .filter(|(_, r)| r.source != ComponentSource::Unavailable)
            .map(|(k, _)| weights.get(*k))
            .sum();

        raw.into_iter()
            .map(|(kind, r)| {
                let configured_weight = weights.get(kind);
                let effective_weight = if r.source == ComponentSource::Unavailable || active <= 0.0
                {
                    0.0
                } else {
                    configured_weight / active
                };
                (
                    kind,
                    ComponentScore {
                        score: r.score,
                        variance: r.variance,
                        configured_weight,
                        effective_weight,
                        contribution: effective_weight * r.score,
                        source: r.source,
                        detail: r.detail,
                    },
                )
            })
            .collect()
    }
}

/// Short explanation built from the two largest contributions.
fn rationale(
    pathway: Pathway,
    components: &BTreeMap<ComponentKind, ComponentScore>,
    vulnerability: Option<&PitcherVulnerabilityProfile>,
    market: &MarketEvaluation,
) -> String {
    let mut ranked: Vec<(&ComponentKind, &ComponentScore)> = components
        .iter()
        .filter(|(_, c)| c.effective_weight > 0.0)
        .collect();
    ranked.sort_by(|a, b| b.1.contribution.total_cmp(&a.1.contribution));

    let mut parts: Vec<String> = ranked
        .iter()
        .take(2)
        .map(|(kind, c)| {
            let prior = if c.source == ComponentSource::Prior {
                " (prior)"
            } else {
                ""
            };
            format!("{kind} {:.0}{prior}", c.score)
        })
        .collect();

    if let Some(p) = vulnerability {
        if let Some(slot) = p.lineup.most_vulnerable_slot {
            parts.push(format!("pitcher weakest vs slot {slot}"));
        }
        if p.inning.fatigue_detected {
            parts.push("fatigue late".to_string());
        }
    }
    if market.quoted {
        parts.push(format!("market {} ({:+.3})", market.assessment, market.edge));
    }

    format!("{pathway}: {}", parts.join("; "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::{GameLine, Odds, SeasonLine};
    use crate::domain::prediction::MarketAssessment;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 7, 1).unwrap()
    }

    fn inputs<'a>(batter: Option<&'a BatterProfile>) -> PredictionInputs<'a> {
        PredictionInputs {
            batter_id: 7,
            pitcher_id: 9,
            date: date(),
            batter,
            vulnerability: None,
            pitcher_stats: None,
            quote: None,
            batter_known: batter.is_some(),
            pitcher_known: false,
        }
    }

    fn slugger() -> BatterProfile {
        BatterProfile {
            batter_id: 7,
            name: Some("Slugger".into()),
            isolated_power: Some(0.320),
            exit_velocity: Some(94.0),
            hard_hit_rate: Some(0.52),
            recent_games: (1..=15)
                .map(|d| GameLine {
                    date: NaiveDate::from_ymd_opt(2025, 6, d).unwrap(),
                    plate_appearances: 4,
                    home_runs: u32::from(d % 3 == 0),
                })
                .collect(),
            seasons: vec![
                SeasonLine {
                    season: 2024,
                    plate_appearances: 600,
                    home_runs: 30,
                },
                SeasonLine {
                    season: 2023,
                    plate_appearances: 550,
                    home_runs: 22,
                },
            ],
        }
    }

    #[test]
    fn test_no_profile_when_both_unknown() {
        let err = EnsemblePredictor::default().predict(&inputs(None)).unwrap_err();
        assert_eq!(
            err,
            EngineError::NoProfile {
                batter_id: 7,
                pitcher_id: 9
            }
        );
    }

    #[test]
    fn test_combined_score_is_traceable() {
        let batter = slugger();
        let record = EnsemblePredictor::default().predict(&inputs(Some(&batter))).unwrap();
        assert!((record.combined_score - record.contribution_sum()).abs() < 1e-9);
        let weights: f64 = record
            .component_scores
            .values()
            .map(|c| c.effective_weight)
            .sum();
        assert!((weights - 1.0).abs() < 1e-9);
        assert_eq!(record.component_scores.len(), 5);
    }

    #[test]
    fn test_missing_quote_zero_weight() {
        let batter = slugger();
        let record = EnsemblePredictor::default().predict(&inputs(Some(&batter))).unwrap();
        let market = record.component(ComponentKind::Market).unwrap();
        assert_eq!(market.source, ComponentSource::Unavailable);
        assert_eq!(market.effective_weight, 0.0);
        assert_eq!(record.market_assessment(), MarketAssessment::Neutral);
        let bq = record.component(ComponentKind::BatterQuality).unwrap();
        assert!((bq.effective_weight - 0.25 / 0.90).abs() < 1e-12);
    }

    #[test]
    fn test_quoted_market_contributes() {
        let batter = slugger();
        let quote = MarketQuote {
            batter_id: 7,
            date: date(),
            current: Odds::American(400),
            opening: None,
        };
        let mut i = inputs(Some(&batter));
        i.quote = Some(&quote);
        let record = EnsemblePredictor::default().predict(&i).unwrap();
        let market = record.component(ComponentKind::Market).unwrap();
        assert_eq!(market.source, ComponentSource::Observed);
        assert!((market.effective_weight - 0.10).abs() < 1e-12);
        assert!(record.market.quoted);
        assert!(record.rationale.contains("market"));
    }

    #[test]
    fn test_sparse_inputs_use_priors_not_flat_default() {
        let batter = BatterProfile {
            batter_id: 7,
            ..BatterProfile::default()
        };
        let record = EnsemblePredictor::default().predict(&inputs(Some(&batter))).unwrap();
        let pv = record.component(ComponentKind::PitcherVulnerability).unwrap();
        assert_eq!(pv.source, ComponentSource::Prior);
        assert!((pv.variance - 225.0).abs() < 1e-12);
        assert!(record.total_variance >= 5.0);
        assert!(record.confidence_interval.width() > 0.0);
        let form = record.component(ComponentKind::RecentForm).unwrap();
        assert_eq!(form.source, ComponentSource::Prior);
        // Prior mean maps to the middle of the scale.
        assert!((form.score - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_variance_floor() {
        let settings = EnsembleSettings {
            variance_threshold: 1_000.0,
            ..EnsembleSettings::default()
        };
        let predictor = EnsemblePredictor::new(
            settings,
            BatterQualitySettings::default(),
            PathwaySettings::default(),
            MarketSettings::default(),
        );
        let batter = slugger();
        let record = predictor.predict(&inputs(Some(&batter))).unwrap();
        assert!((record.total_variance - 1_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_recent_form_ignores_target_day_and_older_games() {
        let mut batter = slugger();
        batter.recent_games.push(GameLine {
            date: date(),
            plate_appearances: 5,
            home_runs: 5,
        });
        let p = EnsemblePredictor::default();
        let raw = p.recent_form(Some(&batter), date());
        // 12 most recent games of June: 4..=15, four with a HR.
        assert!(raw.detail.starts_with("4 HR in 48 PA over 12 games"));
        assert_eq!(raw.source, ComponentSource::Observed);
    }

    #[test]
    fn test_trend_adjustment_sign() {
        let p = EnsemblePredictor::default();
        let rising = p.historical_trend(Some(&slugger()), date());
        let mut falling_batter = slugger();
        falling_batter.seasons[0].home_runs = 10;
        let falling = p.historical_trend(Some(&falling_batter), date());
        assert!(rising.score > falling.score);
        assert_eq!(p.historical_trend(None, date()).source, ComponentSource::Prior);
    }

    #[test]
    fn test_batter_quality_renormalizes_partial_metrics() {
        let p = EnsemblePredictor::default();
        let batter = BatterProfile {
            batter_id: 7,
            isolated_power: Some(0.350),
            ..BatterProfile::default()
        };
        let raw = p.batter_quality(Some(&batter));
        assert!((raw.score - 100.0).abs() < 1e-9);
        // 0.35 coverage: 225*0.65 + 25*0.35
        assert!((raw.variance - (146.25 + 8.75)).abs() < 1e-9);
    }

    #[test]
    fn test_pathways() {
        let p = PathwaySettings::default();
        assert_eq!(p.classify(75.0, 80.0), Pathway::PerfectStorm);
        assert_eq!(p.classify(50.0, 80.0), Pathway::BatterDriven);
        assert_eq!(p.classify(80.0, 50.0), Pathway::PitcherDriven);
        assert_eq!(p.classify(66.0, 60.0), Pathway::Standard);
        assert_eq!(p.classify(70.0, 90.0), Pathway::BatterDriven);
    }

    #[test]
    fn test_settings_validation() {
        let mut s = EnsembleSettings::default();
        assert!(s.validate().is_ok());
        s.weights.market = 0.2;
        assert!(s.validate().is_err());
        s.weights.market = 0.1;
        s.decay_factor = 0.0;
        assert!(s.validate().is_err());
        assert!(BatterQualitySettings::default().validate().is_ok());
        assert!(PathwaySettings::default().validate().is_ok());
    }

    #[test]
    fn test_settings_reject_nan() {
        let mut s = EnsembleSettings::default();
        s.variance_threshold = f64::NAN;
        assert!(s.validate().is_err());
        s.variance_threshold = f64::INFINITY;
        assert!(s.validate().is_err());

        let mut s = EnsembleSettings::default();
        s.rate_scale = f64::NAN;
        assert!(s.validate().is_err());

        let mut s = EnsembleSettings::default();
        s.trend_gain = f64::NAN;
        assert!(s.validate().is_err());

        let mut q = BatterQualitySettings::default();
        q.isolated_power.max = f64::NAN;
        assert!(q.validate().is_err());
        let mut q = BatterQualitySettings::default();
        q.exit_velocity.min = f64::NAN;
        assert!(q.validate().is_err());
        let mut q = BatterQualitySettings::default();
        q.weights.hard_hit_rate = f64::NAN;
        assert!(q.validate().is_err());

        let mut p = PathwaySettings::default();
        p.dominance_margin = f64::NAN;
        assert!(p.validate().is_err());
    }
}
