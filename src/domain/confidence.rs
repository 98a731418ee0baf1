//! Confidence and Bayesian calibration helpers.
//!
//! Shared by the vulnerability analyzer and the ensemble predictor:
//! sample-size confidence multipliers, Beta-Binomial updating against a
//! league prior, exponential time decay, and the score-to-probability
//! calibration curve.

use serde::{Deserialize, Serialize};

use super::error::EngineError;

/// One step of the confidence schedule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceStep {
    /// Smallest sample size this multiplier applies to.
    pub min_sample: u32,
    /// Multiplier in (0, 1].
    pub multiplier: f64,
}

/// Monotone step function from sample size to a confidence multiplier.
///
/// Small samples are penalized rather than rejected, so a pitcher with
/// four at-bats against slot 2 still shows up, just scaled down.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfidenceSchedule {
    steps: Vec<ConfidenceStep>,
}

impl ConfidenceSchedule {
    /// Builds a schedule after validating it.
    ///
    /// # Errors
    /// See [`ConfidenceSchedule::validate`].
    pub fn new(steps: Vec<ConfidenceStep>) -> Result<Self, EngineError> {
        let schedule = Self { steps };
        schedule.validate()?;
        Ok(schedule)
    }

    /// Checks the schedule starts at zero, thresholds strictly increase and
    /// multipliers never decrease.
    ///
    /// # Errors
    /// Returns `EngineError::Configuration` describing the first violation.
    pub fn validate(&self) -> Result<(), EngineError> {
        let first = self.steps.first().ok_or_else(|| {
            EngineError::Configuration("confidence schedule must not be empty".into())
        })?;
        if first.min_sample != 0 {
            return Err(EngineError::Configuration(format!(
                "confidence schedule must start at sample 0, starts at {}",
                first.min_sample
            )));
        }
        for step in &self.steps {
            if !(step.multiplier > 0.0 && step.multiplier <= 1.0) {
                return Err(EngineError::Configuration(format!(
                    "confidence multiplier must be in (0, 1], got {}",
                    step.multiplier
                )));
            }
        }
        for pair in self.steps.windows(2) {
            if pair[1].min_sample <= pair[0].min_sample {
                return Err(EngineError::Configuration(format!(
                    "confidence thresholds must strictly increase ({} then {})",
                    pair[0].min_sample, pair[1].min_sample
                )));
            }
            if pair[1].multiplier < pair[0].multiplier {
                return Err(EngineError::Configuration(format!(
                    "confidence multipliers must not decrease ({} then {})",
                    pair[0].multiplier, pair[1].multiplier
                )));
            }
        }
        Ok(())
    }

    /// Multiplier for the largest threshold not above `sample_size`.
    pub fn multiplier(&self, sample_size: u32) -> f64 {
        self.steps
            .iter()
            .rev()
            .find(|s| s.min_sample <= sample_size)
            .map_or(0.0, |s| s.multiplier)
    }

    pub fn steps(&self) -> &[ConfidenceStep] {
        &self.steps
    }
}

impl Default for ConfidenceSchedule {
    /// 0.6x below 10 samples, 1.0x from 50 up.
    fn default() -> Self {
        let step = |min_sample, multiplier| ConfidenceStep {
            min_sample,
            multiplier,
        };
        Self {
            steps: vec![
                step(0, 0.6),
                step(10, 0.7),
                step(20, 0.8),
                step(30, 0.9),
                step(50, 1.0),
            ],
        }
    }
}

/// League prior for a per-plate-appearance rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriorSettings {
    /// League-average home-run rate per plate appearance.
    #[serde(default = "default_hr_rate")]
    pub hr_rate: f64,
    /// Pseudo plate appearances the prior is worth.
    #[serde(default = "default_strength")]
    pub strength: f64,
}

impl PriorSettings {
    /// # Errors
    /// Returns `EngineError::Configuration` when the rate is outside (0, 1)
    /// or the strength is not positive.
    pub fn validate(&self) -> Result<(), EngineError> {
        if !(self.hr_rate > 0.0 && self.hr_rate < 1.0) {
            return Err(EngineError::Configuration(format!(
                "prior hr_rate must be in (0, 1), got {}",
                self.hr_rate
            )));
        }
        if self.strength <= 0.0 || !self.strength.is_finite() {
            return Err(EngineError::Configuration(format!(
                "prior strength must be positive, got {}",
                self.strength
            )));
        }
        Ok(())
    }

    pub fn beta(&self) -> BetaPrior {
        BetaPrior::from_rate(self.hr_rate, self.strength)
    }
}

impl Default for PriorSettings {
    fn default() -> Self {
        Self {
            hr_rate: default_hr_rate(),
            strength: default_strength(),
        }
    }
}

fn default_hr_rate() -> f64 {
    0.035
}

fn default_strength() -> f64 {
    1000.0
}

/// Conjugate Beta prior for Bernoulli trials.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BetaPrior {
    pub alpha: f64,
    pub beta: f64,
}

/// Posterior summary after observing trials.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BetaPosterior {
    pub mean: f64,
    pub variance: f64,
    /// Observed trials folded in (may be fractional when decay-weighted).
    pub observed_trials: f64,
}

impl BetaPrior {
    /// Prior with mean `rate` worth `strength` pseudo-trials.
    pub fn from_rate(rate: f64, strength: f64) -> Self {
        Self {
            alpha: rate * strength,
            beta: (1.0 - rate) * strength,
        }
    }

    /// Updates with `successes` out of `trials`.
    ///
    /// Inputs are clamped so that successes never exceed trials and
    /// neither goes negative; the result is always a proper posterior.
    pub fn posterior(&self, successes: f64, trials: f64) -> BetaPosterior {
        let trials = trials.max(0.0);
        let successes = successes.clamp(0.0, trials);
        let a = self.alpha + successes;
        let b = self.beta + (trials - successes);
        let total = a + b;
        BetaPosterior {
            mean: a / total,
            variance: (a * b) / (total * total * (total + 1.0)),
            observed_trials: trials,
        }
    }

    pub fn mean(&self) -> f64 {
        self.alpha / (self.alpha + self.beta)
    }
}

/// Exponential decay weight for something `age` periods old.
pub fn decay_weight(age: u32, factor: f64) -> f64 {
    factor.powi(i32::try_from(age).unwrap_or(i32::MAX))
}

/// Variance of an observed proportion `p` from `n` trials, on a 0-100
/// score scale.
pub fn proportion_variance(p: f64, n: u32) -> f64 {
    let p = p.clamp(0.0, 1.0);
    p * (1.0 - p) * 10_000.0 / (f64::from(n) + 1.0)
}

/// Sample-weighted mean confidence over `(sample_size, confidence)` pairs.
///
/// Returns 0 when the total sample is empty.
pub fn weighted_confidence<I>(buckets: I) -> f64
where
    I: IntoIterator<Item = (u32, f64)>,
{
    let (total, weighted) = buckets
        .into_iter()
        .fold((0.0, 0.0), |(total, weighted), (n, c)| {
            let n = f64::from(n);
            (total + n, weighted + n * c)
        });
    if total > 0.0 { weighted / total } else { 0.0 }
}

/// Maps a 0-100 score to a home-run probability.
///
/// Logistic curve anchored so a score of 50 lands on the league rate;
/// `steepness` is the log-odds shift between a score of 50 and 100.
pub fn probability_from_score(score: f64, base_rate: f64, steepness: f64) -> f64 {
    let base = base_rate.clamp(1e-6, 1.0 - 1e-6);
    let logit = (base / (1.0 - base)).ln() + steepness * (score.clamp(0.0, 100.0) - 50.0) / 50.0;
    1.0 / (1.0 + (-logit).exp())
}
