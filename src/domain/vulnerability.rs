//! Pitcher vulnerability analyzer.
//!
//! Mines a pitcher's historical at-bats for situational weak spots:
//! lineup slots, innings (with a fatigue check) and pitch-sequence
//! predictability. Each facet yields a peak score and a confidence; the
//! composite is their confidence-weighted blend.
//!
//! Small samples are never rejected. They are scored, scaled down by the
//! confidence schedule, and flagged so that the peak selection prefers
//! buckets with enough data behind them.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::confidence::{weighted_confidence, ConfidenceSchedule};
use super::error::EngineError;
use super::event::{AtBatEvent, DateWindow, Outcome, PlayerId, LINEUP_SLOTS};
use super::sequence::{analyze_sequences, SequenceFacet, SequenceSettings};

const WEIGHT_TOLERANCE: f64 = 1e-6;

// ────────────────────────────────────────────
// Settings
// ────────────────────────────────────────────

/// Relative weight of each facet in the composite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FacetWeights {
    #[serde(default = "default_lineup_weight")]
    pub lineup: f64,
    #[serde(default = "default_inning_weight")]
    pub inning: f64,
    #[serde(default = "default_sequence_weight")]
    pub sequence: f64,
}

impl FacetWeights {
    /// # Errors
    /// Returns `EngineError::Configuration` unless every weight is in
    /// [0, 1] and they sum to 1.
    pub fn validate(&self) -> Result<(), EngineError> {
        let weights = [
            ("lineup", self.lineup),
            ("inning", self.inning),
            ("sequence", self.sequence),
        ];
        validate_weight_set("vulnerability.facet_weights", &weights)
    }

    pub const fn get(&self, facet: Facet) -> f64 {
        match facet {
            Facet::Lineup => self.lineup,
            Facet::Inning => self.inning,
            Facet::Sequence => self.sequence,
        }
    }
}

impl Default for FacetWeights {
    fn default() -> Self {
        Self {
            lineup: default_lineup_weight(),
            inning: default_inning_weight(),
            sequence: default_sequence_weight(),
        }
    }
}

fn default_lineup_weight() -> f64 {
    0.40
}

fn default_inning_weight() -> f64 {
    0.35
}

fn default_sequence_weight() -> f64 {
    0.25
}

/// Shared check for a named set of weights that must sum to one.
///
/// # Errors
/// Returns `EngineError::Configuration` naming the offending weight.
pub fn validate_weight_set(section: &str, weights: &[(&str, f64)]) -> Result<(), EngineError> {
    for (name, w) in weights {
        if !(0.0..=1.0).contains(w) {
            return Err(EngineError::Configuration(format!(
                "{section}.{name} must be in [0, 1], got {w}"
            )));
        }
    }
    let sum: f64 = weights.iter().map(|(_, w)| w).sum();
    if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
        return Err(EngineError::Configuration(format!(
            "{section} must sum to 1.0, got {sum:.6}"
        )));
    }
    Ok(())
}

/// Analyzer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VulnerabilitySettings {
    /// Buckets with fewer at-bats are flagged low-confidence.
    #[serde(default = "default_min_sample_floor")]
    pub min_sample_floor: u32,
    #[serde(default)]
    pub facet_weights: FacetWeights,
    #[serde(default)]
    pub confidence_steps: ConfidenceSchedule,
    #[serde(flatten)]
    pub sequence: SequenceSettings,
}

impl VulnerabilitySettings {
    /// # Errors
    /// Returns the first `EngineError::Configuration` found.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.min_sample_floor == 0 {
            return Err(EngineError::Configuration(
                "vulnerability.min_sample_floor must be >= 1".to_string(),
            ));
        }
        self.facet_weights.validate()?;
        self.confidence_steps.validate()?;
        self.sequence.validate()
    }
}

impl Default for VulnerabilitySettings {
    fn default() -> Self {
        Self {
            min_sample_floor: default_min_sample_floor(),
            facet_weights: FacetWeights::default(),
            confidence_steps: ConfidenceSchedule::default(),
            sequence: SequenceSettings::default(),
        }
    }
}

fn default_min_sample_floor() -> u32 {
    3
}

// ────────────────────────────────────────────
// Profile types
// ────────────────────────────────────────────

/// Sample-size flag for a lineup slot or inning bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleFlag {
    Empty,
    LowConfidence,
    Reliable,
}

/// Facet of the vulnerability composite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Facet {
    Lineup,
    Inning,
    Sequence,
}

impl std::fmt::Display for Facet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lineup => f.write_str("lineup"),
            Self::Inning => f.write_str("inning"),
            Self::Sequence => f.write_str("sequence"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotVulnerability {
    pub slot: u8,
    pub sample_size: u32,
    pub favorable: u32,
    pub success_rate: f64,
    pub vulnerability_score: f64,
    pub confidence: f64,
    pub flag: SampleFlag,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InningVulnerability {
    pub inning: u8,
    pub sample_size: u32,
    pub favorable: u32,
    pub home_runs: u32,
    pub success_rate: f64,
    /// Home runs per at-bat.
    pub hr_frequency: f64,
    pub vulnerability_score: f64,
    pub confidence: f64,
    /// Success rate minus that of the earliest observed inning.
    pub fatigue_indicator: f64,
    pub flag: SampleFlag,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineupFacet {
    /// One entry per slot 1..=9, empty slots included.
    pub slots: Vec<SlotVulnerability>,
    pub most_vulnerable_slot: Option<u8>,
    pub peak_score: f64,
    pub confidence: f64,
    /// True when no slot reached the sample floor.
    pub low_confidence: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InningFacet {
    /// One entry per inning 1..=last observed inning.
    pub innings: Vec<InningVulnerability>,
    pub most_vulnerable_inning: Option<u8>,
    pub peak_score: f64,
    pub confidence: f64,
    pub low_confidence: bool,
    pub fatigue_detected: bool,
}

/// How one facet fed the composite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacetContribution {
    pub facet: Facet,
    /// Configured weight.
    pub weight: f64,
    /// Weight after renormalizing over facets with data.
    pub effective_weight: f64,
    pub peak_score: f64,
    pub confidence: f64,
    /// `effective_weight * peak_score * confidence`.
    pub contribution: f64,
    pub has_data: bool,
}

/// Derived, per-run view of how exploitable a pitcher is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PitcherVulnerabilityProfile {
    pub pitcher_id: PlayerId,
    pub window: DateWindow,
    pub total_at_bats: u32,
    pub favorable: u32,
    pub home_runs: u32,
    pub lineup: LineupFacet,
    pub inning: InningFacet,
    pub sequence: SequenceFacet,
    /// 0-100.
    pub composite_score: f64,
    /// Effective-weighted mean of facet confidences.
    pub composite_confidence: f64,
    pub contributions: Vec<FacetContribution>,
}

impl PitcherVulnerabilityProfile {
    pub fn slot(&self, slot: u8) -> Option<&SlotVulnerability> {
        self.lineup.slots.iter().find(|s| s.slot == slot)
    }

    pub fn inning(&self, inning: u8) -> Option<&InningVulnerability> {
        self.inning.innings.iter().find(|i| i.inning == inning)
    }

    /// The facet contributing the most to the composite.
    pub fn dominant_facet(&self) -> Option<Facet> {
        self.contributions
            .iter()
            .filter(|c| c.has_data)
            .max_by(|a, b| {
                a.contribution
                    .total_cmp(&b.contribution)
                    .then_with(|| b.facet.cmp(&a.facet))
            })
            .map(|c| c.facet)
    }
}

// ────────────────────────────────────────────
// Bucketing
// ────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    at_bats: u32,
    favorable: u32,
    home_runs: u32,
}

impl Tally {
    fn record(&mut self, outcome: Outcome) {
        self.at_bats += 1;
        if outcome.is_favorable() {
            self.favorable += 1;
        }
        if outcome.is_home_run() {
            self.home_runs += 1;
        }
    }

    fn rate(&self, hits: u32) -> f64 {
        if self.at_bats == 0 {
            0.0
        } else {
            f64::from(hits) / f64::from(self.at_bats)
        }
    }
}

trait Bucket {
    fn number(&self) -> u8;
    fn score(&self) -> f64;
    fn sample(&self) -> u32;
    fn flag(&self) -> SampleFlag;
}

impl Bucket for SlotVulnerability {
    fn number(&self) -> u8 {
        self.slot
    }
    fn score(&self) -> f64 {
        self.vulnerability_score
    }
    fn sample(&self) -> u32 {
        self.sample_size
    }
    fn flag(&self) -> SampleFlag {
        self.flag
    }
}

impl Bucket for InningVulnerability {
    fn number(&self) -> u8 {
        self.inning
    }
    fn score(&self) -> f64 {
        self.vulnerability_score
    }
    fn sample(&self) -> u32 {
        self.sample_size
    }
    fn flag(&self) -> SampleFlag {
        self.flag
    }
}

/// Highest score first, then larger sample, then lower number.
fn peak_order<B: Bucket>(a: &B, b: &B) -> Ordering {
    b.score()
        .total_cmp(&a.score())
        .then_with(|| b.sample().cmp(&a.sample()))
        .then_with(|| a.number().cmp(&b.number()))
}

/// Picks the peak bucket. The flag is true when no bucket reached the
/// sample floor and the peak came from the low-confidence pool.
fn select_peak<B: Bucket>(buckets: &[B]) -> (Option<&B>, bool) {
    let reliable = buckets
        .iter()
        .filter(|b| b.flag() == SampleFlag::Reliable)
        .min_by(|a, b| peak_order(*a, *b));
    if reliable.is_some() {
        return (reliable, false);
    }
    let fallback = buckets
        .iter()
        .filter(|b| b.flag() != SampleFlag::Empty)
        .min_by(|a, b| peak_order(*a, *b));
    (fallback, fallback.is_some())
}

// ────────────────────────────────────────────
// Analyzer
// ────────────────────────────────────────────

/// Builds [`PitcherVulnerabilityProfile`]s. Pure and deterministic.
#[derive(Debug, Clone, Default)]
pub struct VulnerabilityAnalyzer {
    settings: VulnerabilitySettings,
}

impl VulnerabilityAnalyzer {
    pub fn new(settings: VulnerabilitySettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &VulnerabilitySettings {
        &self.settings
    }

    /// Profiles `pitcher_id` over the events that fall in `window`.
    ///
    /// Events for other pitchers or dates are ignored, so the caller can
    /// pass a whole snapshot.
    ///
    /// # Errors
    /// `EngineError::InsufficientData` when no event matches.
    pub fn analyze<'a, I>(
        &self,
        pitcher_id: PlayerId,
        window: DateWindow,
        events: I,
    ) -> Result<PitcherVulnerabilityProfile, EngineError>
    where
        I: IntoIterator<Item = &'a AtBatEvent>,
    {
        let events: Vec<&AtBatEvent> = events
            .into_iter()
            .filter(|e| e.pitcher_id == pitcher_id && window.contains(e.date))
            .collect();
        if events.is_empty() {
            return Err(EngineError::InsufficientData { pitcher_id, window });
        }

        let mut total = Tally::default();
        let mut slot_tallies = [Tally::default(); LINEUP_SLOTS as usize];
        let max_inning = events.iter().map(|e| e.inning).max().unwrap_or(1).max(1);
        let mut inning_tallies = vec![Tally::default(); usize::from(max_inning)];

        for event in &events {
            total.record(event.outcome);
            if let Some(t) = usize::from(event.lineup_slot)
                .checked_sub(1)
                .and_then(|i| slot_tallies.get_mut(i))
            {
                t.record(event.outcome);
            }
            if let Some(t) = usize::from(event.inning)
                .checked_sub(1)
                .and_then(|i| inning_tallies.get_mut(i))
            {
                t.record(event.outcome);
            }
        }

        let lineup = self.lineup_facet(&slot_tallies);
        let inning = self.inning_facet(&inning_tallies);
        let sequence = analyze_sequences(
            events.iter().copied(),
            &self.settings.sequence,
            &self.settings.confidence_steps,
        );
        let contributions = self.contributions(&lineup, &inning, &sequence);
        let composite_score = contributions
            .iter()
            .map(|c| c.contribution)
            .sum::<f64>()
            .clamp(0.0, 100.0);
        let composite_confidence = contributions
            .iter()
            .map(|c| c.effective_weight * c.confidence)
            .sum::<f64>();

        Ok(PitcherVulnerabilityProfile {
            pitcher_id,
            window,
            total_at_bats: total.at_bats,
            favorable: total.favorable,
            home_runs: total.home_runs,
            lineup,
            inning,
            sequence,
            composite_score,
            composite_confidence,
            contributions,
        })
    }

    fn flag(&self, sample: u32) -> SampleFlag {
        if sample == 0 {
            SampleFlag::Empty
        } else if sample < self.settings.min_sample_floor {
            SampleFlag::LowConfidence
        } else {
            SampleFlag::Reliable
        }
    }

    /// (success_rate, score, confidence) for a bucket.
    fn score(&self, tally: &Tally) -> (f64, f64, f64) {
        if tally.at_bats == 0 {
            return (0.0, 0.0, 0.0);
        }
        let rate = tally.rate(tally.favorable);
        let confidence = self.settings.confidence_steps.multiplier(tally.at_bats);
        (rate, rate * 100.0 * confidence, confidence)
    }

    fn lineup_facet(&self, tallies: &[Tally]) -> LineupFacet {
        let slots: Vec<SlotVulnerability> = (1..=LINEUP_SLOTS)
            .zip(tallies)
            .map(|(slot, t)| {
                let (success_rate, vulnerability_score, confidence) = self.score(t);
                SlotVulnerability {
                    slot,
                    sample_size: t.at_bats,
                    favorable: t.favorable,
                    success_rate,
                    vulnerability_score,
                    confidence,
                    flag: self.flag(t.at_bats),
                }
            })
            .collect();

        let (peak, low_confidence) = select_peak(&slots);
        let most_vulnerable_slot = peak.map(|s| s.slot);
        let peak_score = peak.map_or(0.0, |s| s.vulnerability_score);
        let confidence = weighted_confidence(slots.iter().map(|s| (s.sample_size, s.confidence)));

        LineupFacet {
            slots,
            most_vulnerable_slot,
            peak_score,
            confidence,
            low_confidence,
        }
    }

    fn inning_facet(&self, tallies: &[Tally]) -> InningFacet {
        let baseline = tallies
            .iter()
            .find(|t| t.at_bats > 0)
            .map_or(0.0, |t| t.rate(t.favorable));

        let innings: Vec<InningVulnerability> = tallies
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let (success_rate, vulnerability_score, confidence) = self.score(t);
                InningVulnerability {
                    inning: u8::try_from(i + 1).unwrap_or(u8::MAX),
                    sample_size: t.at_bats,
                    favorable: t.favorable,
                    home_runs: t.home_runs,
                    success_rate,
                    hr_frequency: t.rate(t.home_runs),
                    vulnerability_score,
                    confidence,
                    fatigue_indicator: if t.at_bats > 0 {
                        success_rate - baseline
                    } else {
                        0.0
                    },
                    flag: self.flag(t.at_bats),
                }
            })
            .collect();

        let (peak, low_confidence) = select_peak(&innings);
        let most_vulnerable_inning = peak.map(|i| i.inning);
        let peak_score = peak.map_or(0.0, |i| i.vulnerability_score);
        let confidence =
            weighted_confidence(innings.iter().map(|i| (i.sample_size, i.confidence)));
        let fatigue_detected = detect_fatigue(&innings);

        InningFacet {
            innings,
            most_vulnerable_inning,
            peak_score,
            confidence,
            low_confidence,
            fatigue_detected,
        }
    }

    fn contributions(
        &self,
        lineup: &LineupFacet,
        inning: &InningFacet,
        sequence: &SequenceFacet,
    ) -> Vec<FacetContribution> {
        let weights = &self.settings.facet_weights;
        let lineup_has_data = lineup.slots.iter().any(|s| s.sample_size > 0);
        let inning_has_data = inning.innings.iter().any(|i| i.sample_size > 0);
        let facets = [
            (Facet::Lineup, lineup.peak_score, lineup.confidence, lineup_has_data),
            (Facet::Inning, inning.peak_score, inning.confidence, inning_has_data),
            (
                Facet::Sequence,
                sequence.predictability_score,
                sequence.confidence,
                sequence.has_data,
            ),
        ];

        let active_weight: f64 = facets
            .iter()
            .filter(|(_, _, _, has_data)| *has_data)
            .map(|(facet, ..)| weights.get(*facet))
            .sum();

        facets
            .into_iter()
            .map(|(facet, peak_score, confidence, has_data)| {
                let weight = weights.get(facet);
                let effective_weight = if has_data && active_weight > 0.0 {
                    weight / active_weight
                } else {
                    0.0
                };
                FacetContribution {
                    facet,
                    weight,
                    effective_weight,
                    peak_score,
                    confidence,
                    contribution: effective_weight * peak_score * confidence,
                    has_data,
                }
            })
            .collect()
    }
}

/// Rising success rate across the reliable innings, ending above where it
/// started.
fn detect_fatigue(innings: &[InningVulnerability]) -> bool {
    let rates: Vec<f64> = innings
        .iter()
        .filter(|i| i.flag == SampleFlag::Reliable)
        .map(|i| i.success_rate)
        .collect();
    match (rates.first(), rates.last()) {
        (Some(first), Some(last)) if rates.len() >= 2 => {
            rates.windows(2).all(|w| w[1] >= w[0]) && last > first
        }
        _ => false,
    }
}
