//! Pitch-sequence predictability facet.
//!
//! Counts consecutive pitch-type n-grams across a pitcher's at-bats and
//! scores how well the last pitch of each n-gram follows from the ones
//! before it and the count it was thrown in. A pitcher who keeps going
//! fastball-fastball-slider scores high; one who mixes evenly scores
//! near zero. Count states are also summarized as the dominant pitch
//! type thrown in each balls-strikes count.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::confidence::ConfidenceSchedule;
use super::error::EngineError;
use super::event::{AtBatEvent, Pitch};

/// Tunables for the sequence facet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceSettings {
    /// Shortest n-gram counted.
    #[serde(default = "default_ngram_min")]
    pub ngram_min: usize,
    /// Longest n-gram counted.
    #[serde(default = "default_ngram_max")]
    pub ngram_max: usize,
    /// How many top sequences to keep in the profile.
    #[serde(default = "default_top_sequences")]
    pub top_sequences: usize,
    /// Dominant-pitch share at which a count is called predictable.
    #[serde(default = "default_predictable_share")]
    pub predictable_count_share: f64,
    /// Minimum pitches thrown in a count before it is judged.
    #[serde(default = "default_min_count_pitches")]
    pub min_count_pitches: u32,
}

impl SequenceSettings {
    /// # Errors
    /// Returns `EngineError::Configuration` for an empty or inverted
    /// n-gram range or a share outside (0, 1].
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.ngram_min < 2 {
            return Err(EngineError::Configuration(format!(
                "ngram_min must be >= 2, got {}",
                self.ngram_min
            )));
        }
        if self.ngram_max < self.ngram_min {
            return Err(EngineError::Configuration(format!(
                "ngram_max ({}) must be >= ngram_min ({})",
                self.ngram_max, self.ngram_min
            )));
        }
        if !(self.predictable_count_share > 0.0 && self.predictable_count_share <= 1.0) {
            return Err(EngineError::Configuration(format!(
                "predictable_count_share must be in (0, 1], got {}",
                self.predictable_count_share
            )));
        }
        Ok(())
    }
}

impl Default for SequenceSettings {
    fn default() -> Self {
        Self {
            ngram_min: default_ngram_min(),
            ngram_max: default_ngram_max(),
            top_sequences: default_top_sequences(),
            predictable_count_share: default_predictable_share(),
            min_count_pitches: default_min_count_pitches(),
        }
    }
}

fn default_ngram_min() -> usize {
    2
}

fn default_ngram_max() -> usize {
    3
}

fn default_top_sequences() -> usize {
    5
}

fn default_predictable_share() -> f64 {
    0.70
}

fn default_min_count_pitches() -> u32 {
    5
}

/// A pitch-type n-gram and how often it occurred.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceFrequency {
    pub sequence: Vec<String>,
    pub count: u32,
    /// Share of all counted n-grams.
    pub frequency: f64,
}

/// Dominant pitch type in one count state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountTendency {
    /// Count label, "balls-strikes".
    pub count: String,
    pub pitch_type: String,
    /// Pitches thrown in this count.
    pub pitches: u32,
    /// Share of those pitches that were `pitch_type`.
    pub share: f64,
}

/// Coarse label for how many counts are predictable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExploitationPotential {
    Low,
    Moderate,
    High,
}

impl ExploitationPotential {
    fn from_predictable_counts(n: usize) -> Self {
        match n {
            0 => Self::Low,
            1 | 2 => Self::Moderate,
            _ => Self::High,
        }
    }
}

/// Sequence facet of a pitcher vulnerability profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceFacet {
    /// False when no at-bat had enough typed pitches for an n-gram.
    pub has_data: bool,
    /// At-bats that contributed at least one n-gram.
    pub sequences_analyzed: u32,
    /// Total n-grams counted.
    pub total_ngrams: u32,
    /// Distinct n-grams seen.
    pub distinct_ngrams: u32,
    /// 0-100, higher when one sequence dominates.
    pub predictability_score: f64,
    pub confidence: f64,
    pub most_frequent: Option<SequenceFrequency>,
    pub top_sequences: Vec<SequenceFrequency>,
    pub predictable_counts: Vec<CountTendency>,
    pub exploitation_potential: ExploitationPotential,
}

impl SequenceFacet {
    fn empty() -> Self {
        Self {
            has_data: false,
            sequences_analyzed: 0,
            total_ngrams: 0,
            distinct_ngrams: 0,
            predictability_score: 0.0,
            confidence: 0.0,
            most_frequent: None,
            top_sequences: Vec::new(),
            predictable_counts: Vec::new(),
            exploitation_potential: ExploitationPotential::Low,
        }
    }
}

/// Next-pitch context: the count the pitch was thrown in and the pitch
/// types leading up to it.
type Context<'a> = (String, Vec<&'a str>);

/// Builds the sequence facet from a pitcher's events.
pub fn analyze_sequences<'a, I>(
    events: I,
    settings: &SequenceSettings,
    schedule: &ConfidenceSchedule,
) -> SequenceFacet
where
    I: IntoIterator<Item = &'a AtBatEvent>,
{
    let mut ngrams: BTreeMap<Vec<&str>, u32> = BTreeMap::new();
    let mut transitions: BTreeMap<Context<'_>, BTreeMap<&str, u32>> = BTreeMap::new();
    let mut counts: BTreeMap<String, BTreeMap<&str, u32>> = BTreeMap::new();
    let mut arsenal: BTreeSet<&str> = BTreeSet::new();
    let mut sequences_analyzed = 0u32;

    for event in events {
        let typed: Vec<(&str, &Pitch)> = event
            .pitches
            .iter()
            .filter_map(|p| p.type_tag().map(|tag| (tag, p)))
            .collect();

        for (tag, pitch) in &typed {
            arsenal.insert(*tag);
            *counts
                .entry(pitch.count_label())
                .or_default()
                .entry(*tag)
                .or_default() += 1;
        }

        let mut contributed = false;
        for n in settings.ngram_min..=settings.ngram_max {
            for window in typed.windows(n) {
                let tags: Vec<&str> = window.iter().map(|(tag, _)| *tag).collect();
                let Some(((next, last), prefix)) = window.split_last() else {
                    continue;
                };
                let context = (
                    last.count_label(),
                    prefix.iter().map(|(tag, _)| *tag).collect(),
                );
                *transitions
                    .entry(context)
                    .or_default()
                    .entry(*next)
                    .or_default() += 1;
                *ngrams.entry(tags).or_default() += 1;
                contributed = true;
            }
        }
        if contributed {
            sequences_analyzed += 1;
        }
    }

    let predictable_counts = predictable_counts(&counts, settings);

    if ngrams.is_empty() {
        return SequenceFacet {
            exploitation_potential: ExploitationPotential::from_predictable_counts(
                predictable_counts.len(),
            ),
            predictable_counts,
            ..SequenceFacet::empty()
        };
    }

    let total: u32 = ngrams.values().sum();
    let predictability_score = predictability(transitions.values(), arsenal.len());

    let mut ranked: Vec<(&Vec<&str>, u32)> = ngrams.iter().map(|(k, v)| (k, *v)).collect();
    // BTreeMap iteration is already lexicographic, so a stable sort on
    // count keeps ties in key order.
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    let top_sequences: Vec<SequenceFrequency> = ranked
        .iter()
        .take(settings.top_sequences.max(1))
        .map(|(seq, count)| SequenceFrequency {
            sequence: seq.iter().map(|s| (*s).to_string()).collect(),
            count: *count,
            frequency: f64::from(*count) / f64::from(total),
        })
        .collect();

    SequenceFacet {
        has_data: true,
        sequences_analyzed,
        total_ngrams: total,
        distinct_ngrams: u32::try_from(ngrams.len()).unwrap_or(u32::MAX),
        predictability_score,
        confidence: schedule.multiplier(sequences_analyzed),
        most_frequent: top_sequences.first().cloned(),
        top_sequences,
        exploitation_potential: ExploitationPotential::from_predictable_counts(
            predictable_counts.len(),
        ),
        predictable_counts,
    }
}

/// Shannon entropy (nats) of a count distribution, with its total.
fn entropy<'a, I>(counts: I) -> (f64, f64)
where
    I: IntoIterator<Item = &'a u32>,
{
    let counts: Vec<f64> = counts
        .into_iter()
        .filter(|c| **c > 0)
        .map(|c| f64::from(*c))
        .collect();
    let total: f64 = counts.iter().sum();
    if total <= 0.0 {
        return (0.0, 0.0);
    }
    let h = counts
        .iter()
        .map(|c| {
            let p = c / total;
            -p * p.ln()
        })
        .sum();
    (h, total)
}

/// How well the next pitch type can be called from its context, 0-100.
///
/// One minus the conditional entropy of the next pitch given its count
/// state and preceding pitch types, relative to a uniform pick from the
/// pitcher's whole arsenal. A pitcher with a one-pitch arsenal, or whose
/// every context leads to the same pitch, scores 100; one whose next
/// pitch is a coin flip over the arsenal in every context scores 0.
pub fn predictability<'m, 'a: 'm, I>(transitions: I, arsenal_size: usize) -> f64
where
    I: IntoIterator<Item = &'m BTreeMap<&'a str, u32>>,
{
    let (weighted, total) = transitions
        .into_iter()
        .map(|next| entropy(next.values()))
        .fold((0.0, 0.0), |(weighted, total), (h, n)| {
            (weighted + h * n, total + n)
        });
    if total <= 0.0 {
        return 0.0;
    }
    if arsenal_size <= 1 {
        return 100.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let max_entropy = (arsenal_size as f64).ln();
    ((1.0 - weighted / total / max_entropy) * 100.0).clamp(0.0, 100.0)
}

fn predictable_counts(
    counts: &BTreeMap<String, BTreeMap<&str, u32>>,
    settings: &SequenceSettings,
) -> Vec<CountTendency> {
    let mut out: Vec<CountTendency> = counts
        .iter()
        .filter_map(|(count, by_type)| {
            let pitches: u32 = by_type.values().sum();
            if pitches < settings.min_count_pitches || pitches == 0 {
                return None;
            }
            // max_by_key keeps the last max; iterate reversed so the
            // alphabetically first pitch type wins ties.
            let (pitch_type, n) = by_type.iter().rev().max_by_key(|(_, n)| **n)?;
            let share = f64::from(*n) / f64::from(pitches);
            (share >= settings.predictable_count_share).then(|| CountTendency {
                count: count.clone(),
                pitch_type: (*pitch_type).to_string(),
                pitches,
                share,
            })
        })
        .collect();
    out.sort_by(|a, b| b.share.total_cmp(&a.share).then_with(|| a.count.cmp(&b.count)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::{Outcome, Pitch};
    use chrono::NaiveDate;

    fn at_bat(types: &[(&str, u8, u8)]) -> AtBatEvent {
        AtBatEvent {
            pitcher_id: 1,
            batter_id: 2,
            date: NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
            inning: 1,
            lineup_slot: 1,
            pitches: types
                .iter()
                .map(|(t, b, s)| Pitch {
                    pitch_type: (*t).to_string(),
                    balls: *b,
                    strikes: *s,
                })
                .collect(),
            outcome: Outcome::Groundout,
        }
    }

    fn next_counts<'a>(pairs: &[(&'a str, u32)]) -> BTreeMap<&'a str, u32> {
        pairs.iter().copied().collect()
    }

    fn facet(events: &[AtBatEvent]) -> SequenceFacet {
        analyze_sequences(
            events,
            &SequenceSettings::default(),
            &ConfidenceSchedule::default(),
        )
    }

    #[test]
    fn test_predictability_extremes() {
        let certain = next_counts(&[("FF", 7)]);
        assert!((predictability([&certain], 4) - 100.0).abs() < 1e-9);
        let coin_flip = next_counts(&[("FF", 5), ("SL", 5), ("CH", 5), ("CU", 5)]);
        assert!(predictability([&coin_flip], 4).abs() < 1e-9);
        assert_eq!(predictability(std::iter::empty(), 4), 0.0);
        assert!((predictability([&coin_flip], 1) - 100.0).abs() < 1e-9);
        let skewed = next_counts(&[("FF", 20), ("SL", 1), ("CH", 1)]);
        let mild = next_counts(&[("FF", 8), ("SL", 7), ("CH", 7)]);
        assert!(predictability([&skewed], 3) > predictability([&mild], 3));
    }

    #[test]
    fn test_ngrams_and_top_sequence() {
        let events: Vec<AtBatEvent> = (0..6)
            .map(|_| at_bat(&[("FF", 0, 0), ("FF", 0, 1), ("SL", 0, 2)]))
            .collect();
        let facet = facet(&events);
        assert!(facet.has_data);
        assert_eq!(facet.sequences_analyzed, 6);
        // Per at-bat: FF-FF, FF-SL, FF-FF-SL
        assert_eq!(facet.total_ngrams, 18);
        assert_eq!(facet.distinct_ngrams, 3);
        let top = facet.most_frequent.unwrap();
        assert_eq!(top.count, 6);
        // Every context leads to one pitch.
        assert!((facet.predictability_score - 100.0).abs() < 1e-9);
        assert!((facet.confidence - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_repetitive_pitcher_beats_mixed_pitcher() {
        let repetitive: Vec<AtBatEvent> = (0..60)
            .map(|_| at_bat(&[("FF", 0, 0), ("FF", 0, 1), ("SL", 0, 2)]))
            .collect();
        let patterns = [
            ["FF", "FF", "SL"],
            ["FF", "SL", "FF"],
            ["FF", "CH", "CU"],
            ["FF", "CU", "CH"],
        ];
        let mixed: Vec<AtBatEvent> = (0..60)
            .map(|i| {
                let p = patterns[i % patterns.len()];
                at_bat(&[(p[0], 0, 0), (p[1], 0, 1), (p[2], 0, 2)])
            })
            .collect();

        let repetitive = facet(&repetitive).predictability_score;
        let mixed = facet(&mixed).predictability_score;
        assert!((repetitive - 100.0).abs() < 1e-9);
        // Second pitch is uniform over the arsenal after FF in 0-1; the
        // third pitch and every 3-gram are determined: 1 of 3 contexts
        // per at-bat carries full entropy.
        assert!((mixed - 200.0 / 3.0).abs() < 1e-9);
        assert!(repetitive > mixed);
    }

    #[test]
    fn test_count_state_separates_contexts() {
        // After FF the next pitch depends only on the count.
        let events: Vec<AtBatEvent> = (0..20)
            .map(|i| {
                if i % 2 == 0 {
                    at_bat(&[("FF", 0, 0), ("SL", 0, 1)])
                } else {
                    at_bat(&[("FF", 1, 0), ("CH", 1, 0)])
                }
            })
            .collect();
        assert!((facet(&events).predictability_score - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_predictable_counts() {
        let mut events: Vec<AtBatEvent> = (0..8).map(|_| at_bat(&[("FF", 0, 0)])).collect();
        events.push(at_bat(&[("CH", 0, 0)]));
        let facet = analyze_sequences(
            &events,
            &SequenceSettings::default(),
            &ConfidenceSchedule::default(),
        );
        // Single pitches never form an n-gram.
        assert!(!facet.has_data);
        assert_eq!(facet.predictable_counts.len(), 1);
        let t = &facet.predictable_counts[0];
        assert_eq!(t.count, "0-0");
        assert_eq!(t.pitch_type, "FF");
        assert_eq!(t.pitches, 9);
        assert!((t.share - 8.0 / 9.0).abs() < 1e-12);
        assert_eq!(facet.exploitation_potential, ExploitationPotential::Moderate);
    }

    #[test]
    fn test_no_pitch_data() {
        let events = vec![at_bat(&[]), at_bat(&[("", 0, 0), ("", 1, 0)])];
        let facet = analyze_sequences(
            &events,
            &SequenceSettings::default(),
            &ConfidenceSchedule::default(),
        );
        assert!(!facet.has_data);
        assert_eq!(facet.predictability_score, 0.0);
        assert!(facet.top_sequences.is_empty());
    }

    #[test]
    fn test_settings_validation() {
        let mut s = SequenceSettings::default();
        assert!(s.validate().is_ok());
        s.ngram_min = 1;
        assert!(s.validate().is_err());
        s.ngram_min = 3;
        s.ngram_max = 2;
        assert!(s.validate().is_err());
    }
}
