//! Property-Based Tests — Domain Layer Invariants
//!
//! Uses `proptest` to verify that scoring components stay inside their
//! documented ranges across random inputs.

use chrono::NaiveDate;
use proptest::prelude::*;

use weakspot_engine::domain::confidence::{ConfidenceSchedule, probability_from_score};
use weakspot_engine::domain::ensemble::{EnsemblePredictor, PredictionInputs};
use weakspot_engine::domain::event::{
    AtBatEvent, BatterProfile, DateWindow, GameLine, MarketQuote, Odds, Outcome, Pitch,
};
use weakspot_engine::domain::market::MarketEvaluator;
use weakspot_engine::domain::prediction::ConfidenceInterval;
use weakspot_engine::domain::vulnerability::VulnerabilityAnalyzer;

fn date(m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, m, d).unwrap()
}

const OUTCOMES: [Outcome; 6] = [
    Outcome::Single,
    Outcome::HomeRun,
    Outcome::Walk,
    Outcome::Strikeout,
    Outcome::Groundout,
    Outcome::Flyout,
];

const PITCH_TYPES: [&str; 4] = ["FF", "SL", "CH", "CU"];

fn arb_event() -> impl Strategy<Value = AtBatEvent> {
    (
        1u8..=9,
        1u8..=11,
        1u32..=30,
        0usize..OUTCOMES.len(),
        prop::collection::vec(0usize..PITCH_TYPES.len(), 0..6),
    )
        .prop_map(|(slot, inning, day, outcome, pitches)| AtBatEvent {
            pitcher_id: 1,
            batter_id: 2,
            date: date(6, day),
            inning,
            lineup_slot: slot,
            pitches: pitches
                .into_iter()
                .enumerate()
                .map(|(i, t)| Pitch {
                    pitch_type: PITCH_TYPES[t].to_string(),
                    balls: (i % 4) as u8,
                    strikes: (i % 3) as u8,
                })
                .collect(),
            outcome: OUTCOMES[outcome],
        })
}

// ── Confidence Schedule ─────────────────────────────────────

proptest! {
    /// More data never lowers confidence.
    #[test]
    fn confidence_multiplier_monotonic(a in 0u32..500, b in 0u32..500) {
        let schedule = ConfidenceSchedule::default();
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(schedule.multiplier(lo) <= schedule.multiplier(hi));
        prop_assert!(schedule.multiplier(hi) <= 1.0);
        prop_assert!(schedule.multiplier(lo) >= 0.6);
    }

    /// Calibration is increasing and stays a probability.
    #[test]
    fn calibration_monotonic(s1 in 0.0f64..100.0, delta in 0.0f64..50.0) {
        let p1 = probability_from_score(s1, 0.035, 1.5);
        let p2 = probability_from_score((s1 + delta).min(100.0), 0.035, 1.5);
        prop_assert!(p1 > 0.0 && p1 < 1.0);
        prop_assert!(p2 >= p1, "p({s1})={p1} > p({})={p2}", s1 + delta);
    }
}

// ── Vulnerability Analyzer ──────────────────────────────────

proptest! {
    /// Composite and every bucket score stay on the 0-100 scale.
    #[test]
    fn composite_score_bounded(events in prop::collection::vec(arb_event(), 1..120)) {
        let window = DateWindow::new(date(6, 1), date(6, 30)).unwrap();
        let profile = VulnerabilityAnalyzer::default()
            .analyze(1, window, &events)
            .unwrap();
        prop_assert!((0.0..=100.0).contains(&profile.composite_score));
        prop_assert!((0.0..=1.0).contains(&profile.composite_confidence));
        prop_assert!((0.0..=100.0).contains(&profile.sequence.predictability_score));
        for slot in &profile.lineup.slots {
            prop_assert!((0.0..=100.0).contains(&slot.vulnerability_score));
        }
        let weights: f64 = profile.contributions.iter().map(|c| c.effective_weight).sum();
        prop_assert!((weights - 1.0).abs() < 1e-9);
        prop_assert_eq!(profile.total_at_bats as usize, events.len());
    }
}

// ── Ensemble Predictor ──────────────────────────────────────

proptest! {
    /// Interval brackets the score and never leaves [0, 100].
    #[test]
    fn interval_bounds(score in 0.0f64..=100.0, variance in 0.0f64..2_000.0) {
        let ci = ConfidenceInterval::around(score, variance);
        prop_assert!(ci.lower >= 0.0 && ci.upper <= 100.0);
        prop_assert!(ci.lower <= score && score <= ci.upper);
    }

    /// Predictions are never more certain than the variance floor allows,
    /// and the combined score is the sum of its contributions.
    #[test]
    fn prediction_variance_floor(
        iso in prop::option::of(0.0f64..0.5),
        ev in prop::option::of(75.0f64..100.0),
        games in prop::collection::vec((1u32..6, 0u32..3), 0..20),
    ) {
        let batter = BatterProfile {
            batter_id: 7,
            isolated_power: iso,
            exit_velocity: ev,
            recent_games: games
                .into_iter()
                .enumerate()
                .map(|(i, (pa, hr))| GameLine {
                    date: date(6, 1 + i as u32),
                    plate_appearances: pa,
                    home_runs: hr.min(pa),
                })
                .collect(),
            ..BatterProfile::default()
        };
        let predictor = EnsemblePredictor::default();
        let record = predictor
            .predict(&PredictionInputs {
                batter_id: 7,
                pitcher_id: 9,
                date: date(7, 1),
                batter: Some(&batter),
                vulnerability: None,
                pitcher_stats: None,
                quote: None,
                batter_known: true,
                pitcher_known: false,
            })
            .unwrap();
        prop_assert!(record.total_variance >= predictor.settings().variance_threshold);
        prop_assert!((0.0..=100.0).contains(&record.combined_score));
        prop_assert!((record.combined_score - record.contribution_sum()).abs() < 1e-9);
        prop_assert!(record.hr_probability > 0.0 && record.hr_probability < 1.0);
    }
}

// ── Market Evaluator ────────────────────────────────────────

proptest! {
    /// Edge is exactly model minus implied for any valid American price.
    #[test]
    fn edge_identity(american in 100i32..3_000, negative in any::<bool>(), p in 0.0f64..1.0) {
        let price = if negative { -american } else { american };
        let quote = MarketQuote {
            batter_id: 1,
            date: date(7, 1),
            current: Odds::American(price),
            opening: None,
        };
        let eval = MarketEvaluator::default().evaluate(Some(&quote), p);
        let implied = eval.implied_probability.unwrap();
        prop_assert!(implied > 0.0 && implied < 1.0);
        prop_assert!((eval.edge - (p - implied)).abs() < 1e-12);
    }
}
