//! Core input types for the engine.
//!
//! Defines the immutable historical facts (at-bat events), the batter and
//! pitcher aggregates supplied by the event store, market quotes, and the
//! slate of matchups for a target date. These types are the foundation of
//! the hexagonal architecture's inner ring: adapters build them, the
//! scoring code only reads them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::error::EngineError;

// ────────────────────────────────────────────
// Type aliases consumed by ports and adapters
// ────────────────────────────────────────────

/// Canonical player identifier, resolved once by the event store adapter.
pub type PlayerId = u64;

/// Number of lineup slots in a batting order.
pub const LINEUP_SLOTS: u8 = 9;

// ────────────────────────────────────────────
// Outcomes and pitches
// ────────────────────────────────────────────

/// Final result of a plate appearance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Single,
    Double,
    Triple,
    HomeRun,
    Walk,
    HitByPitch,
    Strikeout,
    Groundout,
    Flyout,
    Lineout,
    Popout,
    Foulout,
    FieldersChoice,
    SacrificeFly,
    ReachedOnError,
    Other,
}

impl Outcome {
    /// Whether the outcome counts as a pitcher failure.
    ///
    /// Hits and walks; hit-by-pitch and errors are excluded because they
    /// say little about what the batter did with the pitch.
    pub const fn is_favorable(self) -> bool {
        matches!(
            self,
            Self::Single | Self::Double | Self::Triple | Self::HomeRun | Self::Walk
        )
    }

    pub const fn is_home_run(self) -> bool {
        matches!(self, Self::HomeRun)
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Single => "single",
            Self::Double => "double",
            Self::Triple => "triple",
            Self::HomeRun => "home run",
            Self::Walk => "walk",
            Self::HitByPitch => "hit by pitch",
            Self::Strikeout => "strikeout",
            Self::Groundout => "groundout",
            Self::Flyout => "flyout",
            Self::Lineout => "lineout",
            Self::Popout => "popout",
            Self::Foulout => "foulout",
            Self::FieldersChoice => "fielder's choice",
            Self::SacrificeFly => "sacrifice fly",
            Self::ReachedOnError => "reached on error",
            Self::Other => "other",
        };
        f.write_str(label)
    }
}

/// A single pitch: its type tag and the count before it was thrown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pitch {
    /// Pitch type tag (e.g. "FF", "SL"). Empty when the feed had no type.
    #[serde(default)]
    pub pitch_type: String,
    /// Balls in the count before this pitch (0-3).
    pub balls: u8,
    /// Strikes in the count before this pitch (0-2).
    pub strikes: u8,
}

impl Pitch {
    /// Count label in "balls-strikes" form.
    pub fn count_label(&self) -> String {
        format!("{}-{}", self.balls, self.strikes)
    }

    /// The pitch type tag, if one was recorded.
    pub fn type_tag(&self) -> Option<&str> {
        let tag = self.pitch_type.trim();
        (!tag.is_empty()).then_some(tag)
    }
}

// ────────────────────────────────────────────
// At-bat events
// ────────────────────────────────────────────

/// Immutable historical fact: one completed plate appearance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtBatEvent {
    pub pitcher_id: PlayerId,
    pub batter_id: PlayerId,
    pub date: NaiveDate,
    /// Inning number, 1-based; extra innings allowed.
    pub inning: u8,
    /// Batting-order slot of the batter (1-9).
    pub lineup_slot: u8,
    /// Ordered pitches of the plate appearance. May be empty.
    #[serde(default)]
    pub pitches: Vec<Pitch>,
    pub outcome: Outcome,
}

impl AtBatEvent {
    /// Validate field ranges at the adapter boundary.
    ///
    /// # Errors
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.inning == 0 {
            return Err("inning must be >= 1".to_string());
        }
        if !(1..=LINEUP_SLOTS).contains(&self.lineup_slot) {
            return Err(format!(
                "lineup_slot must be in 1..={LINEUP_SLOTS}, got {}",
                self.lineup_slot
            ));
        }
        if let Some(p) = self.pitches.iter().find(|p| p.balls > 3 || p.strikes > 2) {
            return Err(format!("invalid count {}", p.count_label()));
        }
        Ok(())
    }

    /// Pitch type tags in order, skipping untyped pitches.
    pub fn pitch_types(&self) -> impl Iterator<Item = &str> {
        self.pitches.iter().filter_map(Pitch::type_tag)
    }
}

/// Inclusive date range used to select historical events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    /// Creates a window, rejecting an inverted range.
    ///
    /// # Errors
    /// Returns `EngineError::Configuration` when `start > end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, EngineError> {
        if start > end {
            return Err(EngineError::Configuration(format!(
                "window start {start} is after end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// The `lookback_days` days strictly before `target`.
    ///
    /// # Errors
    /// Returns `EngineError::Configuration` for a zero lookback or a date
    /// that would underflow the calendar.
    pub fn lookback(target: NaiveDate, lookback_days: u32) -> Result<Self, EngineError> {
        if lookback_days == 0 {
            return Err(EngineError::Configuration(
                "lookback_days must be >= 1".to_string(),
            ));
        }
        let end = target.pred_opt().ok_or_else(|| {
            EngineError::Configuration(format!("no day before {target}"))
        })?;
        let start = end
            .checked_sub_days(chrono::Days::new(u64::from(lookback_days - 1)))
            .ok_or_else(|| {
                EngineError::Configuration(format!(
                    "lookback of {lookback_days} days underflows from {target}"
                ))
            })?;
        Self::new(start, end)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

impl std::fmt::Display for DateWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

// ────────────────────────────────────────────
// Aggregates owned by the event store
// ────────────────────────────────────────────

/// One game of a batter's log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameLine {
    pub date: NaiveDate,
    pub plate_appearances: u32,
    pub home_runs: u32,
}

/// One season of a batter's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonLine {
    pub season: i32,
    pub plate_appearances: u32,
    pub home_runs: u32,
}

impl SeasonLine {
    pub fn hr_rate(&self) -> Option<f64> {
        (self.plate_appearances > 0)
            .then(|| f64::from(self.home_runs) / f64::from(self.plate_appearances))
    }
}

/// Batter aggregate quality metrics. Every metric is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatterProfile {
    pub batter_id: PlayerId,
    #[serde(default)]
    pub name: Option<String>,
    /// Isolated power (SLG - AVG).
    #[serde(default)]
    pub isolated_power: Option<f64>,
    /// Average exit velocity in mph.
    #[serde(default)]
    pub exit_velocity: Option<f64>,
    /// Share of batted balls at 95+ mph (0-1).
    #[serde(default)]
    pub hard_hit_rate: Option<f64>,
    /// Game log, any order.
    #[serde(default)]
    pub recent_games: Vec<GameLine>,
    /// Season history, any order.
    #[serde(default)]
    pub seasons: Vec<SeasonLine>,
}

/// Season aggregate for a pitcher.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PitcherSeasonStats {
    pub pitcher_id: PlayerId,
    #[serde(default)]
    pub name: Option<String>,
    pub batters_faced: u32,
    pub home_runs_allowed: u32,
}

/// One batter-vs-pitcher pairing on the target date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Matchup {
    pub batter_id: PlayerId,
    pub pitcher_id: PlayerId,
}

// ────────────────────────────────────────────
// Market prices
// ────────────────────────────────────────────

/// Sportsbook price in either decimal or American notation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Odds {
    /// Decimal odds (total payout per unit stake), must be > 1.
    Decimal(f64),
    /// American odds, e.g. +350 or -120. Magnitude must be >= 100.
    American(i32),
}

/// Home-run prop price for a batter on a date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketQuote {
    pub batter_id: PlayerId,
    pub date: NaiveDate,
    pub current: Odds,
    #[serde(default)]
    pub opening: Option<Odds>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn event(slot: u8, inning: u8) -> AtBatEvent {
        AtBatEvent {
            pitcher_id: 1,
            batter_id: 2,
            date: date(2025, 6, 1),
            inning,
            lineup_slot: slot,
            pitches: vec![Pitch {
                pitch_type: "FF".into(),
                balls: 0,
                strikes: 0,
            }],
            outcome: Outcome::Single,
        }
    }

    #[test]
    fn test_favorable_outcomes() {
        assert!(Outcome::HomeRun.is_favorable());
        assert!(Outcome::Walk.is_favorable());
        assert!(!Outcome::HitByPitch.is_favorable());
        assert!(!Outcome::Strikeout.is_favorable());
        assert!(Outcome::HomeRun.is_home_run());
        assert!(!Outcome::Triple.is_home_run());
    }

    #[test]
    fn test_event_validation() {
        assert!(event(5, 3).validate().is_ok());
        assert!(event(0, 3).validate().is_err());
        assert!(event(10, 3).validate().is_err());
        assert!(event(5, 0).validate().is_err());

        let mut bad_count = event(5, 3);
        bad_count.pitches[0].balls = 4;
        assert!(bad_count.validate().is_err());
    }

    #[test]
    fn test_untyped_pitches_skipped() {
        let mut e = event(1, 1);
        e.pitches.push(Pitch {
            pitch_type: "  ".into(),
            balls: 0,
            strikes: 1,
        });
        e.pitches.push(Pitch {
            pitch_type: "SL".into(),
            balls: 0,
            strikes: 1,
        });
        let types: Vec<_> = e.pitch_types().collect();
        assert_eq!(types, vec!["FF", "SL"]);
    }

    #[test]
    fn test_lookback_window_excludes_target_day() {
        let w = DateWindow::lookback(date(2025, 7, 1), 30).unwrap();
        assert_eq!(w.end, date(2025, 6, 30));
        assert_eq!(w.start, date(2025, 6, 1));
        assert!(!w.contains(date(2025, 7, 1)));
        assert!(w.contains(date(2025, 6, 1)));
        assert!(DateWindow::lookback(date(2025, 7, 1), 0).is_err());
    }

    #[test]
    fn test_odds_serde_shape() {
        let q: MarketQuote = serde_json::from_str(
            r#"{"batter_id":7,"date":"2025-07-01","current":{"american":350}}"#,
        )
        .unwrap();
        assert_eq!(q.current, Odds::American(350));
        assert!(q.opening.is_none());
    }
}
