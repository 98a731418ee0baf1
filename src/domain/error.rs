//! Engine error taxonomy.
//!
//! `InsufficientData` and `NoProfile` are fatal for a single entity only;
//! the daily run records them in its skip list and continues.
//! `Configuration` is fatal at startup.

use thiserror::Error;

use super::event::{DateWindow, PlayerId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Zero historical events for the pitcher in the window.
    #[error("insufficient data: no at-bat events for pitcher {pitcher_id} in {window}")]
    InsufficientData {
        pitcher_id: PlayerId,
        window: DateWindow,
    },

    /// Both sides of a pairing are unknown to the event store.
    #[error("no profile: batter {batter_id} and pitcher {pitcher_id} are both unknown")]
    NoProfile {
        batter_id: PlayerId,
        pitcher_id: PlayerId,
    },

    /// Invalid weights or thresholds.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl EngineError {
    /// Whether the error should abort the whole run.
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}
