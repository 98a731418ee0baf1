//! Domain layer - Core scoring logic and models.
//!
//! Pure statistics over in-memory value types: the pitcher vulnerability
//! analyzer, the ensemble predictor, the market evaluator and the shared
//! confidence/Bayesian helpers they both lean on.
//! No I/O here (hexagonal architecture inner ring).

pub mod confidence;
pub mod ensemble;
pub mod error;
pub mod event;
pub mod market;
pub mod prediction;
pub mod sequence;
pub mod vulnerability;

// Re-export core types for convenience
pub use confidence::{BetaPrior, ConfidenceSchedule, PriorSettings};
pub use ensemble::{
    BatterQualitySettings, EnsemblePredictor, EnsembleSettings, PathwaySettings, PredictionInputs,
};
pub use error::EngineError;
pub use event::{
    AtBatEvent, BatterProfile, DateWindow, GameLine, MarketQuote, Matchup, Odds, Outcome, Pitch,
    PitcherSeasonStats, PlayerId, SeasonLine,
};
pub use market::{MarketEvaluation, MarketEvaluator, MarketSettings};
pub use prediction::{
    ComponentKind, ComponentSource, MarketAssessment, Pathway, PredictionRecord,
};
pub use sequence::SequenceSettings;
pub use vulnerability::{PitcherVulnerabilityProfile, VulnerabilityAnalyzer, VulnerabilitySettings};
