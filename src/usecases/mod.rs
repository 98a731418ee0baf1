//! Use Cases Layer - Application Business Logic
//!
//! Orchestrates domain logic with port interfaces to implement
//! the engine's workflows. Each use case is a self-contained
//! business operation.
//!
//! Use cases:
//! - `RunContext`: Per-run snapshot, window and analyzers
//! - `DailyRun`: Load, score, rank and publish one target date
//! - `ranking`: Prediction ordering, pitcher rankings and summary

pub mod daily_run;
pub mod ranking;
pub mod run_context;

pub use daily_run::DailyRun;
pub use ranking::DailyReport;
pub use run_context::RunContext;
