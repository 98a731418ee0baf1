//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) that the usecases layer requires
//! from the outside world. Adapters implement these traits.
//!
//! Port categories:
//! - `EventSource`: Normalized at-bat history and player aggregates
//! - `QuoteSource`: Pre-game market prices
//! - `ReportSink`: Ranked daily output

pub mod event_source;
pub mod quote_source;
pub mod report_sink;

pub use event_source::{EventSnapshot, EventSource};
pub use quote_source::QuoteSource;
pub use report_sink::ReportSink;
