//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` with concrete
//! external dependencies (file I/O, Prometheus). Each sub-module groups
//! adapters by infrastructure concern.
//!
//! Adapter categories:
//! - `metrics`: Prometheus run metrics rendered to a textfile
//! - `persistence`: JSONL event history, odds files, atomic reports

pub mod metrics;
pub mod persistence;
