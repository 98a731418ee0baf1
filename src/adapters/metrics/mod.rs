//! Metrics Adapters
//!
//! Prometheus registry for a batch run, exported as a textfile.

pub mod prometheus;

pub use prometheus::RunMetrics;
