//! Configuration Module - TOML-based Engine Configuration
//!
//! Loads and validates configuration from `config.toml`.
//! Every weight, threshold and prior is externalized here; the domain
//! layer receives typed settings and never hardcodes a tunable.

pub mod loader;

use std::path::PathBuf;

use serde::Deserialize;

use crate::domain::ensemble::{BatterQualitySettings, EnsembleSettings, PathwaySettings};
use crate::domain::market::MarketSettings;
use crate::domain::vulnerability::VulnerabilitySettings;

/// Top-level engine configuration.
///
/// Loaded from `config.toml` at startup. All fields are validated
/// before any data is read. Every section has defaults, so a file with
/// only `[run]` is a working configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
  /// Run identity, directories and window.
  #[serde(default)]
  pub run: RunConfig,
  /// Pitcher vulnerability analyzer.
  #[serde(default)]
  pub vulnerability: VulnerabilitySettings,
  /// Ensemble weights, priors and variance floor.
  #[serde(default)]
  pub ensemble: EnsembleSettings,
  /// Batter metric normalization.
  #[serde(default)]
  pub batter_quality: BatterQualitySettings,
  /// Market assessment boundaries.
  #[serde(default)]
  pub market: MarketSettings,
  /// Pathway classification thresholds.
  #[serde(default)]
  pub pathway: PathwaySettings,
  /// Metrics textfile export.
  #[serde(default)]
  pub metrics: MetricsConfig,
}

/// Run configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
  /// Human-readable run name, stamped on logs.
  #[serde(default = "default_name")]
  pub name: String,
  /// Log level (trace, debug, info, warn, error). RUST_LOG wins.
  #[serde(default = "default_log_level")]
  pub log_level: String,
  /// Root of the event store files.
  #[serde(default = "default_data_dir")]
  pub data_dir: PathBuf,
  /// Where reports and predictions are written.
  #[serde(default = "default_output_dir")]
  pub output_dir: PathBuf,
  /// Days of history before the target date.
  #[serde(default = "default_lookback_days")]
  pub lookback_days: u32,
  /// Worker threads for scoring (0 = one per core).
  #[serde(default)]
  pub workers: usize,
}

impl Default for RunConfig {
  fn default() -> Self {
    Self {
      name: default_name(),
      log_level: default_log_level(),
      data_dir: default_data_dir(),
      output_dir: default_output_dir(),
      lookback_days: default_lookback_days(),
      workers: 0,
    }
  }
}

/// Metrics configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
  /// Write the Prometheus textfile after each run.
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// Textfile path, relative to the output dir unless absolute.
  #[serde(default = "default_textfile")]
  pub textfile: PathBuf,
}

impl Default for MetricsConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      textfile: default_textfile(),
    }
  }
}

// Default value functions for serde

fn default_name() -> String {
  "weakspot".to_string()
}

fn default_log_level() -> String {
  "info".to_string()
}

fn default_data_dir() -> PathBuf {
  PathBuf::from("data")
}

fn default_output_dir() -> PathBuf {
  PathBuf::from("output")
}

fn default_lookback_days() -> u32 {
  60
}

fn default_true() -> bool {
  true
}

fn default_textfile() -> PathBuf {
  PathBuf::from("metrics.prom")
}
