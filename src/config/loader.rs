//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, validating all parameters,
//! and providing clear error messages for misconfiguration.
//! Validation failures surface as `EngineError::Configuration` wrapped
//! in `anyhow`, so callers can `downcast_ref` them.

use std::path::Path;

use anyhow::{Context, Result};

use super::AppConfig;
use crate::domain::error::EngineError;

/// Load and validate configuration from a TOML file.
///
/// # Arguments
/// * `path` - Path to the config.toml file
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: impl AsRef<Path>) -> Result<AppConfig> {
  let path = path.as_ref();

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  parse_config(&content)
    .with_context(|| format!("Invalid configuration in {}", path.display()))
}

/// Parse and validate configuration text.
///
/// # Errors
/// TOML syntax errors, or an `EngineError::Configuration`.
pub fn parse_config(content: &str) -> Result<AppConfig> {
  let config: AppConfig = toml::from_str(content).context("Failed to parse config.toml")?;
  validate_config(&config)?;
  Ok(config)
}

/// Validate all configuration parameters.
///
/// Checks for:
/// - Weight sets summing to 1.0 (never silently renormalized)
/// - Monotone confidence schedule
/// - Finite, positive variances and priors in range
/// - Ascending market boundaries and in-range pathway thresholds
///
/// # Errors
/// The first `EngineError::Configuration` found.
pub fn validate_config(config: &AppConfig) -> Result<(), EngineError> {
  if config.run.lookback_days == 0 {
    return Err(EngineError::Configuration(
      "run.lookback_days must be >= 1".to_string(),
    ));
  }
  if config.run.name.trim().is_empty() {
    return Err(EngineError::Configuration(
      "run.name must not be empty".to_string(),
    ));
  }

  config.vulnerability.validate()?;
  config.ensemble.validate()?;
  config.batter_quality.validate()?;
  config.market.validate()?;
  config.pathway.validate()?;

  Ok(())
}
