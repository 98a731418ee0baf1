//! Quote Source Port - Market Price Interface
//!
//! Pre-game sportsbook prices for batter home-run props. Quotes are
//! optional: a missing quote is a normal condition, not an error.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::event::{MarketQuote, PlayerId};

/// Trait for market price providers.
#[async_trait]
pub trait QuoteSource: Send + Sync + 'static {
  /// Quotes for `date`, keyed by batter id. Empty when none exist.
  async fn load_quotes(&self, date: NaiveDate) -> anyhow::Result<BTreeMap<PlayerId, MarketQuote>>;
}
