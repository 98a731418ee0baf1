//! Quote Store - Daily JSON Market Price Files
//!
//! Reads `odds/YYYY-MM-DD.json` (an array of `MarketQuote`). The file is
//! optional: a missing file means no quotes for the day. Quotes with an
//! unparseable price or a date other than the requested one are
//! quarantined.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::fs;
use tracing::{info, instrument, warn};

use crate::domain::event::{MarketQuote, PlayerId};
use crate::ports::quote_source::QuoteSource;

pub struct FileQuoteStore {
    /// Directory holding the daily odds files.
    odds_dir: PathBuf,
    quarantined: AtomicUsize,
}

impl FileQuoteStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            odds_dir: data_dir.into().join("odds"),
            quarantined: AtomicUsize::new(0),
        }
    }

    pub fn quarantined(&self) -> usize {
        self.quarantined.load(Ordering::Relaxed)
    }

    fn check(quote: &MarketQuote, date: NaiveDate) -> std::result::Result<(), String> {
        if quote.date != date {
            return Err(format!("quote dated {} in file for {date}", quote.date));
        }
        if !quote.current.is_valid() {
            return Err(format!("invalid current odds {:?}", quote.current));
        }
        if let Some(opening) = quote.opening.filter(|o| !o.is_valid()) {
            return Err(format!("invalid opening odds {opening:?}"));
        }
        Ok(())
    }
}

#[async_trait]
impl QuoteSource for FileQuoteStore {
    #[instrument(skip(self))]
    async fn load_quotes(&self, date: NaiveDate) -> Result<BTreeMap<PlayerId, MarketQuote>> {
        let path = self
            .odds_dir
            .join(format!("{}.json", date.format("%Y-%m-%d")));
        if !path.exists() {
            info!(path = %path.display(), "No odds file, running without market quotes");
            return Ok(BTreeMap::new());
        }

        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let values: Vec<serde_json::Value> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {} as a JSON array", path.display()))?;

        let mut quotes = BTreeMap::new();
        for (i, value) in values.into_iter().enumerate() {
            let checked = serde_json::from_value::<MarketQuote>(value)
                .map_err(|e| e.to_string())
                .and_then(|q| Self::check(&q, date).map(|()| q));
            match checked {
                Ok(quote) => {
                    quotes.insert(quote.batter_id, quote);
                }
                Err(reason) => {
                    self.quarantined.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        file = %path.display(),
                        index = i,
                        reason = %reason,
                        "Quarantined malformed quote"
                    );
                }
            }
        }

        info!(quotes = quotes.len(), "Loaded market quotes");
        Ok(quotes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::Odds;

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let store = FileQuoteStore::new(std::env::temp_dir().join("weakspot-no-such-dir"));
        let quotes = store
            .load_quotes(NaiveDate::from_ymd_opt(2025, 7, 1).unwrap())
            .await
            .unwrap();
        assert!(quotes.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_quotes_quarantined() {
        let dir = std::env::temp_dir().join(format!("weakspot-odds-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(dir.join("odds")).await.unwrap();
        fs::write(
            dir.join("odds/2025-07-01.json"),
            r#"[
              {"batter_id":1,"date":"2025-07-01","current":{"american":350},"opening":{"american":400}},
              {"batter_id":2,"date":"2025-07-01","current":{"american":50}},
              {"batter_id":3,"date":"2025-06-30","current":{"decimal":4.0}},
              {"batter_id":4,"date":"2025-07-01","current":{"decimal":5.5}}
            ]"#,
        )
        .await
        .unwrap();

        let store = FileQuoteStore::new(&dir);
        let quotes = store
            .load_quotes(NaiveDate::from_ymd_opt(2025, 7, 1).unwrap())
            .await
            .unwrap();
        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes[&4].current, Odds::Decimal(5.5));
        assert_eq!(store.quarantined(), 2);

        let _ = fs::remove_dir_all(&dir).await;
    }
}
