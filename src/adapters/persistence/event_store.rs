//! Event Store - JSONL At-bat History and JSON Aggregates
//!
//! Reads the normalized event store from the data directory:
//! `events/*.jsonl` (one `AtBatEvent` per line), `batters.json` and
//! `pitchers.json` (arrays), and `slates/YYYY-MM-DD.json`. Each line is
//! validated on the way in; malformed or out-of-range records are
//! quarantined (logged and counted) and never reach the scoring code.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use tokio::fs;
use tracing::{info, instrument, warn};

use crate::domain::event::{AtBatEvent, BatterProfile, Matchup, PitcherSeasonStats};
use crate::ports::event_source::{EventSnapshot, EventSource};

/// File-backed event store.
///
/// Layout under `data_dir`:
/// - `events/*.jsonl` read in file-name order
/// - `batters.json`, `pitchers.json` (optional)
/// - `slates/YYYY-MM-DD.json`
pub struct FileEventStore {
    /// Root data directory.
    data_dir: PathBuf,
    /// Records rejected since creation.
    quarantined: AtomicUsize,
}

impl FileEventStore {
    /// Create a store rooted at `data_dir`.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            quarantined: AtomicUsize::new(0),
        }
    }

    /// Number of records quarantined so far.
    pub fn quarantined(&self) -> usize {
        self.quarantined.load(Ordering::Relaxed)
    }

    #[instrument(skip(self))]
    async fn load_events(&self) -> Result<Vec<AtBatEvent>> {
        let dir = self.data_dir.join("events");
        if !dir.exists() {
            warn!(dir = %dir.display(), "No events directory, history is empty");
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        let mut entries = fs::read_dir(&dir)
            .await
            .with_context(|| format!("Failed to list {}", dir.display()))?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "jsonl") {
                files.push(path);
            }
        }
        files.sort();

        let mut events = Vec::new();
        for path in &files {
            let content = fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let (mut parsed, rejected) = parse_jsonl(&content, path, AtBatEvent::validate);
            self.quarantined.fetch_add(rejected, Ordering::Relaxed);
            events.append(&mut parsed);
        }

        info!(
            files = files.len(),
            events = events.len(),
            quarantined = self.quarantined(),
            "Loaded at-bat events"
        );
        Ok(events)
    }

    async fn load_array<T: DeserializeOwned>(&self, name: &str) -> Result<Vec<T>> {
        let path = self.data_dir.join(name);
        if !path.exists() {
            warn!(path = %path.display(), "Aggregate file missing, treating as empty");
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let values: Vec<serde_json::Value> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {} as a JSON array", path.display()))?;

        let mut out = Vec::with_capacity(values.len());
        for (i, value) in values.into_iter().enumerate() {
            match serde_json::from_value::<T>(value) {
                Ok(item) => out.push(item),
                Err(e) => {
                    self.quarantined.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        file = %path.display(),
                        index = i,
                        error = %e,
                        "Quarantined malformed aggregate"
                    );
                }
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl EventSource for FileEventStore {
    async fn load_snapshot(&self) -> Result<EventSnapshot> {
        let events = self.load_events().await?;
        let batters: Vec<BatterProfile> = self.load_array("batters.json").await?;
        let pitchers: Vec<PitcherSeasonStats> = self.load_array("pitchers.json").await?;
        info!(
            batters = batters.len(),
            pitchers = pitchers.len(),
            "Loaded player aggregates"
        );
        Ok(EventSnapshot::new(events, batters, pitchers))
    }

    #[instrument(skip(self))]
    async fn load_slate(&self, date: NaiveDate) -> Result<Vec<Matchup>> {
        let path = self
            .data_dir
            .join("slates")
            .join(format!("{}.json", date.format("%Y-%m-%d")));
        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read slate {}", path.display()))?;
        let slate: Vec<Matchup> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse slate {}", path.display()))?;
        info!(matchups = slate.len(), "Loaded slate");
        Ok(slate)
    }
}

/// Parse JSON lines, dropping blank lines and quarantining records that
/// fail to parse or validate. Returns the good records and the reject
/// count.
pub(crate) fn parse_jsonl<T, V>(content: &str, path: &Path, validate: V) -> (Vec<T>, usize)
where
    T: DeserializeOwned,
    V: Fn(&T) -> std::result::Result<(), String>,
{
    let mut records = Vec::new();
    let mut rejected = 0;
    for (i, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let parsed = serde_json::from_str::<T>(line)
            .map_err(|e| e.to_string())
            .and_then(|record| validate(&record).map(|()| record));
        match parsed {
            Ok(record) => records.push(record),
            Err(reason) => {
                rejected += 1;
                warn!(
                    file = %path.display(),
                    line = i + 1,
                    reason = %reason,
                    "Quarantined malformed record"
                );
            }
        }
    }
    (records, rejected)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD: &str = r#"{"pitcher_id":1,"batter_id":2,"date":"2025-06-01","inning":3,"lineup_slot":4,"pitches":[{"pitch_type":"FF","balls":0,"strikes":0}],"outcome":"home_run"}"#;

    #[test]
    fn test_parse_jsonl_quarantines_bad_lines() {
        let bad_slot = GOOD.replace("\"lineup_slot\":4", "\"lineup_slot\":12");
        let content = format!("{GOOD}\n\nnot json\n{bad_slot}\n{GOOD}\n");
        let (events, rejected) =
            parse_jsonl::<AtBatEvent, _>(&content, Path::new("x.jsonl"), AtBatEvent::validate);
        assert_eq!(events.len(), 2);
        assert_eq!(rejected, 2);
    }

    #[tokio::test]
    async fn test_load_from_directory() {
        let dir = std::env::temp_dir().join(format!("weakspot-store-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(dir.join("events")).await.unwrap();
        fs::create_dir_all(dir.join("slates")).await.unwrap();
        fs::write(dir.join("events/2025-06.jsonl"), format!("{GOOD}\n{{\"broken\":\n"))
            .await
            .unwrap();
        fs::write(
            dir.join("batters.json"),
            r#"[{"batter_id":2,"isolated_power":0.2},{"batter_id":"oops"}]"#,
        )
        .await
        .unwrap();
        fs::write(
            dir.join("slates/2025-07-01.json"),
            r#"[{"batter_id":2,"pitcher_id":1}]"#,
        )
        .await
        .unwrap();

        let store = FileEventStore::new(&dir);
        let snapshot = store.load_snapshot().await.unwrap();
        assert_eq!(snapshot.event_count(), 1);
        assert!(snapshot.batter(2).is_some());
        assert_eq!(store.quarantined(), 2);

        let slate = store
            .load_slate(NaiveDate::from_ymd_opt(2025, 7, 1).unwrap())
            .await
            .unwrap();
        assert_eq!(slate.len(), 1);
        assert!(store
            .load_slate(NaiveDate::from_ymd_opt(2025, 7, 2).unwrap())
            .await
            .is_err());

        let _ = fs::remove_dir_all(&dir).await;
    }
}
