//! Event Source Port - Event Store Adapter Interface
//!
//! The core consumes a read-only, already-normalized snapshot of the
//! event store: at-bat events plus batter and pitcher aggregates keyed by
//! canonical player id. Adapters own identity resolution and record
//! validation; nothing past this port ever matches players by name.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::event::{AtBatEvent, BatterProfile, Matchup, PitcherSeasonStats, PlayerId};

/// Fully materialized, immutable view of the event store for one run.
///
/// Events are grouped per pitcher and kept in a stable order so that
/// every analysis over the same snapshot sees identical input.
#[derive(Debug, Clone, Default)]
pub struct EventSnapshot {
  by_pitcher: BTreeMap<PlayerId, Vec<AtBatEvent>>,
  batters_seen: BTreeSet<PlayerId>,
  batters: BTreeMap<PlayerId, BatterProfile>,
  pitchers: BTreeMap<PlayerId, PitcherSeasonStats>,
  event_count: usize,
}

impl EventSnapshot {
  /// Builds a snapshot. Duplicate aggregates keep the last entry.
  pub fn new(
    events: Vec<AtBatEvent>,
    batters: Vec<BatterProfile>,
    pitchers: Vec<PitcherSeasonStats>,
  ) -> Self {
    let event_count = events.len();
    let mut by_pitcher: BTreeMap<PlayerId, Vec<AtBatEvent>> = BTreeMap::new();
    let mut batters_seen = BTreeSet::new();
    for event in events {
      batters_seen.insert(event.batter_id);
      by_pitcher.entry(event.pitcher_id).or_default().push(event);
    }
    for list in by_pitcher.values_mut() {
      list.sort_by(|a, b| {
        (a.date, a.inning, a.lineup_slot, a.batter_id)
          .cmp(&(b.date, b.inning, b.lineup_slot, b.batter_id))
      });
    }

    Self {
      by_pitcher,
      batters_seen,
      batters: batters.into_iter().map(|b| (b.batter_id, b)).collect(),
      pitchers: pitchers.into_iter().map(|p| (p.pitcher_id, p)).collect(),
      event_count,
    }
  }

  /// All events thrown by a pitcher, oldest first.
  pub fn events_for_pitcher(&self, pitcher_id: PlayerId) -> &[AtBatEvent] {
    self.by_pitcher.get(&pitcher_id).map_or(&[], Vec::as_slice)
  }

  pub fn batter(&self, batter_id: PlayerId) -> Option<&BatterProfile> {
    self.batters.get(&batter_id)
  }

  pub fn pitcher_stats(&self, pitcher_id: PlayerId) -> Option<&PitcherSeasonStats> {
    self.pitchers.get(&pitcher_id)
  }

  /// Whether the store has any record of this batter.
  pub fn knows_batter(&self, batter_id: PlayerId) -> bool {
    self.batters.contains_key(&batter_id) || self.batters_seen.contains(&batter_id)
  }

  /// Whether the store has any record of this pitcher.
  pub fn knows_pitcher(&self, pitcher_id: PlayerId) -> bool {
    self.pitchers.contains_key(&pitcher_id) || self.by_pitcher.contains_key(&pitcher_id)
  }

  pub fn event_count(&self) -> usize {
    self.event_count
  }

  pub fn pitcher_count(&self) -> usize {
    self.by_pitcher.len()
  }
}

/// Trait for event store providers.
///
/// Implementors read from wherever the normalized history lives and
/// hand back a fully materialized snapshot; the core never waits on I/O
/// after this returns.
#[async_trait]
pub trait EventSource: Send + Sync + 'static {
  /// Load every valid event and aggregate.
  async fn load_snapshot(&self) -> anyhow::Result<EventSnapshot>;

  /// Load the batter/pitcher pairings scheduled for `date`.
  async fn load_slate(&self, date: NaiveDate) -> anyhow::Result<Vec<Matchup>>;
}
