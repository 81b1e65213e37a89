//! Player statistics table and its background refresher.
//!
//! Rows are keyed by normalized player name, surface, and tour. The
//! analyzer takes a cheap snapshot of the table for each evaluation, so a
//! reload never blocks a running simulation.

pub mod csv_source;
pub mod provider;

pub use csv_source::{source_for, DEFAULT_STATS_URL};
pub use provider::StatsSource;

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::{EngineError, PlayerRates};
use crate::models::{StatsRow, Surface, Tour};

type StatsKey = (String, Surface, Tour);

/// Lowercase and collapse whitespace so "  Jannik   SINNER" finds "Jannik Sinner".
fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Immutable snapshot of the statistics source.
#[derive(Debug, Clone, Default)]
pub struct StatsTable {
    rows: HashMap<StatsKey, PlayerRates>,
    /// Normalized name -> display name, per (surface, tour).
    names: HashMap<(Surface, Tour), BTreeMap<String, String>>,
    loaded_at: Option<DateTime<Utc>>,
    source: Option<String>,
}

impl StatsTable {
    /// Build a table from parsed rows. Later duplicates replace earlier ones.
    pub fn from_rows(rows: Vec<StatsRow>, source: Option<&str>) -> Self {
        let mut table = StatsTable {
            loaded_at: Some(Utc::now()),
            source: source.map(str::to_string),
            ..Default::default()
        };
        for row in rows {
            let normalized = normalize_name(&row.player);
            let key = (normalized.clone(), row.surface, row.tour);
            if table.rows.insert(key, row.rates).is_some() {
                debug!(
                    "Duplicate statistics row for {} ({}, {}), keeping the last",
                    row.player, row.surface, row.tour
                );
            }
            table
                .names
                .entry((row.surface, row.tour))
                .or_default()
                .insert(normalized, row.player);
        }
        table
    }

    pub fn lookup(
        &self,
        player: &str,
        surface: Surface,
        tour: Tour,
    ) -> Result<PlayerRates, EngineError> {
        self.rows
            .get(&(normalize_name(player), surface, tour))
            .copied()
            .ok_or_else(|| EngineError::StatsNotFound {
                player: player.to_string(),
                surface: surface.to_string(),
                tour: tour.to_string(),
            })
    }

    /// Player names with statistics for a surface/tour pair, alphabetically.
    pub fn players(&self, surface: Surface, tour: Tour) -> Vec<String> {
        self.names
            .get(&(surface, tour))
            .map(|names| names.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.loaded_at
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }
}

/// Shared, swappable handle on the current [`StatsTable`].
#[derive(Clone, Default)]
pub struct StatsCache {
    inner: Arc<RwLock<Arc<StatsTable>>>,
}

impl StatsCache {
    pub fn new(table: StatsTable) -> Self {
        StatsCache {
            inner: Arc::new(RwLock::new(Arc::new(table))),
        }
    }

    /// Current table. Held snapshots stay valid across reloads.
    pub fn snapshot(&self) -> Arc<StatsTable> {
        let guard = self.inner.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    pub fn replace(&self, table: StatsTable) {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(table);
    }

    pub fn players(&self, surface: Surface, tour: Tour) -> Vec<String> {
        self.snapshot().players(surface, tour)
    }

    /// Fetch all rows from `source` and swap them in.
    ///
    /// An empty result is treated as a failure so a truncated download never
    /// wipes a good table.
    pub async fn load(&self, source: &dyn StatsSource) -> anyhow::Result<usize> {
        let rows = source.fetch_rows().await?;
        if rows.is_empty() {
            anyhow::bail!("statistics source '{}' returned no usable rows", source.name());
        }
        let table = StatsTable::from_rows(rows, Some(source.name()));
        let count = table.len();
        self.replace(table);
        info!("Loaded {} statistics rows from {}", count, source.name());
        Ok(count)
    }
}

/// Spawns a background task that reloads `cache` from `source` every
/// `interval`. A failed reload is logged and the previous table is kept.
pub fn start_stats_reloader(
    cache: StatsCache,
    source: Arc<dyn StatsSource>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            "Statistics reloader started (source={}, interval={:?})",
            source.name(),
            interval
        );
        let fetch_timeout = interval.min(Duration::from_secs(60));
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // the first tick fires immediately and the table was loaded at startup
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match tokio::time::timeout(fetch_timeout, cache.load(source.as_ref())).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => warn!(
                    "Statistics reload from '{}' failed, keeping {} cached rows: {}",
                    source.name(),
                    cache.snapshot().len(),
                    e
                ),
                Err(_) => warn!(
                    "Statistics reload from '{}' timed out after {:?}",
                    source.name(),
                    fetch_timeout
                ),
            }
        }
    })
}
