//! TTL cache of latest snapshots
//!
//! Entries expire lazily: an expired entry stays in the map but reads treat it
//! as a miss. Cardinality is bounded by the asset table, so nothing is evicted.

use crate::asset::AssetSymbol;
use crate::feed::PriceSnapshot;
use crate::telemetry::{increment, CounterMetric};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

/// Default time-to-live for cached snapshots
pub const DEFAULT_TTL: Duration = Duration::from_millis(60_000);

/// A snapshot plus the instant it was stored
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub snapshot: PriceSnapshot,
    pub retrieved_at: Instant,
}

impl CacheEntry {
    fn is_fresh(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.retrieved_at) <= ttl
    }
}

/// Thread-safe latest-snapshot cache
#[derive(Debug)]
pub struct PriceCache {
    ttl: Duration,
    entries: Mutex<HashMap<AssetSymbol, CacheEntry>>,
}

impl PriceCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh snapshot for `symbol`, or `None` when missing or expired
    pub fn get(&self, symbol: &AssetSymbol) -> Option<PriceSnapshot> {
        let now = Instant::now();
        let hit = self
            .lock()
            .get(symbol)
            .filter(|entry| entry.is_fresh(now, self.ttl))
            .map(|entry| entry.snapshot.clone());

        match hit {
            Some(_) => increment(CounterMetric::CacheHit),
            None => increment(CounterMetric::CacheMiss),
        }
        hit
    }

    /// Store `snapshot`, overwriting any previous entry
    pub fn put(&self, symbol: AssetSymbol, snapshot: PriceSnapshot) {
        let entry = CacheEntry {
            snapshot,
            retrieved_at: Instant::now(),
        };
        self.lock().insert(symbol, entry);
    }

    /// All non-expired snapshots
    pub fn fresh_entries(&self) -> HashMap<AssetSymbol, PriceSnapshot> {
        let now = Instant::now();
        self.lock()
            .iter()
            .filter(|(_, entry)| entry.is_fresh(now, self.ttl))
            .map(|(symbol, entry)| (symbol.clone(), entry.snapshot.clone()))
            .collect()
    }

    /// Number of stored entries, expired ones included
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<AssetSymbol, CacheEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for PriceCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}
