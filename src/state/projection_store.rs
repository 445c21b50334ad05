use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::types::{Player, Position, ProjectionRow, ScoringConfig};

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

fn seasons_tag(seasons: &[u16]) -> String {
    seasons
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// `PPR:4|2023,2024|pos:RB`
pub fn position_key(cfg: &ScoringConfig, seasons: &[u16], position: Position) -> String {
    format!("{}|{}|pos:{}", cfg.key(), seasons_tag(seasons), position)
}

/// `PPR:4|2023,2024|id:4046`
pub fn id_key(cfg: &ScoringConfig, seasons: &[u16], player_id: &str) -> String {
    format!("{}|{}|id:{}", cfg.key(), seasons_tag(seasons), player_id)
}

// ---------------------------------------------------------------------------
// CacheEntry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub built_at: Instant,
    pub payload: T,
}

impl<T: Clone> CacheEntry<T> {
    fn new(payload: T) -> Self {
        Self {
            built_at: Instant::now(),
            payload,
        }
    }

    fn fresh(&self, ttl: Duration) -> Option<T> {
        (self.built_at.elapsed() < ttl).then(|| self.payload.clone())
    }
}

// ---------------------------------------------------------------------------
// FlightGuard
// ---------------------------------------------------------------------------

/// Exclusive right to rebuild one key. Dropping it releases the lock and, when
/// no other task is waiting on the same key, removes the key's lock entry.
pub struct FlightGuard<'a> {
    store: &'a ProjectionStore,
    key: String,
    lock: Option<OwnedMutexGuard<()>>,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.lock.take();
        // Waiters hold a clone, so a count of one means the map owns the only reference.
        self.store
            .in_flight
            .remove_if(&self.key, |_, m| Arc::strong_count(m) == 1);
    }
}

// ---------------------------------------------------------------------------
// ProjectionStore
// ---------------------------------------------------------------------------

/// Owns every cached projection. Entries older than the TTL are never served;
/// the caller rebuilds and overwrites them. Writes only happen after a build
/// fully succeeds, so a failed rebuild leaves the previous entry in place.
/// Each write also drops stale entries from the same table.
pub struct ProjectionStore {
    ttl: Duration,
    /// position key → rows for every pool player at that position
    by_position: DashMap<String, CacheEntry<Arc<Vec<ProjectionRow>>>>,
    /// id key → that pool player's row
    by_id: DashMap<String, CacheEntry<ProjectionRow>>,
    roster: RwLock<Option<CacheEntry<Arc<Vec<Player>>>>>,
    /// cache key → lock held by whichever task is rebuilding that key
    in_flight: DashMap<String, Arc<Mutex<()>>>,
}

impl ProjectionStore {
    pub fn new(ttl: Duration) -> Arc<Self> {
        Arc::new(Self {
            ttl,
            by_position: DashMap::new(),
            by_id: DashMap::new(),
            roster: RwLock::new(None),
            in_flight: DashMap::new(),
        })
    }

    pub fn position_rows(&self, key: &str) -> Option<Arc<Vec<ProjectionRow>>> {
        self.by_position.get(key)?.fresh(self.ttl)
    }

    pub fn put_position_rows(&self, key: String, rows: Arc<Vec<ProjectionRow>>) {
        let ttl = self.ttl;
        self.by_position.retain(|_, e| e.built_at.elapsed() < ttl);
        self.by_position.insert(key, CacheEntry::new(rows));
    }

    pub fn id_row(&self, key: &str) -> Option<ProjectionRow> {
        self.by_id.get(key)?.fresh(self.ttl)
    }

    pub fn put_id_row(&self, key: String, row: ProjectionRow) {
        let ttl = self.ttl;
        self.by_id.retain(|_, e| e.built_at.elapsed() < ttl);
        self.by_id.insert(key, CacheEntry::new(row));
    }

    pub fn roster(&self) -> Option<Arc<Vec<Player>>> {
        let guard = self.roster.read().ok()?;
        (*guard).as_ref()?.fresh(self.ttl)
    }

    pub fn put_roster(&self, players: Arc<Vec<Player>>) {
        if let Ok(mut guard) = self.roster.write() {
            *guard = Some(CacheEntry::new(players));
        }
    }

    /// Waits for the rebuild lock on `key`. Hold the guard across
    /// check-build-write so only one task rebuilds a key at a time; waiters
    /// re-check the cache after acquiring.
    pub async fn enter(&self, key: &str) -> FlightGuard<'_> {
        let mutex = Arc::clone(
            self.in_flight
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        );
        let lock = mutex.lock_owned().await;
        FlightGuard {
            store: self,
            key: key.to_string(),
            lock: Some(lock),
        }
    }

    pub fn position_entry_count(&self) -> usize {
        self.by_position.len()
    }

    pub fn id_entry_count(&self) -> usize {
        self.by_id.len()
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Stored rows for `key` regardless of age.
    #[cfg(test)]
    pub fn position_entry(&self, key: &str) -> Option<Arc<Vec<ProjectionRow>>> {
        self.by_position.get(key).map(|e| Arc::clone(&e.payload))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
