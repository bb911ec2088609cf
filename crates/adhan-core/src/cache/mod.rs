//! Memoized daily prayer-time sets.
//!
//! Entries are keyed by `(date, location bucket, method, madhab)`. The map
//! itself sits behind an `RwLock` that is only held for lookups and
//! insert/remove; each key owns a slot with its own mutex, and the engine is
//! called while holding only that slot's lock. Two callers asking for the same
//! missing key therefore compute it once, while callers for other keys never
//! wait on them.
//!
//! Engine failures are returned to the caller and the empty slot is removed,
//! so a bad request never leaves a poisoned entry behind.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::astro::AstronomicalEngine;
use crate::error::EngineError;
use crate::prayer::{CalculationMethod, Coordinates, LocationBucket, Madhab, PrayerSet};
use crate::settings::Settings;

/// Identity of one cached day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub date: NaiveDate,
    pub bucket: LocationBucket,
    pub method: CalculationMethod,
    pub madhab: Madhab,
}

impl CacheKey {
    pub fn new(date: NaiveDate, coords: &Coordinates, method: CalculationMethod, madhab: Madhab) -> Self {
        Self {
            date,
            bucket: coords.bucket(),
            method,
            madhab,
        }
    }
}

/// A computed day and when it was computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub prayers: PrayerSet,
    pub computed_at: DateTime<Utc>,
}

/// Counters for tests and diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Engine invocations, successful or not.
    pub computations: u64,
    pub evictions: u64,
    pub len: usize,
}

#[derive(Default)]
struct Slot {
    cell: Mutex<Option<CacheEntry>>,
    last_used: AtomicU64,
}

/// Size-bounded, per-key serialized cache in front of an [`AstronomicalEngine`].
pub struct TimeWindowCache {
    engine: Arc<dyn AstronomicalEngine>,
    slots: RwLock<HashMap<CacheKey, Arc<Slot>>>,
    capacity: usize,
    clock: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    computations: AtomicU64,
    evictions: AtomicU64,
}

impl TimeWindowCache {
    /// Create a cache holding at most `capacity` days (minimum 1).
    pub fn new(engine: Arc<dyn AstronomicalEngine>, capacity: usize) -> Self {
        Self {
            engine,
            slots: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
            clock: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            computations: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.slots.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Prayer times for `date`, computing and storing them on a miss.
    ///
    /// # Errors
    /// Propagates engine errors; nothing is cached in that case.
    pub fn get(
        &self,
        date: NaiveDate,
        coords: &Coordinates,
        method: CalculationMethod,
        madhab: Madhab,
    ) -> Result<PrayerSet, EngineError> {
        let key = CacheKey::new(date, coords, method, madhab);
        let slot = self.slot_for(&key);

        let mut cell = slot.cell.lock().unwrap_or_else(PoisonError::into_inner);
        slot.last_used
            .store(self.clock.fetch_add(1, Ordering::Relaxed), Ordering::Relaxed);

        if let Some(entry) = cell.as_ref() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(entry.prayers.clone());
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        self.computations.fetch_add(1, Ordering::Relaxed);
        match self.engine.compute_prayer_times(date, *coords, method, madhab) {
            Ok(prayers) => {
                *cell = Some(CacheEntry {
                    key,
                    prayers: prayers.clone(),
                    computed_at: Utc::now(),
                });
                drop(cell);
                self.evict_over_capacity();
                Ok(prayers)
            }
            Err(e) => {
                drop(cell);
                self.discard_if_empty(&key, &slot);
                Err(e)
            }
        }
    }

    /// Remove every entry whose key matches `predicate`. Returns the count.
    pub fn invalidate<F>(&self, predicate: F) -> usize
    where
        F: Fn(&CacheKey) -> bool,
    {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        let before = slots.len();
        slots.retain(|key, _| !predicate(key));
        before - slots.len()
    }

    /// Drop entries that no longer match the settings: a different method or
    /// madhab, or a location bucket more than `bucket_threshold` away.
    pub fn invalidate_for(&self, settings: &Settings, bucket_threshold: u32) -> usize {
        let bucket = settings.coordinates.bucket();
        let removed = self.invalidate(|key| {
            key.method != settings.method
                || key.madhab != settings.madhab
                || key.bucket.distance(&bucket) > bucket_threshold
        });
        if removed > 0 {
            debug!(removed, method = %settings.method, "invalidated cached prayer days");
        }
        removed
    }

    /// Drop days before `date`; they can never be requested again.
    pub fn prune_before(&self, date: NaiveDate) -> usize {
        self.invalidate(|key| key.date < date)
    }

    /// Snapshot of the computed entries, oldest date first.
    pub fn entries(&self) -> Vec<CacheEntry> {
        let slots: Vec<Arc<Slot>> = self
            .slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        let mut entries: Vec<CacheEntry> = slots
            .iter()
            .filter_map(|slot| slot.cell.lock().unwrap_or_else(PoisonError::into_inner).clone())
            .collect();
        entries.sort_by_key(|e| (e.key.date, e.key.bucket, e.key.method, e.key.madhab));
        entries
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            computations: self.computations.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            len: self.len(),
        }
    }

    fn slot_for(&self, key: &CacheKey) -> Arc<Slot> {
        if let Some(slot) = self
            .slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
        {
            return Arc::clone(slot);
        }
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(*key).or_default())
    }

    // Lock order is map then slot; no slot lock is held while taking the map lock.
    fn discard_if_empty(&self, key: &CacheKey, slot: &Arc<Slot>) {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        let same_slot = slots.get(key).is_some_and(|s| Arc::ptr_eq(s, slot));
        let empty = slot
            .cell
            .try_lock()
            .map(|cell| cell.is_none())
            .unwrap_or(false);
        if same_slot && empty {
            slots.remove(key);
        }
    }

    fn evict_over_capacity(&self) {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        while slots.len() > self.capacity {
            // Slots being computed right now are locked and skipped.
            let victim = slots
                .iter()
                .filter(|(_, slot)| slot.cell.try_lock().is_ok())
                .min_by_key(|(_, slot)| slot.last_used.load(Ordering::Relaxed))
                .map(|(key, _)| *key);
            let Some(victim) = victim else { break };
            slots.remove(&victim);
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }
}
