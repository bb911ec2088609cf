//! Shared fakes for the integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use adhan_core::boundary::{AlarmBoundary, InstallOutcome, MemoryBoundary};
use adhan_core::error::{BoundaryError, EngineError};
use adhan_core::prayer::{CalculationMethod, Coordinates, Madhab, PrayerSet};
use adhan_core::schedule::ScheduleIntent;
use adhan_core::{
    AstronomicalEngine, DiagnosticsLog, ManualClock, ReprogramCoordinator, RetryPolicy,
    ScheduleComputer, Settings, TimeWindowCache,
};
use adhan_core::storage::{HorizonConfig, MemoryStore};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};

// ============================================================================
// Engines
// ============================================================================

/// 05:00 / 07:00 / 12:00 / 15:00 / 17:00 / 19:00 UTC every day.
pub struct FixedEngine;

impl AstronomicalEngine for FixedEngine {
    fn compute_prayer_times(
        &self,
        date: NaiveDate,
        _coords: Coordinates,
        _method: CalculationMethod,
        _madhab: Madhab,
    ) -> Result<PrayerSet, EngineError> {
        let midnight = Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap());
        let h = |x: i64| midnight + chrono::Duration::hours(x);
        Ok(PrayerSet::new(date, h(5), h(7), h(12), h(15), h(17), h(19))?)
    }
}

/// Delegates to another engine and remembers every request.
pub struct RecordingEngine {
    inner: Arc<dyn AstronomicalEngine>,
    calls: Mutex<Vec<(NaiveDate, CalculationMethod)>>,
}

impl RecordingEngine {
    pub fn new(inner: Arc<dyn AstronomicalEngine>) -> Self {
        Self {
            inner,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(NaiveDate, CalculationMethod)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn methods(&self) -> HashSet<CalculationMethod> {
        self.calls().into_iter().map(|(_, m)| m).collect()
    }
}

impl AstronomicalEngine for RecordingEngine {
    fn compute_prayer_times(
        &self,
        date: NaiveDate,
        coords: Coordinates,
        method: CalculationMethod,
        madhab: Madhab,
    ) -> Result<PrayerSet, EngineError> {
        self.calls.lock().unwrap().push((date, method));
        self.inner.compute_prayer_times(date, coords, method, madhab)
    }
}

/// Blocks every computation until [`LatchedEngine::release`] is called.
/// Needs a multi-threaded runtime since the engine is synchronous.
pub struct LatchedEngine {
    inner: Arc<dyn AstronomicalEngine>,
    open: Mutex<bool>,
    opened: Condvar,
    entered: AtomicBool,
}

impl LatchedEngine {
    pub fn new(inner: Arc<dyn AstronomicalEngine>) -> Self {
        Self {
            inner,
            open: Mutex::new(false),
            opened: Condvar::new(),
            entered: AtomicBool::new(false),
        }
    }

    /// Whether a computation is waiting (or has waited) on the latch.
    pub fn entered(&self) -> bool {
        self.entered.load(Ordering::SeqCst)
    }

    pub fn release(&self) {
        *self.open.lock().unwrap() = true;
        self.opened.notify_all();
    }
}

impl AstronomicalEngine for LatchedEngine {
    fn compute_prayer_times(
        &self,
        date: NaiveDate,
        coords: Coordinates,
        method: CalculationMethod,
        madhab: Madhab,
    ) -> Result<PrayerSet, EngineError> {
        self.entered.store(true, Ordering::SeqCst);
        let mut open = self.open.lock().unwrap();
        while !*open {
            open = self.opened.wait(open).unwrap();
        }
        drop(open);
        self.inner.compute_prayer_times(date, coords, method, madhab)
    }
}

// ============================================================================
// Boundaries
// ============================================================================

/// Memory boundary that rejects chosen ids, optionally only for the first few
/// install attempts, and can be slowed down.
pub struct FlakyBoundary {
    inner: MemoryBoundary,
    reject: Mutex<HashSet<String>>,
    /// Install attempts per id that are rejected before succeeding.
    /// `None` rejects forever.
    transient_failures: Option<u32>,
    attempts: Mutex<Vec<String>>,
    delay: Duration,
    /// Install batches accepted before the boundary reports `Unavailable`.
    revoke_after: Option<usize>,
    batches: Mutex<usize>,
}

impl FlakyBoundary {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: MemoryBoundary::new(capacity),
            reject: Mutex::new(HashSet::new()),
            transient_failures: None,
            attempts: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
            revoke_after: None,
            batches: Mutex::new(0),
        }
    }

    pub fn rejecting(self, ids: impl IntoIterator<Item = String>) -> Self {
        self.reject.lock().unwrap().extend(ids);
        self
    }

    pub fn transient(mut self, failures: u32) -> Self {
        self.transient_failures = Some(failures);
        self
    }

    /// Fail every install call after the first `batches` ones, as when the
    /// user revokes alarm permission mid-run.
    pub fn revoked_after(mut self, batches: usize) -> Self {
        self.revoke_after = Some(batches);
        self
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn pending(&self) -> Vec<ScheduleIntent> {
        self.inner.pending()
    }

    /// Number of install attempts seen for `id`.
    pub fn attempts_for(&self, id: &str) -> usize {
        self.attempts.lock().unwrap().iter().filter(|a| *a == id).count()
    }

    fn should_reject(&self, id: &str) -> bool {
        if !self.reject.lock().unwrap().contains(id) {
            return false;
        }
        match self.transient_failures {
            None => true,
            Some(n) => self.attempts_for(id) <= n as usize,
        }
    }
}

#[async_trait]
impl AlarmBoundary for FlakyBoundary {
    fn name(&self) -> &'static str {
        "flaky"
    }

    fn capacity(&self) -> usize {
        self.inner.capacity()
    }

    async fn cancel_all(&self) -> Result<(), BoundaryError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.cancel_all().await
    }

    async fn schedule_batch(
        &self,
        intents: &[ScheduleIntent],
    ) -> Result<Vec<InstallOutcome>, BoundaryError> {
        {
            let mut batches = self.batches.lock().unwrap();
            if self.revoke_after.is_some_and(|limit| *batches >= limit) {
                return Err(BoundaryError::Unavailable("permission revoked".into()));
            }
            *batches += 1;
        }
        let mut outcomes = Vec::new();
        for intent in intents {
            self.attempts.lock().unwrap().push(intent.id.clone());
            if self.should_reject(&intent.id) {
                outcomes.push(InstallOutcome::rejected(&intent.id, "alarm limit reached"));
            } else {
                outcomes.extend(self.inner.schedule_batch(std::slice::from_ref(intent)).await?);
            }
        }
        Ok(outcomes)
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub fn paris() -> Coordinates {
    Coordinates::new(48.8566, 2.3522).unwrap()
}

pub fn base_settings() -> Settings {
    Settings::new(
        Coordinates::new(0.0, 0.0).unwrap(),
        CalculationMethod::MuslimWorldLeague,
    )
}

pub fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
}

/// Coordinator over a [`FlakyBoundary`] with a one-day horizon.
pub struct Rig {
    pub coordinator: Arc<ReprogramCoordinator>,
    pub boundary: Arc<FlakyBoundary>,
    pub store: Arc<MemoryStore>,
    pub log: Arc<DiagnosticsLog>,
    pub clock: Arc<ManualClock>,
}

pub fn rig(
    engine: Arc<dyn AstronomicalEngine>,
    boundary: FlakyBoundary,
    retry: RetryPolicy,
    now: DateTime<Utc>,
) -> Rig {
    let boundary = Arc::new(boundary);
    let store = Arc::new(MemoryStore::new());
    let log = Arc::new(DiagnosticsLog::new(50));
    let clock = Arc::new(ManualClock::new(now));
    let cache = Arc::new(TimeWindowCache::new(engine, 32));
    let coordinator = Arc::new(
        ReprogramCoordinator::new(
            ScheduleComputer::new(cache, boundary.capacity()),
            boundary.clone(),
            store.clone(),
            log.clone(),
            clock.clone(),
        )
        .with_retry(retry)
        .with_horizon(HorizonConfig {
            free_days: 1,
            premium_days: 1,
        }),
    );
    Rig {
        coordinator,
        boundary,
        store,
        log,
        clock,
    }
}
