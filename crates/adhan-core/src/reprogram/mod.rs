//! Cancel-then-install reprogramming of the alarm boundary.
//!
//! [`ReprogramCoordinator::reprogram_all`] is the only path that mutates the
//! boundary. One run is in flight at a time. Requests that arrive while a run
//! is executing park their snapshot as the latest pending one; when the gate
//! opens exactly one follow-up run executes with that snapshot and every
//! parked caller receives its record.
//! [`ReprogramCoordinator::reprogram_from_store`] parks nothing and reads the
//! persisted snapshot only once it holds the gate.
//!
//! Errors never escape: every call ends in a terminal [`ReprogramRun`], which
//! is also appended to the diagnostics sink before the gate is released.

mod retry;
mod run;

pub use retry::RetryPolicy;
pub use run::{ReprogramRun, RunError, RunTrigger};

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::boundary::{AlarmBoundary, InstallOutcome};
use crate::clock::Clock;
use crate::diagnostics::DiagnosticsSink;
use crate::error::StoreError;
use crate::schedule::{ScheduleComputer, ScheduleIntent};
use crate::settings::{Settings, SettingsStore};
use crate::storage::{HorizonConfig, KeyValueStore, LAST_REPROGRAMMED_AT_KEY};

/// Snapshot waiting for the gate.
struct Queue {
    pending: Option<(Settings, RunTrigger)>,
    /// Tickets handed out so far.
    requested: u64,
}

/// Snapshot claimed by the gate holder. Put back if the run is dropped
/// before it finishes, unless a newer one was parked meanwhile.
struct Claim<'a> {
    queue: &'a Mutex<Queue>,
    snapshot: Option<(Settings, RunTrigger)>,
    /// Highest ticket the run answers for.
    covers: u64,
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
            if queue.pending.is_none() {
                queue.pending = Some(snapshot);
            }
        }
    }
}

/// State owned by whoever holds the run gate.
struct Gate {
    /// Highest ticket covered by a finished run.
    completed: u64,
    served: Option<ReprogramRun>,
}

pub struct ReprogramCoordinator {
    computer: ScheduleComputer,
    boundary: Arc<dyn AlarmBoundary>,
    store: Arc<dyn KeyValueStore>,
    settings_store: SettingsStore,
    diagnostics: Arc<dyn DiagnosticsSink>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
    horizon: HorizonConfig,
    bucket_threshold: u32,
    gate: tokio::sync::Mutex<Gate>,
    queue: Mutex<Queue>,
    last_run: Mutex<Option<ReprogramRun>>,
}

impl ReprogramCoordinator {
    pub fn new(
        computer: ScheduleComputer,
        boundary: Arc<dyn AlarmBoundary>,
        store: Arc<dyn KeyValueStore>,
        diagnostics: Arc<dyn DiagnosticsSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            computer,
            boundary,
            settings_store: SettingsStore::new(Arc::clone(&store)),
            store,
            diagnostics,
            clock,
            retry: RetryPolicy::default(),
            horizon: HorizonConfig::default(),
            bucket_threshold: 5,
            gate: tokio::sync::Mutex::new(Gate {
                completed: 0,
                served: None,
            }),
            queue: Mutex::new(Queue {
                pending: None,
                requested: 0,
            }),
            last_run: Mutex::new(None),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_horizon(mut self, horizon: HorizonConfig) -> Self {
        self.horizon = horizon;
        self
    }

    /// Cached days farther than `threshold` location buckets from a new
    /// snapshot are dropped before computing.
    pub fn with_bucket_threshold(mut self, threshold: u32) -> Self {
        self.bucket_threshold = threshold;
        self
    }

    pub fn computer(&self) -> &ScheduleComputer {
        &self.computer
    }

    pub fn horizon(&self) -> &HorizonConfig {
        &self.horizon
    }

    /// Most recent run, including externally recorded ones.
    pub fn last_run(&self) -> Option<ReprogramRun> {
        self.last_run
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Time of the last successful run, as persisted.
    ///
    /// # Errors
    /// Returns an error if the store fails or holds a malformed timestamp.
    pub fn last_reprogrammed_at(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        let Some(raw) = self.store.get(LAST_REPROGRAMMED_AT_KEY)? else {
            return Ok(None);
        };
        DateTime::parse_from_rfc3339(&raw)
            .map(|t| Some(t.with_timezone(&Utc)))
            .map_err(|e| StoreError::Corrupt {
                key: LAST_REPROGRAMMED_AT_KEY.into(),
                message: e.to_string(),
            })
    }

    /// Cancel every alarm and install the schedule for `settings`.
    pub async fn reprogram_all(&self, settings: Settings, trigger: RunTrigger) -> ReprogramRun {
        self.run_gated(Some(settings), trigger).await
    }

    /// Reprogram from the persisted settings snapshot.
    ///
    /// The snapshot is read only once the gate is held, so a run already in
    /// flight or a newer snapshot parked behind it always wins over what the
    /// store held when this was called. Without a stored snapshot the run
    /// fails with [`RunError::NoSettings`].
    pub async fn reprogram_from_store(&self, trigger: RunTrigger) -> ReprogramRun {
        self.run_gated(None, trigger).await
    }

    async fn run_gated(&self, snapshot: Option<Settings>, trigger: RunTrigger) -> ReprogramRun {
        let ticket = {
            let mut queue = self.lock_queue();
            queue.requested += 1;
            if let Some(settings) = &snapshot {
                queue.pending = Some((settings.clone(), trigger));
            }
            queue.requested
        };

        let mut gate = self.gate.lock().await;
        if gate.completed >= ticket {
            if let Some(run) = &gate.served {
                debug!(run_id = %run.id, "request coalesced into follow-up run");
                return run.clone();
            }
        }

        let mut claim = {
            let mut queue = self.lock_queue();
            Claim {
                queue: &self.queue,
                snapshot: queue.pending.take(),
                covers: queue.requested,
            }
        };
        let request = claim
            .snapshot
            .clone()
            .or_else(|| snapshot.map(|settings| (settings, trigger)));

        let run = match request {
            Some((settings, trigger)) => self.execute(&settings, trigger).await,
            None => self.execute_from_store(trigger).await,
        };
        claim.snapshot = None;

        gate.completed = gate.completed.max(claim.covers);
        gate.served = Some(run.clone());
        run
    }

    fn lock_queue(&self) -> std::sync::MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn execute_from_store(&self, trigger: RunTrigger) -> ReprogramRun {
        match self.settings_store.load() {
            Ok(Some(settings)) => return self.execute(&settings, trigger).await,
            Ok(None) => warn!(%trigger, "no settings snapshot to reprogram from"),
            Err(e) => warn!(%trigger, error = %e, "settings snapshot unreadable"),
        }
        let run = ReprogramRun::failed(trigger, self.clock.now(), RunError::NoSettings);
        self.record(run.clone());
        run
    }

    /// Append a run produced outside the pipeline, under the same
    /// single-writer rule as regular runs.
    pub async fn record_external(&self, run: ReprogramRun) {
        let _gate = self.gate.lock().await;
        self.record(run);
    }

    fn record(&self, run: ReprogramRun) {
        self.diagnostics.append(run.clone());
        *self.last_run.lock().unwrap_or_else(PoisonError::into_inner) = Some(run);
    }

    async fn execute(&self, settings: &Settings, trigger: RunTrigger) -> ReprogramRun {
        let started = Instant::now();
        let ran_at = self.clock.now();
        let horizon_days = self.horizon.days_for(settings.tier);
        info!(%trigger, horizon_days, boundary = self.boundary.name(), "reprogram started");

        let mut run = ReprogramRun {
            id: Uuid::new_v4(),
            trigger,
            ran_at,
            success: false,
            duration_ms: 0,
            intent_count: 0,
            installed_count: 0,
            truncated: false,
            error: None,
        };
        if let Err(error) = self.program(settings, horizon_days, ran_at, &mut run).await {
            run.success = false;
            run.error = Some(error);
        }
        run.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match (&run.error, run.success) {
            (None, _) => info!(
                run_id = %run.id,
                intents = run.intent_count,
                installed = run.installed_count,
                duration_ms = run.duration_ms,
                "reprogram finished"
            ),
            (Some(error), true) => warn!(
                run_id = %run.id,
                intents = run.intent_count,
                installed = run.installed_count,
                %error,
                "reprogram finished with rejected intents"
            ),
            (Some(error), false) => warn!(run_id = %run.id, %error, "reprogram failed"),
        }

        self.record(run.clone());
        run
    }

    async fn program(
        &self,
        settings: &Settings,
        horizon_days: u32,
        now: DateTime<Utc>,
        run: &mut ReprogramRun,
    ) -> Result<(), RunError> {
        let cache = self.computer.cache();
        let dropped = cache.invalidate_for(settings, self.bucket_threshold);
        if dropped > 0 {
            debug!(dropped, "invalidated cached days for new settings");
        }

        let schedule = self.computer.compute(settings, horizon_days, now)?;
        run.intent_count = schedule.intents.len();
        run.truncated = schedule.truncated;
        if schedule.truncated {
            warn!(
                raw = schedule.raw_count,
                kept = schedule.intents.len(),
                "schedule truncated to boundary limit"
            );
        }
        if let Ok(today) = settings.local_date(now) {
            cache.prune_before(today - Duration::days(1));
        }
        // The snapshot is valid from here on; keep it for the background job
        // even if the boundary fails below.
        if let Err(e) = self.settings_store.save(settings) {
            warn!(error = %e, "failed to persist settings snapshot");
        }

        self.boundary.cancel_all().await?;
        debug!("cancelled pending alarms");

        let failed = self.install(&schedule.intents, run).await?;
        run.success = schedule.intents.is_empty() || run.installed_count > 0;
        if !failed.is_empty() {
            run.error = Some(RunError::PartialInstallFailure {
                failed: failed.len(),
                intent_ids: failed,
            });
        }

        if run.success {
            if let Err(e) = self.store.set(LAST_REPROGRAMMED_AT_KEY, &now.to_rfc3339()) {
                warn!(error = %e, "failed to persist reprogram watermark");
            }
        }
        Ok(())
    }

    /// Install `intents`, retrying rejected ones individually. Returns the
    /// ids that stayed rejected.
    ///
    /// `run.installed_count` tracks what the boundary accepted so far, so it
    /// stays accurate when a retry aborts with a boundary error.
    async fn install(
        &self,
        intents: &[ScheduleIntent],
        run: &mut ReprogramRun,
    ) -> Result<Vec<String>, RunError> {
        if intents.is_empty() {
            return Ok(Vec::new());
        }
        let outcomes = self.boundary.schedule_batch(intents).await?;
        let mut rejected = rejected_in(intents.iter(), outcomes);
        run.installed_count = intents.len() - rejected.len();

        for attempt in 1..=self.retry.max_attempts {
            if rejected.is_empty() {
                break;
            }
            let delay = self.retry.delay_for(attempt);
            debug!(
                attempt,
                remaining = rejected.len(),
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "retrying rejected intents"
            );
            tokio::time::sleep(delay).await;

            let mut still_rejected = Vec::new();
            for intent in rejected {
                let outcomes = self
                    .boundary
                    .schedule_batch(std::slice::from_ref(intent))
                    .await?;
                let missing = rejected_in(std::iter::once(intent), outcomes);
                if missing.is_empty() {
                    run.installed_count += 1;
                }
                still_rejected.extend(missing);
            }
            rejected = still_rejected;
        }

        Ok(rejected.into_iter().map(|i| i.id.clone()).collect())
    }
}

/// Intents without an `Installed` outcome.
fn rejected_in<'a>(
    intents: impl Iterator<Item = &'a ScheduleIntent>,
    outcomes: Vec<InstallOutcome>,
) -> Vec<&'a ScheduleIntent> {
    let accepted: HashSet<String> = outcomes
        .into_iter()
        .filter(InstallOutcome::is_installed)
        .map(|o| o.intent_id)
        .collect();
    intents.filter(|i| !accepted.contains(&i.id)).collect()
}
