//! Debounced reaction to settings changes.
//!
//! The listener watches a [`SettingsSource`] and classifies every published
//! snapshot against the last one it acted on. Presentation-only edits are
//! ignored. Relevant edits (re)arm a debounce timer; when it fires, the
//! newest snapshot goes to [`ReprogramCoordinator::reprogram_all`]. A snapshot
//! replaced before the timer fires is counted as debounced.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use super::{Settings, SettingsSource};
use crate::reprogram::{ReprogramCoordinator, RunTrigger};

/// Counters of listener dispositions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ListenerStats {
    pub relevant: u64,
    pub ignored: u64,
    /// Relevant snapshots superseded inside the debounce window.
    pub debounced: u64,
    pub runs: u64,
}

#[derive(Debug, Default)]
struct Counters {
    relevant: AtomicU64,
    ignored: AtomicU64,
    debounced: AtomicU64,
    runs: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> ListenerStats {
        ListenerStats {
            relevant: self.relevant.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
            debounced: self.debounced.load(Ordering::Relaxed),
            runs: self.runs.load(Ordering::Relaxed),
        }
    }
}

pub struct SettingsChangeListener {
    coordinator: Arc<ReprogramCoordinator>,
    debounce: Duration,
    counters: Arc<Counters>,
}

impl SettingsChangeListener {
    pub fn new(coordinator: Arc<ReprogramCoordinator>, debounce: Duration) -> Self {
        Self {
            coordinator,
            debounce,
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn stats(&self) -> ListenerStats {
        self.counters.snapshot()
    }

    /// Start watching `source` on the current tokio runtime.
    ///
    /// The snapshot current at subscription time is the baseline and does
    /// not trigger a run by itself.
    pub fn spawn(&self, source: &dyn SettingsSource) -> ListenerHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(watch_loop(
            source.subscribe(),
            shutdown_rx,
            Arc::clone(&self.coordinator),
            self.debounce,
            Arc::clone(&self.counters),
        ));
        ListenerHandle {
            shutdown: Some(shutdown_tx),
            task,
            counters: Arc::clone(&self.counters),
        }
    }
}

/// Running listener task.
pub struct ListenerHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
    counters: Arc<Counters>,
}

impl ListenerHandle {
    pub fn stats(&self) -> ListenerStats {
        self.counters.snapshot()
    }

    /// Stop the listener. A change still waiting for its debounce window is
    /// flushed to the coordinator first.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let _ = (&mut self.task).await;
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        if self.shutdown.is_some() {
            self.task.abort();
        }
    }
}

async fn watch_loop(
    mut rx: tokio::sync::watch::Receiver<Option<Settings>>,
    mut shutdown: oneshot::Receiver<()>,
    coordinator: Arc<ReprogramCoordinator>,
    debounce: Duration,
    counters: Arc<Counters>,
) {
    let mut applied: Option<Settings> = rx.borrow_and_update().clone();
    let mut pending: Option<Settings> = None;
    let mut deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            changed = rx.changed() => {
                if changed.is_err() {
                    debug!("settings source closed");
                    break;
                }
                let Some(next) = rx.borrow_and_update().clone() else {
                    continue;
                };
                let baseline = pending.as_ref().or(applied.as_ref());
                if baseline.is_some_and(|current| !current.affects_schedule(&next)) {
                    counters.ignored.fetch_add(1, Ordering::Relaxed);
                    debug!("settings change does not affect the schedule");
                    // Same schedule; keep the newest full snapshot so the next
                    // run persists it.
                    match pending.as_mut() {
                        Some(waiting) => *waiting = next,
                        None => applied = Some(next),
                    }
                    continue;
                }
                counters.relevant.fetch_add(1, Ordering::Relaxed);
                if pending.replace(next).is_some() {
                    counters.debounced.fetch_add(1, Ordering::Relaxed);
                    debug!("pending settings change superseded");
                }
                deadline = Some(Instant::now() + debounce);
            }
            _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                deadline = None;
                if let Some(settings) = pending.take() {
                    fire(&coordinator, &counters, &settings).await;
                    applied = Some(settings);
                }
            }
        }
    }

    if let Some(settings) = pending.take() {
        fire(&coordinator, &counters, &settings).await;
    }
}

async fn fire(coordinator: &ReprogramCoordinator, counters: &Counters, settings: &Settings) {
    counters.runs.fetch_add(1, Ordering::Relaxed);
    let run = coordinator
        .reprogram_all(settings.clone(), RunTrigger::Settings)
        .await;
    info!(run_id = %run.id, success = run.success, "settings change applied");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::MemoryBoundary;
    use crate::cache::TimeWindowCache;
    use crate::clock::ManualClock;
    use crate::diagnostics::{DiagnosticsLog, DiagnosticsSink};
    use crate::astro::SolarEngine;
    use crate::prayer::{CalculationMethod, Coordinates};
    use crate::reprogram::RetryPolicy;
    use crate::schedule::ScheduleComputer;
    use crate::settings::{SettingsStore, WatchSettingsSource};
    use crate::storage::MemoryStore;
    use chrono::{TimeZone, Utc};

    fn coordinator(log: Arc<DiagnosticsLog>) -> Arc<ReprogramCoordinator> {
        coordinator_over(log, Arc::new(MemoryStore::new()))
    }

    fn coordinator_over(log: Arc<DiagnosticsLog>, store: Arc<MemoryStore>) -> Arc<ReprogramCoordinator> {
        let cache = Arc::new(TimeWindowCache::new(Arc::new(SolarEngine), 16));
        Arc::new(
            ReprogramCoordinator::new(
                ScheduleComputer::new(cache, 64),
                Arc::new(MemoryBoundary::new(64)),
                store,
                log,
                Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())),
            )
            .with_retry(RetryPolicy::none()),
        )
    }

    fn settings() -> Settings {
        Settings::new(
            Coordinates::new(21.4225, 39.8262).unwrap(),
            CalculationMethod::UmmAlQura,
        )
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn presentation_changes_are_ignored() {
        let log = Arc::new(DiagnosticsLog::new(50));
        let source = WatchSettingsSource::new(Some(settings()));
        let listener = SettingsChangeListener::new(coordinator(log.clone()), Duration::from_millis(500));
        let handle = listener.spawn(&source);
        settle().await;

        let mut s = settings();
        s.presentation.dark_mode = !s.presentation.dark_mode;
        s.presentation.language = "ar".into();
        source.publish(s);
        settle().await;
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(listener.stats().ignored, 1);
        assert_eq!(listener.stats().runs, 0);
        assert!(log.list(10).is_empty());
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn presentation_edit_rides_along_with_pending_change() {
        let log = Arc::new(DiagnosticsLog::new(50));
        let kv = Arc::new(MemoryStore::new());
        let source = WatchSettingsSource::new(Some(settings()));
        let listener = SettingsChangeListener::new(
            coordinator_over(log.clone(), kv.clone()),
            Duration::from_millis(500),
        );
        let handle = listener.spawn(&source);
        settle().await;

        let mut relevant = settings();
        relevant.reminders_enabled = true;
        source.publish(relevant.clone());
        settle().await;

        let mut cosmetic = relevant;
        cosmetic.presentation.language = "ar".into();
        source.publish(cosmetic);
        settle().await;
        tokio::time::sleep(Duration::from_secs(1)).await;
        settle().await;

        let stats = handle.stats();
        assert_eq!(stats.ignored, 1);
        assert_eq!(stats.debounced, 0);
        assert_eq!(stats.runs, 1);
        let saved = SettingsStore::new(kv).load().unwrap().unwrap();
        assert!(saved.reminders_enabled);
        assert_eq!(saved.presentation.language, "ar");
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn changes_inside_window_collapse_into_one_run() {
        let log = Arc::new(DiagnosticsLog::new(50));
        let source = WatchSettingsSource::new(Some(settings()));
        let listener = SettingsChangeListener::new(coordinator(log.clone()), Duration::from_millis(500));
        let handle = listener.spawn(&source);
        settle().await;

        let mut first = settings();
        first.reminders_enabled = true;
        source.publish(first.clone());
        settle().await;
        tokio::time::sleep(Duration::from_millis(200)).await;

        let mut second = first;
        second.reminder_offset_minutes = 25;
        source.publish(second);
        settle().await;
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(handle.stats().runs, 0);

        tokio::time::sleep(Duration::from_millis(200)).await;
        settle().await;
        let stats = handle.stats();
        assert_eq!(stats.relevant, 2);
        assert_eq!(stats.debounced, 1);
        assert_eq!(stats.runs, 1);
        assert_eq!(log.list(10).len(), 1);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_flushes_pending_change() {
        let log = Arc::new(DiagnosticsLog::new(50));
        let source = WatchSettingsSource::new(Some(settings()));
        let listener = SettingsChangeListener::new(coordinator(log.clone()), Duration::from_secs(60));
        let handle = listener.spawn(&source);
        settle().await;

        let mut s = settings();
        s.madhab = crate::prayer::Madhab::Hanafi;
        source.publish(s);
        settle().await;
        handle.shutdown().await;

        assert_eq!(listener.stats().runs, 1);
        assert_eq!(log.list(10).len(), 1);
    }
}
