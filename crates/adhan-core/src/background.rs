//! OS-triggered background refresh.
//!
//! The host wakes the process opportunistically (iOS background fetch,
//! Android WorkManager, a systemd timer for the CLI) and calls
//! [`BackgroundRefreshJob::run`]. The job re-runs the coordinator from the
//! persisted settings snapshot so the installed window keeps rolling forward
//! even when the app is never opened.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::reprogram::{ReprogramCoordinator, ReprogramRun, RunError, RunTrigger};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Idle,
    Running,
    Success,
    Failed,
}

/// Answer reported back to the host scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundFetchResult {
    /// Alarms were reinstalled.
    NewData,
    /// Nothing to do, or skipped because a run was already in progress.
    NoData,
    Failed,
}

impl BackgroundFetchResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackgroundFetchResult::NewData => "new_data",
            BackgroundFetchResult::NoData => "no_data",
            BackgroundFetchResult::Failed => "failed",
        }
    }
}

#[derive(Debug)]
struct JobStatus {
    state: JobState,
    last_outcome: Option<JobState>,
    last_completed: Option<DateTime<Utc>>,
}

pub struct BackgroundRefreshJob {
    coordinator: Arc<ReprogramCoordinator>,
    clock: Arc<dyn Clock>,
    deadline: Duration,
    min_interval: Duration,
    status: Mutex<JobStatus>,
}

/// Resets the job to Idle if the run future is dropped mid-flight.
struct RunningGuard<'a>(&'a Mutex<JobStatus>);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        let mut status = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if status.state == JobState::Running {
            status.state = JobState::Idle;
        }
    }
}

impl BackgroundRefreshJob {
    pub fn new(
        coordinator: Arc<ReprogramCoordinator>,
        clock: Arc<dyn Clock>,
        deadline: Duration,
        min_interval: Duration,
    ) -> Self {
        Self {
            coordinator,
            clock,
            deadline,
            min_interval,
            status: Mutex::new(JobStatus {
                state: JobState::Idle,
                last_outcome: None,
                last_completed: None,
            }),
        }
    }

    pub fn state(&self) -> JobState {
        self.lock().state
    }

    /// Success or Failed of the most recent completed run.
    pub fn last_outcome(&self) -> Option<JobState> {
        self.lock().last_outcome
    }

    /// Earliest time the host should wake the job again.
    pub fn earliest_next_begin(&self) -> DateTime<Utc> {
        let interval = chrono::Duration::from_std(self.min_interval).unwrap_or(chrono::Duration::zero());
        match self.lock().last_completed {
            Some(at) => at + interval,
            None => self.clock.now(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, JobStatus> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Entry point for the host scheduler.
    pub async fn run(&self) -> BackgroundFetchResult {
        {
            let mut status = self.lock();
            if status.state == JobState::Running {
                debug!("background refresh already running; skipping");
                return BackgroundFetchResult::NoData;
            }
            status.state = JobState::Running;
        }
        let guard = RunningGuard(&self.status);

        let result = self.refresh().await;

        {
            let mut status = self.lock();
            let outcome = if result == BackgroundFetchResult::Failed {
                JobState::Failed
            } else {
                JobState::Success
            };
            status.last_outcome = Some(outcome);
            status.last_completed = Some(self.clock.now());
            status.state = JobState::Idle;
        }
        drop(guard);

        info!(result = result.as_str(), "background refresh finished");
        result
    }

    async fn refresh(&self) -> BackgroundFetchResult {
        // The coordinator reads the snapshot under its gate; a missing one
        // comes back as a recorded no-settings run.
        let work = self.coordinator.reprogram_from_store(RunTrigger::Background);
        match tokio::time::timeout(self.deadline, work).await {
            Ok(run) if !run.success => BackgroundFetchResult::Failed,
            Ok(run) if run.intent_count == 0 => BackgroundFetchResult::NoData,
            Ok(_) => BackgroundFetchResult::NewData,
            Err(_) => {
                let deadline_ms = u64::try_from(self.deadline.as_millis()).unwrap_or(u64::MAX);
                warn!(deadline_ms, "background refresh hit the platform deadline");
                let run = ReprogramRun::failed(
                    RunTrigger::Background,
                    self.clock.now(),
                    RunError::DeadlineExceeded { deadline_ms },
                );
                self.coordinator.record_external(run).await;
                BackgroundFetchResult::Failed
            }
        }
    }
}
