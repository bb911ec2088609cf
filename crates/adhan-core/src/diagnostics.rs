//! Bounded history of reprogram runs.
//!
//! The coordinator is the only writer; tooling reads through
//! [`DiagnosticsSink::list`]. When backed by a key/value store the history is
//! written through on every append so that a later process (or the CLI's
//! `diagnostics` command) sees the same runs.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::warn;

use crate::error::StoreError;
use crate::reprogram::ReprogramRun;
use crate::storage::{KeyValueStore, RUN_HISTORY_KEY};

/// Default number of runs kept.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Append-only run log.
pub trait DiagnosticsSink: Send + Sync {
    fn append(&self, run: ReprogramRun);

    /// Up to `limit` runs, newest first.
    fn list(&self, limit: usize) -> Vec<ReprogramRun>;
}

pub struct DiagnosticsLog {
    capacity: usize,
    runs: Mutex<VecDeque<ReprogramRun>>,
    store: Option<Arc<dyn KeyValueStore>>,
}

impl DiagnosticsLog {
    /// In-memory log keeping at most `capacity` runs.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            runs: Mutex::new(VecDeque::new()),
            store: None,
        }
    }

    /// Log persisted under `reprogram_runs`, seeded from what is already
    /// stored.
    ///
    /// # Errors
    /// Returns an error if the stored history cannot be read or decoded.
    pub fn with_store(capacity: usize, store: Arc<dyn KeyValueStore>) -> Result<Self, StoreError> {
        let mut log = Self::new(capacity);
        let mut runs = load(store.as_ref())?;
        while runs.len() > log.capacity {
            runs.pop_front();
        }
        log.runs = Mutex::new(runs);
        log.store = Some(store);
        Ok(log)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.runs.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn latest(&self) -> Option<ReprogramRun> {
        self.runs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .back()
            .cloned()
    }

    fn persist(&self, runs: &VecDeque<ReprogramRun>) {
        let Some(store) = &self.store else {
            return;
        };
        let result = serde_json::to_string(runs)
            .map_err(|e| StoreError::Corrupt {
                key: RUN_HISTORY_KEY.into(),
                message: e.to_string(),
            })
            .and_then(|json| store.set(RUN_HISTORY_KEY, &json));
        if let Err(e) = result {
            warn!(error = %e, "failed to persist run history");
        }
    }
}

impl DiagnosticsSink for DiagnosticsLog {
    fn append(&self, run: ReprogramRun) {
        let mut runs = self.runs.lock().unwrap_or_else(PoisonError::into_inner);
        runs.push_back(run);
        while runs.len() > self.capacity {
            runs.pop_front();
        }
        self.persist(&runs);
    }

    fn list(&self, limit: usize) -> Vec<ReprogramRun> {
        let runs = self.runs.lock().unwrap_or_else(PoisonError::into_inner);
        runs.iter().rev().take(limit).cloned().collect()
    }
}

/// Read the persisted history, oldest first.
///
/// # Errors
/// Returns an error if the store fails or the stored JSON is not a run list.
pub fn load(store: &dyn KeyValueStore) -> Result<VecDeque<ReprogramRun>, StoreError> {
    let Some(json) = store.get(RUN_HISTORY_KEY)? else {
        return Ok(VecDeque::new());
    };
    serde_json::from_str(&json).map_err(|e| StoreError::Corrupt {
        key: RUN_HISTORY_KEY.into(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reprogram::{RunError, RunTrigger};
    use crate::storage::MemoryStore;
    use chrono::{Duration, TimeZone, Utc};

    fn run(n: i64) -> ReprogramRun {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(n);
        ReprogramRun::failed(RunTrigger::Manual, at, RunError::NoSettings)
    }

    #[test]
    fn oldest_runs_are_trimmed_first() {
        let log = DiagnosticsLog::new(3);
        for n in 0..5 {
            log.append(run(n));
        }
        assert_eq!(log.len(), 3);
        let listed = log.list(10);
        assert_eq!(listed[0].ran_at, run(4).ran_at);
        assert_eq!(listed[2].ran_at, run(2).ran_at);
    }

    #[test]
    fn list_respects_limit() {
        let log = DiagnosticsLog::new(DEFAULT_HISTORY_LIMIT);
        for n in 0..10 {
            log.append(run(n));
        }
        assert_eq!(log.list(4).len(), 4);
        assert_eq!(log.list(0).len(), 0);
        assert_eq!(log.latest().unwrap().ran_at, run(9).ran_at);
    }

    #[test]
    fn history_survives_reopen() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let log = DiagnosticsLog::with_store(5, Arc::clone(&store)).unwrap();
        for n in 0..7 {
            log.append(run(n));
        }
        drop(log);

        let reopened = DiagnosticsLog::with_store(3, store).unwrap();
        assert_eq!(reopened.len(), 3);
        assert_eq!(reopened.latest().unwrap().ran_at, run(6).ran_at);
    }

    #[test]
    fn corrupt_history_is_an_error() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        store.set(RUN_HISTORY_KEY, "{not json").unwrap();
        assert!(matches!(
            DiagnosticsLog::with_store(5, store),
            Err(StoreError::Corrupt { .. })
        ));
    }
}
