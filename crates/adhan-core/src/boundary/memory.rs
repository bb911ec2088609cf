use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use super::{AlarmBoundary, InstallOutcome};
use crate::error::BoundaryError;
use crate::schedule::ScheduleIntent;

/// In-process alarm table keyed by intent id.
///
/// Installing an id that is already pending replaces it, as native alarm
/// managers do for a reused request code.
pub struct MemoryBoundary {
    capacity: usize,
    pending: Mutex<BTreeMap<String, ScheduleIntent>>,
}

impl MemoryBoundary {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            pending: Mutex::new(BTreeMap::new()),
        }
    }

    /// Currently pending alarms, earliest first.
    pub fn pending(&self) -> Vec<ScheduleIntent> {
        let pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let mut out: Vec<_> = pending.values().cloned().collect();
        out.sort_by_key(|i| i.fires_at);
        out
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[async_trait]
impl AlarmBoundary for MemoryBoundary {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    async fn cancel_all(&self) -> Result<(), BoundaryError> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(())
    }

    async fn schedule_batch(
        &self,
        intents: &[ScheduleIntent],
    ) -> Result<Vec<InstallOutcome>, BoundaryError> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let outcomes = intents
            .iter()
            .map(|intent| {
                if pending.len() >= self.capacity && !pending.contains_key(&intent.id) {
                    return InstallOutcome::rejected(&intent.id, "alarm limit reached");
                }
                pending.insert(intent.id.clone(), intent.clone());
                InstallOutcome::installed(&intent.id)
            })
            .collect();
        Ok(outcomes)
    }
}
