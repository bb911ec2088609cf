//! Native alarm/notification boundary.
//!
//! The engine only ever talks to [`AlarmBoundary`]. Platform bindings
//! implement it and are picked when the [`EngineContext`](crate::EngineContext)
//! is composed; nothing in the core inspects the platform.

mod memory;
mod outbox;

pub use memory::MemoryBoundary;
pub use outbox::OutboxBoundary;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::BoundaryError;
use crate::schedule::ScheduleIntent;

/// Per-intent result of an install call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InstallStatus {
    Installed,
    Rejected { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallOutcome {
    pub intent_id: String,
    #[serde(flatten)]
    pub status: InstallStatus,
}

impl InstallOutcome {
    pub fn installed(intent_id: impl Into<String>) -> Self {
        Self {
            intent_id: intent_id.into(),
            status: InstallStatus::Installed,
        }
    }

    pub fn rejected(intent_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            intent_id: intent_id.into(),
            status: InstallStatus::Rejected {
                reason: reason.into(),
            },
        }
    }

    pub fn is_installed(&self) -> bool {
        self.status == InstallStatus::Installed
    }
}

/// Contract of the native alarm subsystem.
#[async_trait]
pub trait AlarmBoundary: Send + Sync {
    /// Stable identifier for logs (e.g. `memory`, `outbox`).
    fn name(&self) -> &'static str;

    /// Most alarms the platform keeps pending at once.
    fn capacity(&self) -> usize;

    /// Remove every alarm this app has installed.
    async fn cancel_all(&self) -> Result<(), BoundaryError>;

    /// Install `intents`, returning one outcome per intent.
    ///
    /// An intent missing from the returned list is treated as rejected.
    async fn schedule_batch(
        &self,
        intents: &[ScheduleIntent],
    ) -> Result<Vec<InstallOutcome>, BoundaryError>;
}
