use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{BoundaryError, EngineError};
use crate::prayer::CalculationMethod;

/// What asked for a reprogram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunTrigger {
    /// A relevant settings change, after debouncing.
    Settings,
    /// The OS background refresh entry point.
    Background,
    /// An explicit request (CLI, app start).
    Manual,
}

impl RunTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunTrigger::Settings => "settings",
            RunTrigger::Background => "background",
            RunTrigger::Manual => "manual",
        }
    }
}

impl std::fmt::Display for RunTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured failure recorded on a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunError {
    InvalidLocation { message: String },
    UnsupportedCalcMethod { method: CalculationMethod },
    BoundaryUnavailable { message: String },
    /// Some intents stayed rejected after every retry.
    PartialInstallFailure { failed: usize, intent_ids: Vec<String> },
    /// Nothing to schedule from: no settings snapshot was ever persisted.
    NoSettings,
    DeadlineExceeded { deadline_ms: u64 },
}

impl RunError {
    /// Short machine-readable reason, as shown in diagnostics.
    pub fn reason(&self) -> &'static str {
        match self {
            RunError::InvalidLocation { .. } => "invalid-location",
            RunError::UnsupportedCalcMethod { .. } => "unsupported-calc-method",
            RunError::BoundaryUnavailable { .. } => "boundary-unavailable",
            RunError::PartialInstallFailure { .. } => "partial-install-failure",
            RunError::NoSettings => "no-settings",
            RunError::DeadlineExceeded { .. } => "deadline-exceeded",
        }
    }
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunError::InvalidLocation { message } | RunError::BoundaryUnavailable { message } => {
                write!(f, "{}: {message}", self.reason())
            }
            RunError::UnsupportedCalcMethod { method } => write!(f, "{}: {method}", self.reason()),
            RunError::PartialInstallFailure { failed, .. } => {
                write!(f, "{}: {failed} intent(s) not installed", self.reason())
            }
            RunError::NoSettings => f.write_str(self.reason()),
            RunError::DeadlineExceeded { deadline_ms } => {
                write!(f, "{}: {deadline_ms}ms", self.reason())
            }
        }
    }
}

impl From<EngineError> for RunError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::InvalidLocation(message) => RunError::InvalidLocation { message },
            EngineError::UnsupportedMethod(method) => RunError::UnsupportedCalcMethod { method },
        }
    }
}

impl From<BoundaryError> for RunError {
    fn from(err: BoundaryError) -> Self {
        match err {
            BoundaryError::Unavailable(message) => RunError::BoundaryUnavailable { message },
        }
    }
}

/// Record of one coordinator invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReprogramRun {
    pub id: Uuid,
    pub trigger: RunTrigger,
    pub ran_at: DateTime<Utc>,
    pub success: bool,
    pub duration_ms: u64,
    /// Intents handed to the boundary.
    pub intent_count: usize,
    pub installed_count: usize,
    pub truncated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RunError>,
}

impl ReprogramRun {
    /// A run that failed before touching the boundary.
    pub fn failed(trigger: RunTrigger, ran_at: DateTime<Utc>, error: RunError) -> Self {
        Self {
            id: Uuid::new_v4(),
            trigger,
            ran_at,
            success: false,
            duration_ms: 0,
            intent_count: 0,
            installed_count: 0,
            truncated: false,
            error: Some(error),
        }
    }

    pub fn reason(&self) -> Option<&'static str> {
        self.error.as_ref().map(RunError::reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn error_serializes_with_kind_tag() {
        let err = RunError::PartialInstallFailure {
            failed: 2,
            intent_ids: vec!["a".into(), "b".into()],
        };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "partial_install_failure");
        assert_eq!(json["failed"], 2);
        let back: RunError = serde_json::from_value(json).unwrap();
        assert_eq!(back, err);
    }

    #[test]
    fn failed_run_has_no_intents() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let run = ReprogramRun::failed(RunTrigger::Background, at, RunError::NoSettings);
        assert!(!run.success);
        assert_eq!(run.intent_count, 0);
        assert_eq!(run.reason(), Some("no-settings"));
    }

    #[test]
    fn engine_errors_map_to_run_errors() {
        let err: RunError = EngineError::UnsupportedMethod(CalculationMethod::MoonsightingCommittee).into();
        assert_eq!(err.reason(), "unsupported-calc-method");
        let err: RunError = EngineError::InvalidLocation("polar night".into()).into();
        assert_eq!(err.to_string(), "invalid-location: polar night");
    }
}
