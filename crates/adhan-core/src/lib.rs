//! # Adhan Core Library
//!
//! Prayer-time alert engine. It computes daily prayer times from a location and
//! a calculation convention, and keeps a rolling window of future alerts (adhan,
//! pre-prayer reminders, remembrance reminders) installed in a native alarm
//! subsystem as settings change and time passes.
//!
//! The CLI binary and any platform shell are thin layers over this crate.
//!
//! ## Architecture
//!
//! - **Cache**: per-day prayer times memoized by date, location bucket and method
//! - **Schedule**: pure settings-to-intents computation with stable ids
//! - **Reprogram**: single-flight cancel-then-install cycle with retry
//! - **Settings**: typed snapshot, change listener with debounce
//! - **Background**: deadline-bounded refresh entry point for the host OS
//! - **Storage**: SQLite key/value persistence and TOML configuration
//!
//! ## Key Components
//!
//! - [`TimeWindowCache`]: prayer-time memoization
//! - [`ScheduleComputer`]: alert list computation
//! - [`ReprogramCoordinator`]: boundary synchronization
//! - [`SettingsChangeListener`]: debounced change reaction
//! - [`BackgroundRefreshJob`]: periodic refresh
//! - [`DiagnosticsLog`]: bounded run history
//! - [`EngineContext`]: composition of all of the above

pub mod astro;
pub mod background;
pub mod boundary;
pub mod cache;
pub mod clock;
mod context;
pub mod diagnostics;
pub mod error;
pub mod prayer;
pub mod reprogram;
pub mod schedule;
pub mod settings;
pub mod storage;

pub use astro::{AstronomicalEngine, SolarEngine};
pub use background::{BackgroundFetchResult, BackgroundRefreshJob, JobState};
pub use boundary::{AlarmBoundary, InstallOutcome, InstallStatus, MemoryBoundary, OutboxBoundary};
pub use cache::{CacheKey, CacheStats, TimeWindowCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use context::{EngineBuilder, EngineContext};
pub use diagnostics::{DiagnosticsLog, DiagnosticsSink};
pub use error::{
    BoundaryError, ConfigError, CoreError, EngineError, StoreError, ValidationError,
};
pub use prayer::{CalculationMethod, Coordinates, Madhab, Prayer, PrayerSet};
pub use reprogram::{ReprogramCoordinator, ReprogramRun, RetryPolicy, RunError, RunTrigger};
pub use schedule::{ComputedSchedule, IntentKind, ScheduleComputer, ScheduleIntent};
pub use settings::{
    ListenerHandle, ListenerStats, Settings, SettingsChangeListener, SettingsSource,
    SettingsStore, SubscriptionTier, WatchSettingsSource,
};
pub use storage::{Config, KeyValueStore, MemoryStore, SqliteStore};
