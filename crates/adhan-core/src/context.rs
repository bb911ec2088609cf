//! Composition root.
//!
//! [`EngineBuilder`] wires the collaborators into an [`EngineContext`]. The
//! context owns every long-lived component; there are no process globals.

use std::sync::Arc;

use tracing::{debug, info};

use crate::astro::{AstronomicalEngine, SolarEngine};
use crate::background::BackgroundRefreshJob;
use crate::boundary::{AlarmBoundary, MemoryBoundary};
use crate::cache::TimeWindowCache;
use crate::clock::{Clock, SystemClock};
use crate::diagnostics::DiagnosticsLog;
use crate::error::Result;
use crate::reprogram::{ReprogramCoordinator, ReprogramRun, RunTrigger};
use crate::schedule::ScheduleComputer;
use crate::settings::{
    ListenerHandle, Settings, SettingsChangeListener, SettingsSource, SettingsStore,
    WatchSettingsSource,
};
use crate::storage::{Config, KeyValueStore, MemoryStore};

/// Builder for [`EngineContext`]. Unset collaborators fall back to the
/// in-process implementations and the system clock.
pub struct EngineBuilder {
    config: Config,
    engine: Option<Arc<dyn AstronomicalEngine>>,
    boundary: Option<Arc<dyn AlarmBoundary>>,
    store: Option<Arc<dyn KeyValueStore>>,
    clock: Option<Arc<dyn Clock>>,
}

impl EngineBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            engine: None,
            boundary: None,
            store: None,
            clock: None,
        }
    }

    pub fn engine(mut self, engine: Arc<dyn AstronomicalEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn boundary(mut self, boundary: Arc<dyn AlarmBoundary>) -> Self {
        self.boundary = Some(boundary);
        self
    }

    pub fn store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// # Errors
    /// Returns an error if the persisted run history or settings snapshot
    /// cannot be read.
    pub fn build(self) -> Result<EngineContext> {
        let config = self.config;
        let engine = self.engine.unwrap_or_else(|| Arc::new(SolarEngine));
        let boundary = self
            .boundary
            .unwrap_or_else(|| Arc::new(MemoryBoundary::new(config.reprogram.max_alarms)));
        let store = self.store.unwrap_or_else(|| Arc::new(MemoryStore::new()));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let cache = Arc::new(TimeWindowCache::new(engine, config.cache_capacity()));
        let max_intents = config.reprogram.max_alarms.min(boundary.capacity());
        let computer = ScheduleComputer::new(Arc::clone(&cache), max_intents);

        let diagnostics = Arc::new(DiagnosticsLog::with_store(
            config.diagnostics.history_limit,
            Arc::clone(&store),
        )?);

        let coordinator = Arc::new(
            ReprogramCoordinator::new(
                computer.clone(),
                Arc::clone(&boundary),
                Arc::clone(&store),
                diagnostics.clone(),
                Arc::clone(&clock),
            )
            .with_retry(config.retry_policy())
            .with_horizon(config.horizon.clone())
            .with_bucket_threshold(config.cache.bucket_threshold),
        );

        let settings_store = SettingsStore::new(Arc::clone(&store));
        let settings = Arc::new(WatchSettingsSource::new(settings_store.load()?));

        let background = Arc::new(BackgroundRefreshJob::new(
            Arc::clone(&coordinator),
            Arc::clone(&clock),
            config.background_deadline(),
            config.background_min_interval(),
        ));

        let listener = SettingsChangeListener::new(Arc::clone(&coordinator), config.debounce());

        info!(
            boundary = boundary.name(),
            max_intents,
            cache_capacity = cache.capacity(),
            "engine context ready"
        );

        Ok(EngineContext {
            config,
            clock,
            cache,
            computer,
            boundary,
            coordinator,
            diagnostics,
            background,
            settings,
            settings_store,
            listener,
        })
    }
}

/// Every long-lived component of the engine.
pub struct EngineContext {
    config: Config,
    clock: Arc<dyn Clock>,
    cache: Arc<TimeWindowCache>,
    computer: ScheduleComputer,
    boundary: Arc<dyn AlarmBoundary>,
    coordinator: Arc<ReprogramCoordinator>,
    diagnostics: Arc<DiagnosticsLog>,
    background: Arc<BackgroundRefreshJob>,
    settings: Arc<WatchSettingsSource>,
    settings_store: SettingsStore,
    listener: SettingsChangeListener,
}

impl EngineContext {
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn cache(&self) -> &Arc<TimeWindowCache> {
        &self.cache
    }

    pub fn computer(&self) -> &ScheduleComputer {
        &self.computer
    }

    pub fn boundary(&self) -> &Arc<dyn AlarmBoundary> {
        &self.boundary
    }

    pub fn coordinator(&self) -> &Arc<ReprogramCoordinator> {
        &self.coordinator
    }

    pub fn diagnostics(&self) -> &Arc<DiagnosticsLog> {
        &self.diagnostics
    }

    pub fn background(&self) -> &Arc<BackgroundRefreshJob> {
        &self.background
    }

    pub fn settings(&self) -> &Arc<WatchSettingsSource> {
        &self.settings
    }

    pub fn settings_store(&self) -> &SettingsStore {
        &self.settings_store
    }

    pub fn listener(&self) -> &SettingsChangeListener {
        &self.listener
    }

    /// Horizon length for `settings`' subscription tier.
    pub fn horizon_days(&self, settings: &Settings) -> u32 {
        self.config.horizon.days_for(settings.tier)
    }

    /// Hand a new snapshot to the settings stream.
    pub fn publish_settings(&self, settings: Settings) {
        debug!("publishing settings snapshot");
        self.settings.publish(settings);
    }

    /// Watch the settings stream and reprogram on relevant changes.
    pub fn start_listener(&self) -> ListenerHandle {
        self.listener.spawn(self.settings.as_ref())
    }

    /// Reprogram immediately from the current snapshot. `None` when no
    /// settings exist yet.
    pub async fn reprogram_now(&self, trigger: RunTrigger) -> Option<ReprogramRun> {
        let settings = self.settings.snapshot()?;
        Some(self.coordinator.reprogram_all(settings, trigger).await)
    }
}
