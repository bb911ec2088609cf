//! Helpers shared by the commands.

use std::error::Error;
use std::sync::Arc;

use adhan_core::storage::data_dir;
use adhan_core::{
    Clock, Config, EngineBuilder, EngineContext, ManualClock, OutboxBoundary, Settings,
    SqliteStore, SystemClock,
};
use chrono::{DateTime, Utc};

pub type CliResult = Result<(), Box<dyn Error>>;

/// Parse an RFC 3339 `--now` override.
pub fn parse_now(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("invalid --now '{raw}': {e}"))
}

/// Compose the engine over the on-disk store and the outbox boundary.
pub fn open_context(now: Option<DateTime<Utc>>) -> Result<EngineContext, Box<dyn Error>> {
    let config = Config::load()?;
    let store = Arc::new(SqliteStore::open()?);
    let outbox = data_dir()?.join("outbox.json");
    let boundary = Arc::new(OutboxBoundary::new(outbox, config.reprogram.max_alarms));
    let clock: Arc<dyn Clock> = match now {
        Some(now) => Arc::new(ManualClock::new(now)),
        None => Arc::new(SystemClock),
    };
    Ok(EngineBuilder::new(config)
        .store(store)
        .boundary(boundary)
        .clock(clock)
        .build()?)
}

/// The persisted settings snapshot, or an error telling the user to create one.
pub fn require_settings(ctx: &EngineContext) -> Result<Settings, Box<dyn Error>> {
    ctx.settings_store()
        .load()?
        .ok_or_else(|| "no settings; create them with `adhan-cli settings set <key> <value>`".into())
}

pub fn runtime() -> Result<tokio::runtime::Runtime, std::io::Error> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
}
