use std::sync::Arc;

use tokio::sync::watch;
use tracing::warn;

use super::Settings;
use crate::error::StoreError;
use crate::storage::{KeyValueStore, SETTINGS_SNAPSHOT_KEY};

/// Read-only access to the current settings plus a change subscription.
pub trait SettingsSource: Send + Sync {
    /// Current snapshot, if the user has configured anything yet.
    fn snapshot(&self) -> Option<Settings>;

    /// Receiver that observes every published snapshot.
    fn subscribe(&self) -> watch::Receiver<Option<Settings>>;
}

/// In-process settings source backed by a `tokio::sync::watch` channel.
pub struct WatchSettingsSource {
    tx: watch::Sender<Option<Settings>>,
}

impl WatchSettingsSource {
    pub fn new(initial: Option<Settings>) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    /// Publish a new snapshot to every subscriber.
    pub fn publish(&self, settings: Settings) {
        self.tx.send_replace(Some(settings));
    }
}

impl SettingsSource for WatchSettingsSource {
    fn snapshot(&self) -> Option<Settings> {
        self.tx.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<Settings>> {
        self.tx.subscribe()
    }
}

/// Persists the last known settings snapshot in the key/value store.
///
/// The background job reads from here because it may run in a fresh process
/// where no in-memory source exists.
#[derive(Clone)]
pub struct SettingsStore {
    store: Arc<dyn KeyValueStore>,
}

impl SettingsStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// # Errors
    /// Returns an error if the store fails or the snapshot cannot be serialized.
    pub fn save(&self, settings: &Settings) -> Result<(), StoreError> {
        let json = serde_json::to_string(settings).map_err(|e| StoreError::Corrupt {
            key: SETTINGS_SNAPSHOT_KEY.into(),
            message: e.to_string(),
        })?;
        self.store.set(SETTINGS_SNAPSHOT_KEY, &json)
    }

    /// Load the snapshot. A corrupt snapshot is reported as an error rather
    /// than silently treated as absent.
    pub fn load(&self) -> Result<Option<Settings>, StoreError> {
        let Some(json) = self.store.get(SETTINGS_SNAPSHOT_KEY)? else {
            return Ok(None);
        };
        serde_json::from_str(&json)
            .map(Some)
            .map_err(|e| StoreError::Corrupt {
                key: SETTINGS_SNAPSHOT_KEY.into(),
                message: e.to_string(),
            })
    }

    pub fn clear(&self) -> Result<(), StoreError> {
        self.store.remove(SETTINGS_SNAPSHOT_KEY)
    }
}

impl SettingsSource for SettingsStore {
    fn snapshot(&self) -> Option<Settings> {
        match self.load() {
            Ok(settings) => settings,
            Err(e) => {
                warn!(error = %e, "ignoring unreadable settings snapshot");
                None
            }
        }
    }

    /// A persisted snapshot has no change feed; the receiver only ever holds
    /// the value read at subscription time.
    fn subscribe(&self) -> watch::Receiver<Option<Settings>> {
        let (_tx, rx) = watch::channel(self.snapshot());
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prayer::{CalculationMethod, Coordinates};
    use crate::storage::MemoryStore;

    fn sample() -> Settings {
        Settings::new(
            Coordinates::new(51.5074, -0.1278).unwrap(),
            CalculationMethod::MuslimWorldLeague,
        )
    }

    #[test]
    fn settings_store_roundtrip() {
        let store = SettingsStore::new(Arc::new(MemoryStore::new()));
        assert!(store.load().unwrap().is_none());
        store.save(&sample()).unwrap();
        assert_eq!(store.load().unwrap(), Some(sample()));
        store.clear().unwrap();
        assert!(store.snapshot().is_none());
    }

    #[test]
    fn corrupt_snapshot_is_an_error() {
        let kv = Arc::new(MemoryStore::new());
        kv.set(SETTINGS_SNAPSHOT_KEY, "{not json").unwrap();
        let store = SettingsStore::new(kv);
        assert!(matches!(store.load(), Err(StoreError::Corrupt { .. })));
        assert!(store.snapshot().is_none());
    }

    #[tokio::test]
    async fn watch_source_notifies_subscribers() {
        let source = WatchSettingsSource::new(None);
        let mut rx = source.subscribe();
        source.publish(sample());
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().as_ref(), Some(&sample()));
        assert_eq!(source.snapshot(), Some(sample()));
    }
}
