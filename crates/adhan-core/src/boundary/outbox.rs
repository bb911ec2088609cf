//! File-backed boundary.
//!
//! Writes the pending alarm table to a JSON file that a platform daemon
//! (or a test) consumes. The whole file is rewritten on every call, so a
//! reader never sees a half-applied batch.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::{AlarmBoundary, InstallOutcome};
use crate::error::BoundaryError;
use crate::schedule::ScheduleIntent;

#[derive(Debug, Default, Serialize, Deserialize)]
struct OutboxFile {
    pending: Vec<ScheduleIntent>,
}

/// JSON outbox of pending alarms.
pub struct OutboxBoundary {
    path: PathBuf,
    capacity: usize,
    // Serializes read-modify-write cycles on the file.
    lock: Mutex<()>,
}

impl OutboxBoundary {
    pub fn new(path: impl Into<PathBuf>, capacity: usize) -> Self {
        Self {
            path: path.into(),
            capacity,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Alarms currently in the outbox, earliest first.
    pub async fn pending(&self) -> Result<Vec<ScheduleIntent>, BoundaryError> {
        let _guard = self.lock.lock().await;
        Ok(self.read().await?.pending)
    }

    async fn read(&self) -> Result<OutboxFile, BoundaryError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => serde_json::from_str(&content)
                .map_err(|e| BoundaryError::Unavailable(format!("corrupt outbox: {e}"))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(OutboxFile::default()),
            Err(e) => Err(unavailable(&self.path, e)),
        }
    }

    async fn write(&self, file: &OutboxFile) -> Result<(), BoundaryError> {
        let json = serde_json::to_string_pretty(file)
            .map_err(|e| BoundaryError::Unavailable(e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| unavailable(&tmp, e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| unavailable(&self.path, e))
    }
}

fn unavailable(path: &Path, e: std::io::Error) -> BoundaryError {
    BoundaryError::Unavailable(format!("{}: {e}", path.display()))
}

#[async_trait]
impl AlarmBoundary for OutboxBoundary {
    fn name(&self) -> &'static str {
        "outbox"
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    async fn cancel_all(&self) -> Result<(), BoundaryError> {
        let _guard = self.lock.lock().await;
        self.write(&OutboxFile::default()).await
    }

    async fn schedule_batch(
        &self,
        intents: &[ScheduleIntent],
    ) -> Result<Vec<InstallOutcome>, BoundaryError> {
        let _guard = self.lock.lock().await;
        let mut file = self.read().await?;
        let mut outcomes = Vec::with_capacity(intents.len());
        for intent in intents {
            if let Some(existing) = file.pending.iter_mut().find(|p| p.id == intent.id) {
                *existing = intent.clone();
            } else if file.pending.len() >= self.capacity {
                outcomes.push(InstallOutcome::rejected(&intent.id, "alarm limit reached"));
                continue;
            } else {
                file.pending.push(intent.clone());
            }
            outcomes.push(InstallOutcome::installed(&intent.id));
        }
        file.pending.sort_by_key(|i| i.fires_at);
        self.write(&file).await?;
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prayer::Prayer;
    use crate::schedule::{IntentKind, IntentPayload};
    use chrono::{Duration, NaiveDate, TimeZone, Utc};

    fn intent(prayer: Prayer, hour: i64) -> ScheduleIntent {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        ScheduleIntent::new(
            IntentKind::Adhan,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::hours(hour),
            IntentPayload {
                prayer,
                date,
                offset_minutes: 0,
                sound: Some("makkah".into()),
                dhikr: None,
            },
        )
    }

    #[tokio::test]
    async fn batch_is_written_sorted_and_cancel_empties() {
        let dir = tempfile::tempdir().unwrap();
        let outbox = OutboxBoundary::new(dir.path().join("alarms.json"), 10);
        assert!(outbox.pending().await.unwrap().is_empty());

        let outcomes = outbox
            .schedule_batch(&[intent(Prayer::Isha, 19), intent(Prayer::Fajr, 5)])
            .await
            .unwrap();
        assert!(outcomes.iter().all(InstallOutcome::is_installed));

        let pending = outbox.pending().await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].payload.prayer, Prayer::Fajr);

        outbox.cancel_all().await.unwrap();
        assert!(outbox.pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejects_beyond_capacity() {
        let dir = tempfile::tempdir().unwrap();
        let outbox = OutboxBoundary::new(dir.path().join("alarms.json"), 1);
        let outcomes = outbox
            .schedule_batch(&[intent(Prayer::Fajr, 5), intent(Prayer::Dhuhr, 12)])
            .await
            .unwrap();
        assert!(outcomes[0].is_installed());
        assert!(!outcomes[1].is_installed());
    }

    #[tokio::test]
    async fn unwritable_path_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let outbox = OutboxBoundary::new(dir.path().join("missing/dir/alarms.json"), 10);
        assert!(matches!(
            outbox.cancel_all().await,
            Err(BoundaryError::Unavailable(_))
        ));
    }
}
