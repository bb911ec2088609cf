//! Alert intents handed to the alarm boundary.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::prayer::Prayer;

/// Kind of alert. Declaration order is the tie-break order for intents that
/// fire at the same instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    Adhan,
    Reminder,
    DhikrMorning,
    DhikrEvening,
    DhikrAfterSalah,
    DhikrSelected,
}

impl IntentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            IntentKind::Adhan => "adhan",
            IntentKind::Reminder => "reminder",
            IntentKind::DhikrMorning => "dhikr_morning",
            IntentKind::DhikrEvening => "dhikr_evening",
            IntentKind::DhikrAfterSalah => "dhikr_after_salah",
            IntentKind::DhikrSelected => "dhikr_selected",
        }
    }

    pub fn is_dhikr(self) -> bool {
        !matches!(self, IntentKind::Adhan | IntentKind::Reminder)
    }
}

/// Data the native layer needs to render and play the alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentPayload {
    pub prayer: Prayer,
    /// Local calendar date the prayer belongs to.
    pub date: NaiveDate,
    /// Minutes relative to the prayer time; negative before it.
    pub offset_minutes: i64,
    /// Adhan sound to play. Only set for [`IntentKind::Adhan`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sound: Option<String>,
    /// Dhikr identifier. Only set for dhikr kinds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dhikr: Option<String>,
}

/// One future alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleIntent {
    pub id: String,
    /// 31-bit id for platforms that key notifications by integer.
    pub notification_id: i32,
    pub fires_at: DateTime<Utc>,
    pub kind: IntentKind,
    pub payload: IntentPayload,
}

impl ScheduleIntent {
    pub fn new(kind: IntentKind, fires_at: DateTime<Utc>, payload: IntentPayload) -> Self {
        let digest = intent_digest(payload.prayer, payload.date, kind);
        let notification_id =
            (u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]) & 0x7fff_ffff) as i32;
        Self {
            id: hex::encode(&digest[..12]),
            notification_id,
            fires_at,
            kind,
            payload,
        }
    }
}

/// The same logical event hashes to the same id in every cycle.
fn intent_digest(prayer: Prayer, date: NaiveDate, kind: IntentKind) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(prayer.as_str().as_bytes());
    hasher.update(b"|");
    hasher.update(date.format("%Y-%m-%d").to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(kind.as_str().as_bytes());
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&hasher.finalize());
    digest
}
