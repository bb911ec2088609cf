//! Typed, immutable settings snapshot.
//!
//! A [`Settings`] value is passed by value into the computer and the
//! coordinator; nothing mutates it in place. [`SchedulingFields`] is the
//! projection of the fields that affect which alerts fire when, and is what
//! the [`listener`] compares to decide whether a change is relevant.

pub mod listener;
mod source;

pub use listener::{ListenerHandle, ListenerStats, SettingsChangeListener};
pub use source::{SettingsSource, SettingsStore, WatchSettingsSource};

use chrono::{FixedOffset, NaiveDate, DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ValidationError};
use crate::prayer::{CalculationMethod, Coordinates, Madhab, Prayer};
use crate::storage::{get_by_path, set_by_path};

/// How the coordinates were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationMode {
    /// Last fix reported by the device.
    #[default]
    Device,
    /// Entered by the user.
    Manual,
}

/// Subscription tier; decides the horizon length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionTier {
    #[default]
    Free,
    Premium,
}

/// Remembrance reminder toggles and delays, in minutes after the anchor prayer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DhikrSettings {
    #[serde(default)]
    pub morning_enabled: bool,
    #[serde(default = "default_morning_delay")]
    pub morning_delay_minutes: u32,
    #[serde(default)]
    pub evening_enabled: bool,
    #[serde(default = "default_evening_delay")]
    pub evening_delay_minutes: u32,
    #[serde(default)]
    pub after_salah_enabled: bool,
    #[serde(default = "default_after_salah_delay")]
    pub after_salah_delay_minutes: u32,
    #[serde(default)]
    pub selected_enabled: bool,
    #[serde(default = "default_selected_prayer")]
    pub selected_prayer: Prayer,
    #[serde(default = "default_after_salah_delay")]
    pub selected_delay_minutes: u32,
    /// Identifier of the user's chosen dhikr, forwarded in the payload.
    #[serde(default)]
    pub selected_label: String,
}

/// Presentation-only preferences. Never affect scheduling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresentationPrefs {
    #[serde(default = "default_true")]
    pub dark_mode: bool,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_true")]
    pub clock_24h: bool,
}

/// Full user settings snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub location_mode: LocationMode,
    pub coordinates: Coordinates,
    /// Offset of the user's civil time from UTC; decides what "today" is.
    #[serde(default)]
    pub utc_offset_minutes: i32,
    pub method: CalculationMethod,
    #[serde(default)]
    pub madhab: Madhab,
    #[serde(default = "default_true")]
    pub notifications_enabled: bool,
    #[serde(default)]
    pub reminders_enabled: bool,
    #[serde(default = "default_reminder_offset")]
    pub reminder_offset_minutes: u32,
    #[serde(default)]
    pub dhikr: DhikrSettings,
    #[serde(default = "default_adhan_sound")]
    pub adhan_sound: String,
    #[serde(default)]
    pub tier: SubscriptionTier,
    #[serde(default)]
    pub presentation: PresentationPrefs,
}

/// The subset of [`Settings`] that changes the alert schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulingFields<'a> {
    pub location_mode: LocationMode,
    pub coordinates: Coordinates,
    pub utc_offset_minutes: i32,
    pub method: CalculationMethod,
    pub madhab: Madhab,
    pub notifications_enabled: bool,
    pub reminders_enabled: bool,
    pub reminder_offset_minutes: u32,
    pub dhikr: &'a DhikrSettings,
    pub adhan_sound: &'a str,
    pub tier: SubscriptionTier,
}

fn default_true() -> bool {
    true
}
fn default_reminder_offset() -> u32 {
    10
}
fn default_morning_delay() -> u32 {
    20
}
fn default_evening_delay() -> u32 {
    30
}
fn default_after_salah_delay() -> u32 {
    10
}
fn default_selected_prayer() -> Prayer {
    Prayer::Isha
}
fn default_adhan_sound() -> String {
    "makkah".into()
}
fn default_language() -> String {
    "en".into()
}

impl Default for DhikrSettings {
    fn default() -> Self {
        Self {
            morning_enabled: false,
            morning_delay_minutes: default_morning_delay(),
            evening_enabled: false,
            evening_delay_minutes: default_evening_delay(),
            after_salah_enabled: false,
            after_salah_delay_minutes: default_after_salah_delay(),
            selected_enabled: false,
            selected_prayer: default_selected_prayer(),
            selected_delay_minutes: default_after_salah_delay(),
            selected_label: String::new(),
        }
    }
}

impl DhikrSettings {
    pub fn any_enabled(&self) -> bool {
        self.morning_enabled || self.evening_enabled || self.after_salah_enabled || self.selected_enabled
    }
}

impl Default for PresentationPrefs {
    fn default() -> Self {
        Self {
            dark_mode: true,
            language: default_language(),
            clock_24h: true,
        }
    }
}

impl Settings {
    /// Settings for a location with everything but adhan notifications off.
    pub fn new(coordinates: Coordinates, method: CalculationMethod) -> Self {
        Self {
            location_mode: LocationMode::default(),
            coordinates,
            utc_offset_minutes: 0,
            method,
            madhab: Madhab::default(),
            notifications_enabled: true,
            reminders_enabled: false,
            reminder_offset_minutes: default_reminder_offset(),
            dhikr: DhikrSettings::default(),
            adhan_sound: default_adhan_sound(),
            tier: SubscriptionTier::default(),
            presentation: PresentationPrefs::default(),
        }
    }

    pub fn scheduling_fields(&self) -> SchedulingFields<'_> {
        SchedulingFields {
            location_mode: self.location_mode,
            coordinates: self.coordinates,
            utc_offset_minutes: self.utc_offset_minutes,
            method: self.method,
            madhab: self.madhab,
            notifications_enabled: self.notifications_enabled,
            reminders_enabled: self.reminders_enabled,
            reminder_offset_minutes: self.reminder_offset_minutes,
            dhikr: &self.dhikr,
            adhan_sound: &self.adhan_sound,
            tier: self.tier,
        }
    }

    /// Whether switching from `self` to `other` changes the alert schedule.
    pub fn affects_schedule(&self, other: &Settings) -> bool {
        self.scheduling_fields() != other.scheduling_fields()
    }

    /// True when no alert kind is enabled at all.
    pub fn all_alerts_disabled(&self) -> bool {
        !self.notifications_enabled && !self.reminders_enabled && !self.dhikr.any_enabled()
    }

    /// The user's civil UTC offset.
    ///
    /// # Errors
    /// Returns an error if the offset is beyond +/- 24 hours.
    pub fn utc_offset(&self) -> Result<FixedOffset, ValidationError> {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).ok_or_else(|| {
            ValidationError::InvalidValue {
                field: "utc_offset_minutes".into(),
                message: format!("{} is out of range", self.utc_offset_minutes),
            }
        })
    }

    /// The user's local calendar date at `now`.
    pub fn local_date(&self, now: DateTime<Utc>) -> Result<NaiveDate, ValidationError> {
        Ok(now.with_timezone(&self.utc_offset()?).date_naive())
    }

    /// Get a field as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        match get_by_path(&json, key)? {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Return a new snapshot with one field replaced.
    ///
    /// # Errors
    /// Returns an error if the key is unknown, the value does not parse, or
    /// the result is not a valid snapshot.
    pub fn with_field(&self, key: &str, value: &str) -> Result<Settings, ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let mut json = serde_json::to_value(self).map_err(|e| invalid(e.to_string()))?;
        set_by_path(&mut json, key, value)?;
        let updated: Settings = serde_json::from_value(json).map_err(|e| invalid(e.to_string()))?;
        updated
            .coordinates
            .validate()
            .map_err(|e| invalid(e.to_string()))?;
        updated.utc_offset().map_err(|e| invalid(e.to_string()))?;
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn paris() -> Settings {
        Settings::new(
            Coordinates::new(48.8566, 2.3522).unwrap(),
            CalculationMethod::MuslimWorldLeague,
        )
    }

    #[test]
    fn presentation_changes_do_not_affect_schedule() {
        let a = paris();
        let mut b = a.clone();
        b.presentation.dark_mode = false;
        b.presentation.language = "fr".into();
        assert!(!a.affects_schedule(&b));
    }

    #[test]
    fn scheduling_changes_affect_schedule() {
        let a = paris();
        let mutations: Vec<fn(&mut Settings)> = vec![
            |s| s.method = CalculationMethod::Egyptian,
            |s| s.coordinates.latitude += 0.5,
            |s| s.reminders_enabled = true,
            |s| s.reminder_offset_minutes = 15,
            |s| s.dhikr.evening_enabled = true,
            |s| s.dhikr.after_salah_delay_minutes = 3,
            |s| s.adhan_sound = "madinah".into(),
            |s| s.location_mode = LocationMode::Manual,
            |s| s.tier = SubscriptionTier::Premium,
            |s| s.madhab = Madhab::Hanafi,
        ];
        for mutate in mutations {
            let mut b = a.clone();
            mutate(&mut b);
            assert!(a.affects_schedule(&b), "{b:?}");
        }
    }

    #[test]
    fn local_date_uses_offset() {
        let mut s = paris();
        s.utc_offset_minutes = 60;
        let now = Utc.with_ymd_and_hms(2023, 12, 31, 23, 30, 0).unwrap();
        assert_eq!(s.local_date(now).unwrap(), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        s.utc_offset_minutes = 0;
        assert_eq!(s.local_date(now).unwrap(), NaiveDate::from_ymd_opt(2023, 12, 31).unwrap());
    }

    #[test]
    fn with_field_returns_new_snapshot() {
        let s = paris();
        let updated = s.with_field("dhikr.morning_enabled", "true").unwrap();
        assert!(updated.dhikr.morning_enabled);
        assert!(!s.dhikr.morning_enabled);
        let updated = s.with_field("method", "egyptian").unwrap();
        assert_eq!(updated.method, CalculationMethod::Egyptian);
        assert!(s.with_field("method", "bogus").is_err());
        assert!(s.with_field("coordinates.latitude", "120").is_err());
        assert_eq!(s.get("reminder_offset_minutes").as_deref(), Some("10"));
    }

    #[test]
    fn minimal_json_fills_defaults() {
        let s: Settings = serde_json::from_str(
            r#"{"coordinates":{"latitude":21.42,"longitude":39.83},"method":"umm_al_qura"}"#,
        )
        .unwrap();
        assert!(s.notifications_enabled);
        assert!(!s.reminders_enabled);
        assert_eq!(s.tier, SubscriptionTier::Free);
        assert_eq!(s.dhikr.selected_prayer, Prayer::Isha);
    }
}
