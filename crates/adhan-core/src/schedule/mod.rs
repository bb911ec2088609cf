//! Alert schedule computation.
//!
//! [`ScheduleComputer::compute`] turns a settings snapshot, a horizon and the
//! current instant into the ordered list of future alerts. It reads prayer
//! times through the [`TimeWindowCache`] and has no other side effects: the
//! same inputs always produce the same list, ids included.

mod intent;

pub use intent::{IntentKind, IntentPayload, ScheduleIntent};

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::TimeWindowCache;
use crate::error::EngineError;
use crate::prayer::{Prayer, PrayerSet};
use crate::settings::Settings;

/// Output of one computation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputedSchedule {
    /// Future intents, earliest first, at most the computer's limit.
    pub intents: Vec<ScheduleIntent>,
    /// True when intents were dropped to fit the limit.
    pub truncated: bool,
    /// Number of intents before truncation.
    pub raw_count: usize,
}

/// Pure settings-to-intents computation.
#[derive(Clone)]
pub struct ScheduleComputer {
    cache: Arc<TimeWindowCache>,
    max_intents: usize,
}

impl ScheduleComputer {
    /// `max_intents` is the most alarms the boundary can hold at once.
    pub fn new(cache: Arc<TimeWindowCache>, max_intents: usize) -> Self {
        Self { cache, max_intents }
    }

    pub fn max_intents(&self) -> usize {
        self.max_intents
    }

    pub fn cache(&self) -> &Arc<TimeWindowCache> {
        &self.cache
    }

    /// Compute the alert list for days `0..horizon_days`, day 0 being the
    /// user's local date at `now`.
    ///
    /// # Errors
    /// Engine errors (invalid location, unsupported method) and an
    /// out-of-range UTC offset, reported as an invalid location.
    pub fn compute(
        &self,
        settings: &Settings,
        horizon_days: u32,
        now: DateTime<Utc>,
    ) -> Result<ComputedSchedule, EngineError> {
        let mut intents = Vec::new();
        if horizon_days > 0 && !settings.all_alerts_disabled() {
            let today = settings.local_date(now)?;
            for offset in 0..horizon_days {
                let date = today + Duration::days(i64::from(offset));
                let prayers = self.cache.get(
                    date,
                    &settings.coordinates,
                    settings.method,
                    settings.madhab,
                )?;
                intents.extend(day_intents(settings, &prayers, now));
            }
        }

        intents.sort_by(|a, b| {
            a.fires_at
                .cmp(&b.fires_at)
                .then(a.kind.cmp(&b.kind))
                .then(a.payload.prayer.cmp(&b.payload.prayer))
        });

        let raw_count = intents.len();
        let truncated = raw_count > self.max_intents;
        intents.truncate(self.max_intents);

        Ok(ComputedSchedule {
            intents,
            truncated,
            raw_count,
        })
    }
}

/// Every enabled alert for one day that is strictly after `now`.
fn day_intents(settings: &Settings, prayers: &PrayerSet, now: DateTime<Utc>) -> Vec<ScheduleIntent> {
    let mut out = Vec::new();
    let date = prayers.date();
    let mut push = |kind: IntentKind, prayer: Prayer, fires_at: DateTime<Utc>| {
        if fires_at <= now {
            return;
        }
        let offset_minutes = (fires_at - prayers.time_of(prayer)).num_minutes();
        let payload = IntentPayload {
            prayer,
            date,
            offset_minutes,
            sound: (kind == IntentKind::Adhan).then(|| settings.adhan_sound.clone()),
            dhikr: dhikr_label(settings, kind),
        };
        out.push(ScheduleIntent::new(kind, fires_at, payload));
    };

    let minutes = |m: u32| Duration::minutes(i64::from(m));
    let dhikr = &settings.dhikr;

    for prayer in Prayer::CANONICAL {
        let at = prayers.time_of(prayer);
        if settings.notifications_enabled {
            push(IntentKind::Adhan, prayer, at);
        }
        if settings.reminders_enabled {
            push(IntentKind::Reminder, prayer, at - minutes(settings.reminder_offset_minutes));
        }
        if dhikr.after_salah_enabled {
            push(IntentKind::DhikrAfterSalah, prayer, at + minutes(dhikr.after_salah_delay_minutes));
        }
        if dhikr.selected_enabled && dhikr.selected_prayer == prayer {
            push(IntentKind::DhikrSelected, prayer, at + minutes(dhikr.selected_delay_minutes));
        }
    }

    // Morning remembrance closes at sunrise, evening remembrance at maghrib.
    if dhikr.morning_enabled {
        let at = windowed(
            prayers.time_of(Prayer::Fajr),
            minutes(dhikr.morning_delay_minutes),
            prayers.time_of(Prayer::Sunrise),
        );
        push(IntentKind::DhikrMorning, Prayer::Fajr, at);
    }
    if dhikr.evening_enabled {
        let at = windowed(
            prayers.time_of(Prayer::Asr),
            minutes(dhikr.evening_delay_minutes),
            prayers.time_of(Prayer::Maghrib),
        );
        push(IntentKind::DhikrEvening, Prayer::Asr, at);
    }

    out
}

/// `start + delay`, but no later than one minute before `end`.
fn windowed(start: DateTime<Utc>, delay: Duration, end: DateTime<Utc>) -> DateTime<Utc> {
    let latest = (end - Duration::minutes(1)).max(start);
    (start + delay).min(latest)
}

fn dhikr_label(settings: &Settings, kind: IntentKind) -> Option<String> {
    let label = match kind {
        IntentKind::Adhan | IntentKind::Reminder => return None,
        IntentKind::DhikrMorning => "morning",
        IntentKind::DhikrEvening => "evening",
        IntentKind::DhikrAfterSalah => "after_salah",
        IntentKind::DhikrSelected if settings.dhikr.selected_label.is_empty() => "selected",
        IntentKind::DhikrSelected => settings.dhikr.selected_label.as_str(),
    };
    Some(label.to_string())
}
