use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Daily prayer events, in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Prayer {
    Fajr,
    Sunrise,
    Dhuhr,
    Asr,
    Maghrib,
    Isha,
}

impl Prayer {
    /// All six daily events in chronological order.
    pub const ALL: [Prayer; 6] = [
        Prayer::Fajr,
        Prayer::Sunrise,
        Prayer::Dhuhr,
        Prayer::Asr,
        Prayer::Maghrib,
        Prayer::Isha,
    ];

    /// The five obligatory prayers. Sunrise is not a prayer.
    pub const CANONICAL: [Prayer; 5] = [
        Prayer::Fajr,
        Prayer::Dhuhr,
        Prayer::Asr,
        Prayer::Maghrib,
        Prayer::Isha,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Prayer::Fajr => "fajr",
            Prayer::Sunrise => "sunrise",
            Prayer::Dhuhr => "dhuhr",
            Prayer::Asr => "asr",
            Prayer::Maghrib => "maghrib",
            Prayer::Isha => "isha",
        }
    }
}

impl fmt::Display for Prayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Prayer instants for one local calendar day.
///
/// Always satisfies `fajr < sunrise < dhuhr < asr < maghrib < isha`;
/// the constructor refuses anything else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrayerSet {
    date: NaiveDate,
    fajr: DateTime<Utc>,
    sunrise: DateTime<Utc>,
    dhuhr: DateTime<Utc>,
    asr: DateTime<Utc>,
    maghrib: DateTime<Utc>,
    isha: DateTime<Utc>,
}

impl PrayerSet {
    /// Build a set, checking the canonical ordering.
    ///
    /// # Errors
    /// Returns [`ValidationError::PrayerOrder`] naming the first pair out of order.
    pub fn new(
        date: NaiveDate,
        fajr: DateTime<Utc>,
        sunrise: DateTime<Utc>,
        dhuhr: DateTime<Utc>,
        asr: DateTime<Utc>,
        maghrib: DateTime<Utc>,
        isha: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        let set = Self {
            date,
            fajr,
            sunrise,
            dhuhr,
            asr,
            maghrib,
            isha,
        };
        for pair in Prayer::ALL.windows(2) {
            if set.time_of(pair[0]) >= set.time_of(pair[1]) {
                return Err(ValidationError::PrayerOrder {
                    date,
                    earlier: pair[0].as_str(),
                    later: pair[1].as_str(),
                });
            }
        }
        Ok(set)
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn time_of(&self, prayer: Prayer) -> DateTime<Utc> {
        match prayer {
            Prayer::Fajr => self.fajr,
            Prayer::Sunrise => self.sunrise,
            Prayer::Dhuhr => self.dhuhr,
            Prayer::Asr => self.asr,
            Prayer::Maghrib => self.maghrib,
            Prayer::Isha => self.isha,
        }
    }

    /// `(prayer, instant)` pairs in chronological order.
    pub fn iter(&self) -> impl Iterator<Item = (Prayer, DateTime<Utc>)> + '_ {
        Prayer::ALL.into_iter().map(move |p| (p, self.time_of(p)))
    }

    /// The first event strictly after `now`, if any remain on this day.
    pub fn next_after(&self, now: DateTime<Utc>) -> Option<(Prayer, DateTime<Utc>)> {
        self.iter().find(|(_, at)| *at > now)
    }
}
