//! Solar-angle prayer time formulas.
//!
//! Sun position uses the low-precision almanac series (declination and
//! equation of time), good to about a minute, which is the resolution
//! prayer times are published at. Each event is solved twice, seeding the
//! second pass with the first estimate.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};

use super::AstronomicalEngine;
use crate::error::EngineError;
use crate::prayer::{CalculationMethod, Coordinates, IshaRule, Madhab, PrayerSet};

/// Sun's upper limb at the horizon: 34' refraction + 16' semidiameter.
const RISE_SET_ANGLE: f64 = 50.0 / 60.0;

const PASSES: usize = 2;

/// Default engine built on standard solar-angle formulas.
///
/// `MoonsightingCommittee` needs seasonal twilight tables that this engine
/// does not carry, so it is reported as unsupported.
#[derive(Debug, Clone, Copy, Default)]
pub struct SolarEngine;

impl SolarEngine {
    pub fn new() -> Self {
        Self
    }
}

/// Declination (degrees) and equation of time (hours).
fn sun_position(jd: f64) -> (f64, f64) {
    let d = jd - 2_451_545.0;
    let g = fix_angle(357.529 + 0.985_600_28 * d);
    let q = fix_angle(280.459 + 0.985_647_36 * d);
    let l = fix_angle(q + 1.915 * dsin(g) + 0.020 * dsin(2.0 * g));
    let e = 23.439 - 0.000_000_36 * d;

    let ra = datan2(dcos(e) * dsin(l), dcos(l)) / 15.0;
    let eqt = q / 15.0 - fix_hour(ra);
    let decl = dasin(dsin(e) * dsin(l));
    (decl, eqt)
}

fn julian_day(date: NaiveDate) -> f64 {
    let (mut y, mut m) = (date.year() as f64, date.month() as f64);
    if m <= 2.0 {
        y -= 1.0;
        m += 12.0;
    }
    let a = (y / 100.0).floor();
    let b = 2.0 - a + (a / 4.0).floor();
    (365.25 * (y + 4716.0)).floor() + (30.6001 * (m + 1.0)).floor() + date.day() as f64 + b
        - 1524.5
}

/// Solver for one day at one place. Times are hours of local mean solar time.
struct Day {
    jd: f64,
    lat: f64,
}

impl Day {
    fn mid_day(&self, t: f64) -> f64 {
        let (_, eqt) = sun_position(self.jd + t);
        fix_hour(12.0 - eqt)
    }

    /// Time at which the sun is `angle` degrees below the horizon, before
    /// (`rising`) or after solar noon. `None` if the sun never gets there.
    fn sun_angle_time(&self, angle: f64, t: f64, rising: bool) -> Option<f64> {
        let (decl, _) = sun_position(self.jd + t);
        let noon = self.mid_day(t);
        let cos_h = (-dsin(angle) - dsin(decl) * dsin(self.lat)) / (dcos(decl) * dcos(self.lat));
        if !(-1.0..=1.0).contains(&cos_h) {
            return None;
        }
        let h = cos_h.acos().to_degrees() / 15.0;
        Some(if rising { noon - h } else { noon + h })
    }

    fn asr_time(&self, factor: f64, t: f64) -> Option<f64> {
        let (decl, _) = sun_position(self.jd + t);
        let angle = -(1.0 / (factor + dtan((self.lat - decl).abs()))).atan().to_degrees();
        self.sun_angle_time(angle, t, false)
    }
}

#[derive(Clone, Copy)]
struct Hours {
    fajr: Option<f64>,
    sunrise: f64,
    dhuhr: f64,
    asr: f64,
    sunset: f64,
    maghrib: f64,
    isha: Option<f64>,
}

impl AstronomicalEngine for SolarEngine {
    fn compute_prayer_times(
        &self,
        date: NaiveDate,
        coords: Coordinates,
        method: CalculationMethod,
        madhab: Madhab,
    ) -> Result<PrayerSet, EngineError> {
        coords.validate()?;
        if method == CalculationMethod::MoonsightingCommittee {
            return Err(EngineError::UnsupportedMethod(method));
        }
        let params = method.params();
        let day = Day {
            jd: julian_day(date) - coords.longitude / (15.0 * 24.0),
            lat: coords.latitude,
        };
        let no_rise_set = || {
            EngineError::InvalidLocation(format!(
                "sun does not rise and set at ({}, {}) on {date}",
                coords.latitude, coords.longitude
            ))
        };

        // Seed with typical day fractions, then refine.
        let mut guess = [5.0, 6.0, 12.0, 13.0, 18.0, 18.0, 18.0];
        let mut hours = None;
        for _ in 0..PASSES {
            let p = guess.map(|h| h / 24.0);
            let sunrise = day
                .sun_angle_time(RISE_SET_ANGLE, p[1], true)
                .ok_or_else(no_rise_set)?;
            let sunset = day
                .sun_angle_time(RISE_SET_ANGLE, p[4], false)
                .ok_or_else(no_rise_set)?;
            let asr = day
                .asr_time(madhab.shadow_factor(), p[3])
                .ok_or_else(no_rise_set)?;
            let maghrib = match params.maghrib_angle {
                Some(angle) => day.sun_angle_time(angle, p[5], false).ok_or_else(no_rise_set)?,
                None => sunset,
            };
            let isha = match params.isha {
                IshaRule::Angle(angle) => day.sun_angle_time(angle, p[6], false),
                IshaRule::MinutesAfterMaghrib(min) => Some(maghrib + min as f64 / 60.0),
            };
            let h = Hours {
                fajr: day.sun_angle_time(params.fajr_angle, p[0], true),
                sunrise,
                dhuhr: day.mid_day(p[2]),
                asr,
                sunset,
                maghrib,
                isha,
            };
            guess = [
                h.fajr.unwrap_or(h.sunrise),
                h.sunrise,
                h.dhuhr,
                h.asr,
                h.sunset,
                h.maghrib,
                h.isha.unwrap_or(h.maghrib),
            ];
            hours = Some(h);
        }
        let h = hours.ok_or_else(no_rise_set)?;

        // Twilight never ends at high latitude in summer: split the night.
        let half_night = (24.0 - (h.sunset - h.sunrise)) / 2.0;
        let fajr = h.fajr.unwrap_or(h.sunrise - half_night);
        let isha = h.isha.unwrap_or(h.sunset + half_night);

        let midnight = date
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc())
            .ok_or_else(no_rise_set)?;
        let at = |local_solar: f64| to_instant(midnight, local_solar - coords.longitude / 15.0);

        Ok(PrayerSet::new(
            date,
            at(fajr),
            at(h.sunrise),
            at(h.dhuhr),
            at(h.asr),
            at(h.maghrib),
            at(isha),
        )?)
    }
}

/// Midnight UTC plus fractional hours, rounded to the minute.
fn to_instant(midnight: DateTime<Utc>, hours_utc: f64) -> DateTime<Utc> {
    midnight + Duration::minutes((hours_utc * 60.0).round() as i64)
}

fn fix_angle(a: f64) -> f64 {
    a.rem_euclid(360.0)
}

fn fix_hour(h: f64) -> f64 {
    h.rem_euclid(24.0)
}

fn dsin(d: f64) -> f64 {
    d.to_radians().sin()
}

fn dcos(d: f64) -> f64 {
    d.to_radians().cos()
}

fn dtan(d: f64) -> f64 {
    d.to_radians().tan()
}

fn dasin(x: f64) -> f64 {
    x.asin().to_degrees()
}

fn datan2(y: f64, x: f64) -> f64 {
    y.atan2(x).to_degrees()
}
