//! Astronomical prayer-time engine boundary.
//!
//! The cache only talks to [`AstronomicalEngine`]; [`SolarEngine`] is the
//! default implementation used by the CLI and most tests.

mod solar;

pub use solar::SolarEngine;

use chrono::NaiveDate;

use crate::error::EngineError;
use crate::prayer::{CalculationMethod, Coordinates, Madhab, PrayerSet};

/// Computes the prayer instants of one local calendar day.
pub trait AstronomicalEngine: Send + Sync {
    /// # Errors
    /// [`EngineError::InvalidLocation`] when the coordinates are unusable for
    /// that date, [`EngineError::UnsupportedMethod`] when the convention is not
    /// implemented.
    fn compute_prayer_times(
        &self,
        date: NaiveDate,
        coords: Coordinates,
        method: CalculationMethod,
        madhab: Madhab,
    ) -> Result<PrayerSet, EngineError>;
}
