//! Prayer-time domain types.
//!
//! - [`Coordinates`]: validated latitude/longitude pair
//! - [`CalculationMethod`] and [`Madhab`]: the astronomical conventions
//! - [`PrayerSet`]: the six instants of one local calendar day

mod coordinates;
mod method;
mod set;

pub use coordinates::{Coordinates, LocationBucket};
pub use method::{CalculationMethod, IshaRule, Madhab, MethodParams};
pub use set::{Prayer, PrayerSet};
