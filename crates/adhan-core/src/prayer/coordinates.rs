use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Bucket resolution: coordinates are rounded to 1/100 of a degree.
const BUCKETS_PER_DEGREE: f64 = 100.0;

/// Geographic position, north and east positive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// Create validated coordinates.
    ///
    /// # Errors
    /// Returns an error if either value is non-finite or out of range.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, ValidationError> {
        let coords = Self { latitude, longitude };
        coords.validate()?;
        Ok(coords)
    }

    /// Check ranges. Deserialized coordinates are not validated on their own.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let ok = self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude);
        if ok {
            Ok(())
        } else {
            Err(ValidationError::CoordinatesOutOfRange {
                latitude: self.latitude,
                longitude: self.longitude,
            })
        }
    }

    /// The ~0.01 degree cache bucket containing these coordinates.
    pub fn bucket(&self) -> LocationBucket {
        LocationBucket {
            lat: (self.latitude * BUCKETS_PER_DEGREE).round() as i32,
            lng: (self.longitude * BUCKETS_PER_DEGREE).round() as i32,
        }
    }
}

/// Coordinates quantized to 0.01 degree, usable as a hash key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LocationBucket {
    pub lat: i32,
    pub lng: i32,
}

impl LocationBucket {
    /// Chebyshev distance in buckets.
    pub fn distance(&self, other: &LocationBucket) -> u32 {
        self.lat.abs_diff(other.lat).max(self.lng.abs_diff(other.lng))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range() {
        assert!(Coordinates::new(91.0, 0.0).is_err());
        assert!(Coordinates::new(0.0, -181.0).is_err());
        assert!(Coordinates::new(f64::NAN, 0.0).is_err());
        assert!(Coordinates::new(48.8566, 2.3522).is_ok());
    }

    #[test]
    fn nearby_points_share_a_bucket() {
        let a = Coordinates::new(48.8566, 2.3522).unwrap();
        let b = Coordinates::new(48.8601, 2.3549).unwrap();
        assert_eq!(a.bucket(), b.bucket());
        assert_eq!(a.bucket(), LocationBucket { lat: 4886, lng: 235 });
    }

    #[test]
    fn bucket_distance_is_chebyshev() {
        let a = LocationBucket { lat: 100, lng: 100 };
        let b = LocationBucket { lat: 103, lng: 98 };
        assert_eq!(a.distance(&b), 3);
        assert_eq!(b.distance(&a), 3);
    }
}
