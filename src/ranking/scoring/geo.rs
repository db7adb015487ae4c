//! Great-circle distance on a spherical Earth.

use serde::{Deserialize, Serialize};

/// Mean Earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A latitude/longitude pair in degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Latitude in degrees, nominally -90..=90.
    pub lat: f64,
    /// Longitude in degrees, nominally -180..=180.
    pub lon: f64,
}

impl Coordinate {
    /// Create a coordinate.
    #[must_use]
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Build a coordinate only when both halves are known.
    #[must_use]
    pub const fn from_parts(lat: Option<f64>, lon: Option<f64>) -> Option<Self> {
        match (lat, lon) {
            (Some(lat), Some(lon)) => Some(Self { lat, lon }),
            _ => None,
        }
    }

    /// Whether both components fall inside the valid degree ranges.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lon)
    }

    /// Haversine distance to `other` in kilometers.
    #[must_use]
    pub fn distance_km(&self, other: &Self) -> f64 {
        haversine_km(self.lat, self.lon, other.lat, other.lon)
    }
}

/// Haversine distance in kilometers between two points given in degrees.
///
/// Out-of-range inputs are not rejected. The intermediate term is clamped to
/// `[0, 1]` so rounding near identical or antipodal points never reaches
/// `asin` outside its domain.
#[must_use]
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let sin_phi = (d_phi / 2.0).sin();
    let sin_lambda = (d_lambda / 2.0).sin();
    let h = (phi1.cos() * phi2.cos())
        .mul_add(sin_lambda * sin_lambda, sin_phi * sin_phi)
        .clamp(0.0, 1.0);

    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}
