use serde::{Deserialize, Serialize};

/// WGS84 position in degrees.
///
/// `(0, 0)` is the "not yet resolved" sentinel and is never a valid
/// location for a pin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub const UNRESOLVED: Coordinate = Coordinate { lat: 0.0, lng: 0.0 };

    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Builds a coordinate from optional wire values, falling back to the sentinel.
    pub fn from_parts(lat: Option<f64>, lng: Option<f64>) -> Self {
        match (lat, lng) {
            (Some(lat), Some(lng)) => Self { lat, lng },
            _ => Self::UNRESOLVED,
        }
    }

    /// Both axes finite, non-zero and inside the global ranges.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && self.lat != 0.0
            && self.lng != 0.0
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

impl Default for Coordinate {
    fn default() -> Self {
        Self::UNRESOLVED
    }
}
