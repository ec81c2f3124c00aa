//! Geographic coordinates
//!
//! All coordinates use the WGS84 datum with degrees for both axes.

use serde::{Deserialize, Serialize};

/// Length of one degree of latitude in meters (spherical approximation)
pub const METERS_PER_DEGREE: f64 = 111_320.0;

/// Geographic coordinate (latitude/longitude in degrees)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoCoord {
    /// Latitude in degrees (-90 to 90, positive = north)
    pub lat: f64,
    /// Longitude in degrees (-180 to 180, positive = east)
    pub lon: f64,
}

impl GeoCoord {
    /// Create a new geographic coordinate
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Check if the coordinate is within valid ranges
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lon)
    }
}

impl Default for GeoCoord {
    fn default() -> Self {
        Self { lat: 0.0, lon: 0.0 }
    }
}

/// Length of one degree of longitude at the given latitude, in meters
pub fn meters_per_degree_lon(lat: f64) -> f64 {
    METERS_PER_DEGREE * lat.to_radians().cos()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geo_coord_validity() {
        assert!(GeoCoord::new(37.2212, -116.0609).is_valid());
        assert!(!GeoCoord::new(91.0, 0.0).is_valid());
        assert!(!GeoCoord::new(0.0, -180.5).is_valid());
    }

    #[test]
    fn test_meters_per_degree_lon_shrinks_with_latitude() {
        assert!((meters_per_degree_lon(0.0) - METERS_PER_DEGREE).abs() < 1e-6);
        assert!((meters_per_degree_lon(60.0) - METERS_PER_DEGREE / 2.0).abs() < 1e-6);
    }
}
