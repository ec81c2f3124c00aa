//! Bounding regions and the region selector
//!
//! A [`BoundingRegion`] is the rectangular lon/lat window a map is drawn over.
//! It is either supplied by the caller (manual override) or fitted around a
//! set of points with [`fit_points`], padded according to [`RegionPadding`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::coords::GeoCoord;

/// Result type for region operations
pub type Result<T> = std::result::Result<T, RegionError>;

/// Errors raised while building or fitting a region
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RegionError {
    #[error("cannot fit a region around zero points")]
    NoPoints,

    #[error("latitude and longitude sequences differ in length ({lats} vs {lons})")]
    LengthMismatch { lats: usize, lons: usize },

    #[error("non-finite coordinate at index {index}")]
    NonFinite { index: usize },

    #[error("coordinate ({lat}, {lon}) at index {index} is outside the valid lat/lon range")]
    OutOfRange { index: usize, lat: f64, lon: f64 },

    #[error("invalid region bounds: {0}")]
    InvalidBounds(String),

    #[error("invalid region padding: {0}")]
    InvalidPadding(String),
}

/// Rectangular geographic window, serialized as `[lon_min, lon_max, lat_min, lat_max]`
///
/// Constructors enforce `lon_min < lon_max` and `lat_min < lat_max`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingRegion {
    lon_min: f64,
    lon_max: f64,
    lat_min: f64,
    lat_max: f64,
}

impl BoundingRegion {
    /// Create a region, validating ordering and finiteness
    pub fn new(lon_min: f64, lon_max: f64, lat_min: f64, lat_max: f64) -> Result<Self> {
        let values = [lon_min, lon_max, lat_min, lat_max];
        if let Some(index) = values.iter().position(|v| !v.is_finite()) {
            return Err(RegionError::NonFinite { index });
        }
        if lon_min >= lon_max {
            return Err(RegionError::InvalidBounds(format!(
                "lon_min ({}) must be less than lon_max ({})",
                lon_min, lon_max
            )));
        }
        if lat_min >= lat_max {
            return Err(RegionError::InvalidBounds(format!(
                "lat_min ({}) must be less than lat_max ({})",
                lat_min, lat_max
            )));
        }
        if !(-90.0..=90.0).contains(&lat_min) || !(-90.0..=90.0).contains(&lat_max) {
            return Err(RegionError::InvalidBounds(format!(
                "latitudes must lie within [-90, 90], got [{}, {}]",
                lat_min, lat_max
            )));
        }
        Ok(Self {
            lon_min,
            lon_max,
            lat_min,
            lat_max,
        })
    }

    /// Build from bounds already known to be ordered and finite
    pub(crate) fn from_ordered(lon_min: f64, lon_max: f64, lat_min: f64, lat_max: f64) -> Self {
        debug_assert!(lon_min < lon_max && lat_min < lat_max);
        Self {
            lon_min,
            lon_max,
            lat_min,
            lat_max,
        }
    }

    /// Build from the `[lon_min, lon_max, lat_min, lat_max]` layout
    pub fn from_array(bounds: [f64; 4]) -> Result<Self> {
        Self::new(bounds[0], bounds[1], bounds[2], bounds[3])
    }

    /// The `[lon_min, lon_max, lat_min, lat_max]` layout
    pub fn to_array(&self) -> [f64; 4] {
        [self.lon_min, self.lon_max, self.lat_min, self.lat_max]
    }

    pub fn lon_min(&self) -> f64 {
        self.lon_min
    }

    pub fn lon_max(&self) -> f64 {
        self.lon_max
    }

    pub fn lat_min(&self) -> f64 {
        self.lat_min
    }

    pub fn lat_max(&self) -> f64 {
        self.lat_max
    }

    /// Longitude span in degrees
    pub fn width_deg(&self) -> f64 {
        self.lon_max - self.lon_min
    }

    /// Latitude span in degrees
    pub fn height_deg(&self) -> f64 {
        self.lat_max - self.lat_min
    }

    pub fn center(&self) -> GeoCoord {
        GeoCoord::new(
            (self.lat_min + self.lat_max) / 2.0,
            (self.lon_min + self.lon_max) / 2.0,
        )
    }

    /// Check if a point lies within the region (edges included)
    pub fn contains(&self, point: &GeoCoord) -> bool {
        point.lat >= self.lat_min
            && point.lat <= self.lat_max
            && point.lon >= self.lon_min
            && point.lon <= self.lon_max
    }

    /// Check if a point lies strictly inside the region
    pub fn contains_strictly(&self, point: &GeoCoord) -> bool {
        point.lat > self.lat_min
            && point.lat < self.lat_max
            && point.lon > self.lon_min
            && point.lon < self.lon_max
    }

    /// Check if this region overlaps another
    pub fn intersects(&self, other: &BoundingRegion) -> bool {
        !(self.lat_max < other.lat_min
            || self.lat_min > other.lat_max
            || self.lon_max < other.lon_min
            || self.lon_min > other.lon_max)
    }
}

impl TryFrom<[f64; 4]> for BoundingRegion {
    type Error = RegionError;

    fn try_from(bounds: [f64; 4]) -> Result<Self> {
        Self::from_array(bounds)
    }
}

impl From<BoundingRegion> for [f64; 4] {
    fn from(region: BoundingRegion) -> Self {
        region.to_array()
    }
}

impl std::fmt::Display for BoundingRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{:.4}, {:.4}, {:.4}, {:.4}]",
            self.lon_min, self.lon_max, self.lat_min, self.lat_max
        )
    }
}

/// Padding constants for auto-fitted regions, in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionPadding {
    /// Smallest span assumed per axis, so collocated points still get a window
    pub min_span: f64,
    /// Padding as a fraction of the (clamped) span
    pub pad_fraction: f64,
    /// Absolute lower bound for the padding
    pub pad_floor: f64,
}

impl Default for RegionPadding {
    fn default() -> Self {
        Self {
            min_span: 0.01,
            pad_fraction: 0.01,
            pad_floor: 0.02,
        }
    }
}

impl RegionPadding {
    pub fn validate(&self) -> Result<()> {
        if !(self.min_span.is_finite() && self.min_span > 0.0) {
            return Err(RegionError::InvalidPadding(format!(
                "min_span must be positive, got {}",
                self.min_span
            )));
        }
        if !(self.pad_fraction.is_finite() && self.pad_fraction >= 0.0) {
            return Err(RegionError::InvalidPadding(format!(
                "pad_fraction must be non-negative, got {}",
                self.pad_fraction
            )));
        }
        if !(self.pad_floor.is_finite() && self.pad_floor > 0.0) {
            return Err(RegionError::InvalidPadding(format!(
                "pad_floor must be positive, got {}",
                self.pad_floor
            )));
        }
        Ok(())
    }

    /// Padding applied to an axis whose raw spread is `span`
    pub fn pad_for(&self, span: f64) -> f64 {
        let span = span.max(self.min_span);
        (span * self.pad_fraction).max(self.pad_floor)
    }
}

/// Fit a padded region around the given points
///
/// Each axis is padded by `max(max(spread, min_span) * pad_fraction, pad_floor)`,
/// so the result strictly contains every point. Padded bounds are clamped to
/// the poles and the antimeridian on both axes; a point lying on one of those
/// limits is then contained with its edge included.
pub fn fit_points(lats: &[f64], lons: &[f64], padding: &RegionPadding) -> Result<BoundingRegion> {
    if lats.len() != lons.len() {
        return Err(RegionError::LengthMismatch {
            lats: lats.len(),
            lons: lons.len(),
        });
    }
    if lats.is_empty() {
        return Err(RegionError::NoPoints);
    }
    padding.validate()?;

    let mut lat_min = f64::INFINITY;
    let mut lat_max = f64::NEG_INFINITY;
    let mut lon_min = f64::INFINITY;
    let mut lon_max = f64::NEG_INFINITY;
    for (index, (&lat, &lon)) in lats.iter().zip(lons).enumerate() {
        if !lat.is_finite() || !lon.is_finite() {
            return Err(RegionError::NonFinite { index });
        }
        if !GeoCoord::new(lat, lon).is_valid() {
            return Err(RegionError::OutOfRange { index, lat, lon });
        }
        lat_min = lat_min.min(lat);
        lat_max = lat_max.max(lat);
        lon_min = lon_min.min(lon);
        lon_max = lon_max.max(lon);
    }

    let lat_pad = padding.pad_for(lat_max - lat_min);
    let lon_pad = padding.pad_for(lon_max - lon_min);

    BoundingRegion::new(
        (lon_min - lon_pad).max(-180.0),
        (lon_max + lon_pad).min(180.0),
        (lat_min - lat_pad).max(-90.0),
        (lat_max + lat_pad).min(90.0),
    )
}

/// Select the map region: the override when present, else an auto-fit
pub fn select_region(
    override_region: Option<BoundingRegion>,
    lats: &[f64],
    lons: &[f64],
    padding: &RegionPadding,
) -> Result<BoundingRegion> {
    match override_region {
        Some(region) => {
            tracing::debug!("Using manual region {}", region);
            Ok(region)
        }
        None => {
            let region = fit_points(lats, lons, padding)?;
            tracing::debug!("Auto-fitted region {} around {} points", region, lats.len());
            Ok(region)
        }
    }
}
