//! Map projections
//!
//! Projections are written GMT-style: a letter for the projection and the map
//! width with an optional unit, e.g. `M14c` (Mercator, 14 cm wide) or `Q6i`
//! (equidistant cylindrical, 6 inches wide). Units are `c` (cm, default),
//! `i` (inch) and `p` (points).

use std::f64::consts::FRAC_PI_4;
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use plotters::coord::ranged1d::{DefaultFormatting, KeyPointHint, Ranged};
use plotters::coord::types::RangedCoordf64;
use serde::{Deserialize, Serialize};
use stationmap_map::BoundingRegion;

use crate::error::{RenderError, Result};

const CM_PER_INCH: f64 = 2.54;
const POINTS_PER_INCH: f64 = 72.0;
const MAX_MERCATOR_LAT: f64 = 85.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionKind {
    Mercator,
    Cylindrical,
}

/// A projection plus the printed map width
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MapProjection {
    pub kind: ProjectionKind,
    /// Map width in centimeters
    pub width_cm: f64,
}

impl MapProjection {
    /// Projected y for a latitude, in degree-like units comparable to longitude
    pub fn project_lat(&self, lat: f64) -> f64 {
        match self.kind {
            ProjectionKind::Mercator => {
                let phi = lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT).to_radians();
                (FRAC_PI_4 + phi / 2.0).tan().ln().to_degrees()
            }
            ProjectionKind::Cylindrical => lat,
        }
    }

    /// Inverse of [`project_lat`](Self::project_lat)
    pub fn unproject_lat(&self, y: f64) -> f64 {
        match self.kind {
            ProjectionKind::Mercator => (2.0 * y.to_radians().exp().atan() - 2.0 * FRAC_PI_4).to_degrees(),
            ProjectionKind::Cylindrical => y,
        }
    }

    /// Projected y range (south, north) of a region
    pub fn y_range(&self, region: &BoundingRegion) -> (f64, f64) {
        (self.project_lat(region.lat_min()), self.project_lat(region.lat_max()))
    }

    pub fn width_px(&self, dpi: f64) -> u32 {
        (self.width_cm / CM_PER_INCH * dpi).round().max(1.0) as u32
    }

    /// Plot area size in pixels; the height follows the projected aspect ratio
    pub fn plot_size(&self, region: &BoundingRegion, dpi: f64) -> (u32, u32) {
        let width = self.width_px(dpi);
        let (south, north) = self.y_range(region);
        let aspect = (north - south) / region.width_deg();
        let height = (width as f64 * aspect).round().max(1.0) as u32;
        (width, height)
    }
}

/// Chart axis in latitude whose pixel positions follow the projection
///
/// Key points are chosen on the plain latitude range, so tick labels stay at
/// round latitudes even when Mercator stretches the spacing between them.
#[derive(Debug, Clone)]
pub struct LatitudeAxis {
    lat: Range<f64>,
    projected: (f64, f64),
    projection: MapProjection,
}

impl LatitudeAxis {
    pub fn new(region: &BoundingRegion, projection: MapProjection) -> Self {
        Self {
            lat: region.lat_min()..region.lat_max(),
            projected: projection.y_range(region),
            projection,
        }
    }
}

impl Ranged for LatitudeAxis {
    type FormatOption = DefaultFormatting;
    type ValueType = f64;

    fn map(&self, value: &f64, limit: (i32, i32)) -> i32 {
        let (south, north) = self.projected;
        let actual_length = limit.1 - limit.0;
        if actual_length == 0 || north <= south {
            return limit.1;
        }
        let logic_length = (self.projection.project_lat(*value) - south) / (north - south);
        limit.0 + (actual_length as f64 * logic_length + 1e-3).floor() as i32
    }

    fn key_points<Hint: KeyPointHint>(&self, hint: Hint) -> Vec<f64> {
        RangedCoordf64::from(self.lat.clone()).key_points(hint)
    }

    fn range(&self) -> Range<f64> {
        self.lat.clone()
    }
}

impl FromStr for MapProjection {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || RenderError::InvalidProjection(s.to_string());
        let trimmed = s.trim();
        let mut chars = trimmed.chars();

        let kind = match chars.next() {
            Some('M') => ProjectionKind::Mercator,
            Some('Q') => ProjectionKind::Cylindrical,
            _ => return Err(invalid()),
        };
        let rest = chars.as_str();
        let (number, to_cm) = match rest.chars().last() {
            Some('c') => (&rest[..rest.len() - 1], 1.0),
            Some('i') => (&rest[..rest.len() - 1], CM_PER_INCH),
            Some('p') => (&rest[..rest.len() - 1], CM_PER_INCH / POINTS_PER_INCH),
            Some(c) if c.is_ascii_digit() || c == '.' => (rest, 1.0),
            _ => return Err(invalid()),
        };

        let width: f64 = number.parse().map_err(|_| invalid())?;
        if !width.is_finite() || width <= 0.0 {
            return Err(invalid());
        }

        Ok(Self {
            kind,
            width_cm: width * to_cm,
        })
    }
}

impl TryFrom<String> for MapProjection {
    type Error = RenderError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<MapProjection> for String {
    fn from(projection: MapProjection) -> Self {
        projection.to_string()
    }
}

impl fmt::Display for MapProjection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self.kind {
            ProjectionKind::Mercator => 'M',
            ProjectionKind::Cylindrical => 'Q',
        };
        write!(f, "{}{}c", letter, self.width_cm)
    }
}

impl Default for MapProjection {
    fn default() -> Self {
        Self {
            kind: ProjectionKind::Mercator,
            width_cm: 14.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_projection() {
        let m: MapProjection = "M14c".parse().unwrap();
        assert_eq!(m.kind, ProjectionKind::Mercator);
        assert_eq!(m.width_cm, 14.0);

        let q: MapProjection = "Q6i".parse().unwrap();
        assert_eq!(q.kind, ProjectionKind::Cylindrical);
        assert!((q.width_cm - 15.24).abs() < 1e-9);

        let p: MapProjection = "M72p".parse().unwrap();
        assert!((p.width_cm - 2.54).abs() < 1e-9);

        let bare: MapProjection = "M10".parse().unwrap();
        assert_eq!(bare.width_cm, 10.0);

        for bad in ["", "X14c", "M", "Mc", "M-2c", "M0c", "m14c", "M14k"] {
            assert!(bad.parse::<MapProjection>().is_err(), "{:?} should not parse", bad);
        }
    }

    #[test]
    fn test_mercator_round_trip() {
        let m = MapProjection::default();
        for lat in [-60.0, -10.5, 0.0, 37.2212, 80.0] {
            let back = m.unproject_lat(m.project_lat(lat));
            assert!((back - lat).abs() < 1e-9, "{} -> {}", lat, back);
        }
        assert_eq!(m.project_lat(0.0), 0.0);
        // Mercator stretches latitude
        assert!(m.project_lat(60.0) > 60.0);
    }

    #[test]
    fn test_plot_size_follows_aspect() {
        let region = BoundingRegion::from_array([-116.075, -116.033, 37.17, 37.23]).unwrap();
        let m = MapProjection::default();
        let (w, h) = m.plot_size(&region, 450.0);
        assert_eq!(w, 2480);
        // 0.06 deg of latitude at 37N stretched by 1/cos(37.2) ~ 1.256
        let expected = 2480.0 * 0.06 * 1.2563 / 0.042;
        assert!((h as f64 - expected).abs() < 10.0, "height {}", h);

        let q: MapProjection = "Q14c".parse().unwrap();
        let (_, hq) = q.plot_size(&region, 450.0);
        assert!(hq < h);
    }

    #[test]
    fn test_latitude_axis_mapping() {
        let region = BoundingRegion::from_array([-116.075, -116.033, 37.17, 37.23]).unwrap();
        let axis = LatitudeAxis::new(&region, MapProjection::default());

        // Pixel rows grow downwards, so the south edge maps to the larger limit
        assert_eq!(axis.map(&37.17, (1000, 0)), 1000);
        assert_eq!(axis.map(&37.23, (1000, 0)), 0);
        let mid = axis.map(&37.20, (1000, 0));
        assert!((mid - 500).abs() <= 2, "mid latitude at {}", mid);

        let ticks = axis.key_points(4usize);
        assert!(!ticks.is_empty());
        assert!(ticks.iter().all(|t| (37.17..=37.23).contains(t)));
        assert_eq!(axis.range(), 37.17..37.23);
    }
}
