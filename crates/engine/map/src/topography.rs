//! Topography grids and providers
//!
//! A [`TopographyProvider`] turns a region and a [`Resolution`] into a
//! [`TopographyGrid`]. [`load_topography`] walks a preference list of
//! resolutions, finest first, and keeps the first grid that loads.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::attempt::{first_success_async, AttemptError};
use crate::coords::GeoCoord;
use crate::region::BoundingRegion;

/// Result type for topography operations
pub type Result<T> = std::result::Result<T, TopographyError>;

/// Ground distance covered by one arc-second at the equator
pub const METERS_PER_ARC_SECOND: f64 = 30.87;

/// Errors that can occur while acquiring topography
#[derive(Debug, Error)]
pub enum TopographyError {
    #[error("invalid resolution '{0}', expected e.g. \"01s\", \"15s\" or \"01m\"")]
    InvalidResolution(String),

    #[error("resolution {resolution} not supported: {reason}")]
    UnsupportedResolution { resolution: Resolution, reason: String },

    #[error("resolution {resolution} needs {tiles} tiles, over the budget of {limit}")]
    TooManyTiles {
        resolution: Resolution,
        tiles: usize,
        limit: usize,
    },

    #[error("request to {url} failed")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Http { url: String, status: u16 },

    #[error("failed to decode elevation tile {name}")]
    Decode {
        name: String,
        #[source]
        source: image::ImageError,
    },

    #[error("unexpected elevation tile {name}: {message}")]
    InvalidTile { name: String, message: String },

    #[error("invalid topography grid: {0}")]
    InvalidGrid(String),

    #[error("no topography resolutions to try")]
    NoResolutions,

    #[error("topography unavailable after {attempts} attempts (last tried {last_resolution})")]
    Exhausted {
        attempts: usize,
        last_resolution: Resolution,
        #[source]
        source: Box<TopographyError>,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ResolutionUnit {
    ArcSecond,
    ArcMinute,
}

/// Grid spacing written GMT-style: `"01s"` (arc-seconds) or `"01m"` (arc-minutes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Resolution {
    value: u32,
    unit: ResolutionUnit,
}

impl Resolution {
    pub fn arc_seconds(value: u32) -> Self {
        Self {
            value,
            unit: ResolutionUnit::ArcSecond,
        }
    }

    pub fn arc_minutes(value: u32) -> Self {
        Self {
            value,
            unit: ResolutionUnit::ArcMinute,
        }
    }

    /// Spacing in arc-seconds
    pub fn as_arc_seconds(&self) -> f64 {
        match self.unit {
            ResolutionUnit::ArcSecond => self.value as f64,
            ResolutionUnit::ArcMinute => self.value as f64 * 60.0,
        }
    }

    /// Nominal spacing in meters at the equator
    pub fn spacing_meters(&self) -> f64 {
        self.as_arc_seconds() * METERS_PER_ARC_SECOND
    }
}

impl FromStr for Resolution {
    type Err = TopographyError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let invalid = || TopographyError::InvalidResolution(s.to_string());

        let unit = match trimmed.chars().last() {
            Some('s') => ResolutionUnit::ArcSecond,
            Some('m') => ResolutionUnit::ArcMinute,
            _ => return Err(invalid()),
        };
        let digits = &trimmed[..trimmed.len() - 1];
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        let value: u32 = digits.parse().map_err(|_| invalid())?;
        if value == 0 {
            return Err(invalid());
        }
        Ok(Self { value, unit })
    }
}

impl TryFrom<String> for Resolution {
    type Error = TopographyError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Resolution> for String {
    fn from(resolution: Resolution) -> Self {
        resolution.to_string()
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let suffix = match self.unit {
            ResolutionUnit::ArcSecond => 's',
            ResolutionUnit::ArcMinute => 'm',
        };
        write!(f, "{:02}{}", self.value, suffix)
    }
}

/// Elevation grid over a region
///
/// Nodes are evenly spaced and include the region edges. Values are meters
/// in row-major order with row 0 on the north edge.
#[derive(Debug, Clone)]
pub struct TopographyGrid {
    /// Region covered by the grid
    pub region: BoundingRegion,
    /// Number of columns
    pub width: usize,
    /// Number of rows
    pub height: usize,
    /// Elevation values (meters)
    pub data: Vec<f32>,
    /// Resolution the grid was requested at
    pub resolution: Resolution,
}

impl TopographyGrid {
    /// Create a grid from existing data
    pub fn from_data(
        region: BoundingRegion,
        width: usize,
        height: usize,
        data: Vec<f32>,
        resolution: Resolution,
    ) -> Result<Self> {
        if width < 2 || height < 2 {
            return Err(TopographyError::InvalidGrid(format!(
                "grid must be at least 2x2, got {}x{}",
                width, height
            )));
        }
        if data.len() != width * height {
            return Err(TopographyError::InvalidGrid(format!(
                "expected {} values for {}x{}, got {}",
                width * height,
                width,
                height,
                data.len()
            )));
        }
        Ok(Self {
            region,
            width,
            height,
            data,
            resolution,
        })
    }

    /// Elevation at a grid node
    pub fn get(&self, x: usize, y: usize) -> Option<f32> {
        if x < self.width && y < self.height {
            Some(self.data[y * self.width + x])
        } else {
            None
        }
    }

    /// Geographic position of a grid node
    pub fn node_coord(&self, x: usize, y: usize) -> GeoCoord {
        let u = x as f64 / (self.width - 1) as f64;
        let v = y as f64 / (self.height - 1) as f64;
        GeoCoord::new(
            self.region.lat_max() - v * self.region.height_deg(),
            self.region.lon_min() + u * self.region.width_deg(),
        )
    }

    /// Node spacing in degrees as (lon, lat)
    pub fn node_spacing_deg(&self) -> (f64, f64) {
        (
            self.region.width_deg() / (self.width - 1) as f64,
            self.region.height_deg() / (self.height - 1) as f64,
        )
    }

    /// Sample with bilinear interpolation; `None` outside the region
    pub fn sample(&self, coord: &GeoCoord) -> Option<f32> {
        if !self.region.contains(coord) {
            return None;
        }

        let u = (coord.lon - self.region.lon_min()) / self.region.width_deg();
        let v = (self.region.lat_max() - coord.lat) / self.region.height_deg();
        self.sample_fractional(u * (self.width - 1) as f64, v * (self.height - 1) as f64)
    }

    /// Bilinear sample at fractional grid coordinates (column, row)
    pub fn sample_fractional(&self, gx: f64, gy: f64) -> Option<f32> {
        let gx = gx.clamp(0.0, (self.width - 1) as f64);
        let gy = gy.clamp(0.0, (self.height - 1) as f64);

        let x0 = gx.floor() as usize;
        let y0 = gy.floor() as usize;
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.height - 1);

        let fx = (gx - x0 as f64) as f32;
        let fy = (gy - y0 as f64) as f32;

        let v00 = self.get(x0, y0)?;
        let v10 = self.get(x1, y0)?;
        let v01 = self.get(x0, y1)?;
        let v11 = self.get(x1, y1)?;

        let v0 = v00 * (1.0 - fx) + v10 * fx;
        let v1 = v01 * (1.0 - fx) + v11 * fx;
        Some(v0 * (1.0 - fy) + v1 * fy)
    }

    /// Minimum and maximum elevation, ignoring NaN nodes
    pub fn min_max(&self) -> (f32, f32) {
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        for &v in self.data.iter().filter(|v| !v.is_nan()) {
            min = min.min(v);
            max = max.max(v);
        }
        (min, max)
    }
}

/// Source of elevation grids
#[async_trait]
pub trait TopographyProvider: Send + Sync {
    /// Short name used in log messages
    fn name(&self) -> &str;

    /// Load a grid covering `region` at `resolution`
    async fn load(&self, region: &BoundingRegion, resolution: Resolution) -> Result<TopographyGrid>;
}

/// Load topography, trying each resolution in preference order
///
/// Failed attempts are logged at debug level. If every resolution fails the
/// error is [`TopographyError::Exhausted`] wrapping the last cause.
pub async fn load_topography<P>(
    provider: &P,
    region: &BoundingRegion,
    preferences: &[Resolution],
) -> Result<(Resolution, TopographyGrid)>
where
    P: TopographyProvider + ?Sized,
{
    let outcome = first_success_async(preferences.iter().copied(), move |resolution| async move {
        tracing::debug!("Requesting {} topography at {}", provider.name(), resolution);
        provider
            .load(region, resolution)
            .await
            .inspect_err(|err| tracing::debug!("Topography at {} unavailable: {}", resolution, err))
    })
    .await;

    match outcome {
        Ok((resolution, grid)) => {
            tracing::info!(
                "Loaded {}x{} topography grid at {} from {}",
                grid.width,
                grid.height,
                resolution,
                provider.name()
            );
            Ok((resolution, grid))
        }
        Err(AttemptError::NoCandidates) => Err(TopographyError::NoResolutions),
        Err(AttemptError::Exhausted {
            attempts,
            last_candidate,
            last_error,
        }) => Err(TopographyError::Exhausted {
            attempts,
            last_resolution: last_candidate,
            source: Box::new(last_error),
        }),
    }
}
