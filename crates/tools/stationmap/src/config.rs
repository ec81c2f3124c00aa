//! Run configuration loaded from TOML
//!
//! Every section is optional; missing values fall back to the SPE reference
//! study (SN.IS* infrasound arrays around the Source Physics Experiment site).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use stationmap_map::{BoundingRegion, GeoCoord, RegionPadding, Resolution, TerrariumConfig};
use stationmap_renderer::{Epicenter, FigureStyle};
use stationmap_stations::StationQuery;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

impl ConfigError {
    fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationMapConfig {
    pub query: StationQuery,
    /// Station service request timeout
    pub request_timeout_secs: u64,
    pub region: RegionConfig,
    pub epicenter: EpicenterConfig,
    pub topography: TopographyConfig,
    pub figure: FigureStyle,
    pub output: OutputConfig,
}

impl Default for StationMapConfig {
    fn default() -> Self {
        Self {
            query: StationQuery::default(),
            request_timeout_secs: 60,
            region: RegionConfig::default(),
            epicenter: EpicenterConfig::default(),
            topography: TopographyConfig::default(),
            figure: FigureStyle::default(),
            output: OutputConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionConfig {
    /// Ignore `manual` and fit the region around the arrays
    pub auto: bool,
    /// `[lon_min, lon_max, lat_min, lat_max]`
    pub manual: Option<BoundingRegion>,
    pub padding: RegionPadding,
    /// Count the epicenter as one of the points the auto-fit must contain
    pub include_epicenter: bool,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            auto: false,
            manual: BoundingRegion::from_array([-116.075, -116.033, 37.17, 37.23]).ok(),
            padding: RegionPadding::default(),
            include_epicenter: false,
        }
    }
}

impl RegionConfig {
    /// The region that short-circuits auto-fit, if any
    pub fn override_region(&self) -> Option<BoundingRegion> {
        if self.auto {
            None
        } else {
            self.manual
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EpicenterConfig {
    pub show: bool,
    pub lat: f64,
    pub lon: f64,
    pub name: String,
}

impl Default for EpicenterConfig {
    fn default() -> Self {
        Self {
            show: true,
            lat: 37.2212,
            lon: -116.0609,
            name: "SPE".to_string(),
        }
    }
}

impl EpicenterConfig {
    pub fn epicenter(&self) -> Option<Epicenter> {
        self.show.then(|| Epicenter {
            lat: self.lat,
            lon: self.lon,
            name: self.name.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopographyConfig {
    pub enabled: bool,
    /// Grid resolutions to try, finest first
    pub resolutions: Vec<Resolution>,
    pub terrarium: TerrariumConfig,
}

impl Default for TopographyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            resolutions: vec![
                Resolution::arc_seconds(1),
                Resolution::arc_seconds(3),
                Resolution::arc_seconds(15),
            ],
            terrarium: TerrariumConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub save: bool,
    pub save_dir: PathBuf,
    pub file_name: String,
    /// Open the figure in the platform image viewer
    pub show: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            save: false,
            save_dir: PathBuf::from("."),
            file_name: "SPE_station_map.png".to_string(),
            show: true,
        }
    }
}

impl StationMapConfig {
    /// Load from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Check every setting once, before any network access
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.query
            .validate()
            .map_err(|e| ConfigError::invalid("query", e.to_string()))?;
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::invalid("request_timeout_secs", "must be positive"));
        }

        self.region
            .padding
            .validate()
            .map_err(|e| ConfigError::invalid("region.padding", e.to_string()))?;

        if self.epicenter.show {
            let (lat, lon) = (self.epicenter.lat, self.epicenter.lon);
            if !GeoCoord::new(lat, lon).is_valid() {
                return Err(ConfigError::invalid(
                    "epicenter",
                    format!("invalid coordinates ({}, {})", lat, lon),
                ));
            }
        }

        if self.topography.enabled && self.topography.resolutions.is_empty() {
            return Err(ConfigError::invalid(
                "topography.resolutions",
                "at least one resolution is required when topography is enabled",
            ));
        }
        let terrarium = &self.topography.terrarium;
        if !terrarium.url_template.contains("{z}")
            || !terrarium.url_template.contains("{x}")
            || !terrarium.url_template.contains("{y}")
        {
            return Err(ConfigError::invalid(
                "topography.terrarium.url_template",
                format!("'{}' must contain {{z}}, {{x}} and {{y}}", terrarium.url_template),
            ));
        }

        self.figure
            .validate()
            .map_err(|e| ConfigError::invalid("figure", e.to_string()))?;

        let file_name = self.output.file_name.trim();
        if file_name.is_empty() || file_name.contains(['/', '\\']) {
            return Err(ConfigError::invalid(
                "output.file_name",
                format!("'{}' must be a plain file name", self.output.file_name),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
