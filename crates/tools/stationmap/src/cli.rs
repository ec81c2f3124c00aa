//! Command line arguments
//!
//! Flags override values from the configuration file. Anything not given on
//! the command line keeps the file (or built-in default) value.

use std::path::PathBuf;

use clap::Parser;
use stationmap_map::BoundingRegion;

use crate::config::{ConfigError, StationMapConfig};

#[derive(Parser, Debug, Clone)]
#[command(name = "station-map")]
#[command(about = "Plot infrasound array locations on a shaded-relief map", long_about = None)]
pub struct Cli {
    /// Load settings from a TOML file
    #[arg(long, short = 'c', value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Save the figure as PNG
    #[arg(long)]
    pub save: bool,

    /// Directory the figure is saved to (implies --save)
    #[arg(long, value_name = "DIR")]
    pub save_dir: Option<PathBuf>,

    /// File name of the saved figure
    #[arg(long, value_name = "NAME")]
    pub file_name: Option<String>,

    /// Map region as lon_min,lon_max,lat_min,lat_max
    #[arg(long, value_name = "BOUNDS", value_parser = parse_region, allow_hyphen_values = true, conflicts_with = "auto_region")]
    pub region: Option<BoundingRegion>,

    /// Fit the region around the arrays instead of using the manual region
    #[arg(long)]
    pub auto_region: bool,

    /// Do not open the figure in an image viewer
    #[arg(long)]
    pub no_show: bool,

    /// Skip topography and draw the plain basemap
    #[arg(long)]
    pub no_topo: bool,

    /// Elevation tile cache directory
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Log filter, overrides RUST_LOG (e.g. "debug", "stationmap=trace")
    #[arg(long, value_name = "FILTER")]
    pub log_level: Option<String>,
}

impl Cli {
    /// Configuration file (or defaults) with the command line applied, validated
    pub fn resolve_config(&self) -> Result<StationMapConfig, ConfigError> {
        let base = match &self.config {
            Some(path) => StationMapConfig::load(path)?,
            None => StationMapConfig::default(),
        };
        let config = self.apply_to(base);
        config.validate()?;
        Ok(config)
    }

    pub fn apply_to(&self, mut config: StationMapConfig) -> StationMapConfig {
        if self.save {
            config.output.save = true;
        }
        if let Some(dir) = &self.save_dir {
            config.output.save = true;
            config.output.save_dir = dir.clone();
        }
        if let Some(name) = &self.file_name {
            config.output.file_name = name.clone();
        }
        if let Some(region) = self.region {
            config.region.manual = Some(region);
            config.region.auto = false;
        }
        if self.auto_region {
            config.region.auto = true;
        }
        if self.no_show {
            config.output.show = false;
        }
        if self.no_topo {
            config.topography.enabled = false;
        }
        if let Some(dir) = &self.cache_dir {
            config.topography.terrarium.cache_dir = Some(dir.clone());
            config.topography.terrarium.use_cache = true;
        }
        config
    }
}

fn parse_region(s: &str) -> Result<BoundingRegion, String> {
    let values = s
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("invalid number in region '{}': {}", s, e))?;
    let bounds: [f64; 4] = values
        .try_into()
        .map_err(|v: Vec<f64>| format!("region needs 4 values, got {}", v.len()))?;
    BoundingRegion::from_array(bounds).map_err(|e| e.to_string())
}
