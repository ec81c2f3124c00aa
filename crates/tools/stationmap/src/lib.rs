//! Seismo-acoustic station map generator
//!
//! Queries station metadata, groups array elements into arrays, picks the map
//! region, loads topography with a resolution fallback chain and renders the
//! figure.

pub mod cli;
pub mod config;
pub mod pipeline;

pub use cli::Cli;
pub use config::{ConfigError, StationMapConfig};
pub use pipeline::{run, BackgroundKind, RunReport};
