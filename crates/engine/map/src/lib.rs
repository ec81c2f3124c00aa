//! Geographic building blocks for station maps
//!
//! This crate provides coordinate handling, bounding-region selection,
//! topography grids and the providers that fill them.
//!
//! # Modules
//!
//! - [`coords`]: Geographic coordinates and distance helpers
//! - [`region`]: Bounding regions and the auto-fit region selector
//! - [`attempt`]: Ordered-attempt combinator used for fallback chains
//! - [`topography`]: Elevation grids, resolutions and the provider trait
//! - [`tiles`]: Web Mercator tile math
//! - [`terrarium`]: Terrarium-encoded elevation tiles with a disk cache

pub mod attempt;
pub mod coords;
pub mod region;
pub mod terrarium;
pub mod tiles;
pub mod topography;

pub use attempt::{first_success, first_success_async, AttemptError};
pub use coords::GeoCoord;
pub use region::{fit_points, select_region, BoundingRegion, RegionError, RegionPadding};
pub use terrarium::{TerrariumConfig, TerrariumProvider};
pub use tiles::TileCoord;
pub use topography::{
    load_topography, Resolution, TopographyError, TopographyGrid, TopographyProvider,
};
