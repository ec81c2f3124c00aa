//! Web Mercator tile math
//!
//! Standard XYZ tile scheme (same as OpenStreetMap and most tile servers):
//! `2^zoom` tiles per axis, y increasing southwards.

use std::f64::consts::PI;

use crate::coords::GeoCoord;
use crate::region::BoundingRegion;

/// Edge length of a tile in pixels
pub const TILE_SIZE: u32 = 256;

/// Ground resolution of zoom 0 at the equator, meters per pixel for 256px tiles
pub const EQUATOR_METERS_PER_PIXEL: f64 = 156_543.033_92;

/// Latitude limit of the Web Mercator projection
pub const MAX_MERCATOR_LAT: f64 = 85.051_128_78;

/// A map tile coordinate in the Web Mercator tile scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoord {
    /// Tile zoom level
    pub zoom: u8,
    /// X tile coordinate (0 to 2^zoom - 1)
    pub x: u32,
    /// Y tile coordinate (0 to 2^zoom - 1)
    pub y: u32,
}

impl TileCoord {
    pub fn new(x: u32, y: u32, zoom: u8) -> Self {
        Self { zoom, x, y }
    }

    /// Tile containing a geographic coordinate at a zoom level
    pub fn from_geo(coord: &GeoCoord, zoom: u8) -> Self {
        let (px, py) = global_pixel(coord, zoom);
        let n = Self::tiles_at_zoom(zoom);
        let x = (px / TILE_SIZE as f64).floor().max(0.0) as u32;
        let y = (py / TILE_SIZE as f64).floor().max(0.0) as u32;

        Self {
            zoom,
            x: x.min(n - 1),
            y: y.min(n - 1),
        }
    }

    /// Geographic bounds of this tile
    pub fn bounds(&self) -> BoundingRegion {
        let n = Self::tiles_at_zoom(self.zoom) as f64;

        let lon_min = self.x as f64 / n * 360.0 - 180.0;
        let lon_max = (self.x + 1) as f64 / n * 360.0 - 180.0;
        let lat_max = tile_y_to_lat(self.y as f64, n);
        let lat_min = tile_y_to_lat((self.y + 1) as f64, n);

        BoundingRegion::from_ordered(lon_min, lon_max, lat_min, lat_max)
    }

    /// Number of tiles per axis at a zoom level
    pub fn tiles_at_zoom(zoom: u8) -> u32 {
        1_u32 << zoom
    }
}

impl std::fmt::Display for TileCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

fn tile_y_to_lat(y: f64, n: f64) -> f64 {
    (PI * (1.0 - 2.0 * y / n)).sinh().atan().to_degrees()
}

/// Fractional global pixel position of a coordinate at a zoom level
///
/// The world is `TILE_SIZE * 2^zoom` pixels wide; (0, 0) is the north-west corner.
pub fn global_pixel(coord: &GeoCoord, zoom: u8) -> (f64, f64) {
    let world = TILE_SIZE as f64 * TileCoord::tiles_at_zoom(zoom) as f64;
    let lat_rad = coord.lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT).to_radians();

    let x = (coord.lon + 180.0) / 360.0 * world;
    let y = (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * world;
    (x, y)
}

/// Ground sample distance in meters per pixel at a latitude and zoom level
pub fn ground_resolution(lat: f64, zoom: u8) -> f64 {
    EQUATOR_METERS_PER_PIXEL * lat.to_radians().cos() / TileCoord::tiles_at_zoom(zoom) as f64
}

/// Coarsest zoom whose ground sample distance at `lat` is at or below `spacing_m`
///
/// Returns `None` when even `max_zoom` is too coarse.
pub fn zoom_for_spacing(spacing_m: f64, lat: f64, max_zoom: u8) -> Option<u8> {
    (0..=max_zoom).find(|&zoom| ground_resolution(lat, zoom) <= spacing_m)
}

/// All tiles needed to cover a region at a zoom level, row by row from the north
pub fn tiles_for_region(region: &BoundingRegion, zoom: u8) -> Vec<TileCoord> {
    let north_west = TileCoord::from_geo(&GeoCoord::new(region.lat_max(), region.lon_min()), zoom);
    let south_east = TileCoord::from_geo(&GeoCoord::new(region.lat_min(), region.lon_max()), zoom);

    let mut tiles = Vec::new();
    for y in north_west.y..=south_east.y {
        for x in north_west.x..=south_east.x {
            tiles.push(TileCoord::new(x, y, zoom));
        }
    }
    tiles
}

/// Number of tiles [`tiles_for_region`] would return, without allocating
pub fn tile_count(region: &BoundingRegion, zoom: u8) -> usize {
    let north_west = TileCoord::from_geo(&GeoCoord::new(region.lat_max(), region.lon_min()), zoom);
    let south_east = TileCoord::from_geo(&GeoCoord::new(region.lat_min(), region.lon_max()), zoom);
    let columns = (south_east.x - north_west.x + 1) as usize;
    let rows = (south_east.y - north_west.y + 1) as usize;
    columns * rows
}
