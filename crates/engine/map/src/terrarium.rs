//! Terrarium elevation tiles
//!
//! Terrarium tiles are 256x256 Web Mercator PNGs whose RGB channels encode
//! elevation as `R * 256 + G + B / 256 - 32768` meters. The public AWS
//! open-data bucket serves them without authentication.
//!
//! Downloaded tiles are kept in a disk cache laid out as
//! `<cache_dir>/terrarium/{z}/{x}/{y}.png`.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::coords::GeoCoord;
use crate::region::BoundingRegion;
use crate::tiles::{global_pixel, tile_count, tiles_for_region, zoom_for_spacing, TileCoord, TILE_SIZE};
use crate::topography::{Resolution, Result, TopographyError, TopographyGrid, TopographyProvider};

/// Public Terrarium tile endpoint
pub const DEFAULT_TERRARIUM_URL: &str =
    "https://s3.amazonaws.com/elevation-tiles-prod/terrarium/{z}/{x}/{y}.png";

/// Settings for [`TerrariumProvider`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrariumConfig {
    /// Tile URL with `{z}`, `{x}` and `{y}` placeholders
    pub url_template: String,
    /// Cache directory; `None` uses the platform cache dir
    pub cache_dir: Option<PathBuf>,
    /// Whether tiles are read from and written to the disk cache
    pub use_cache: bool,
    /// Finest zoom level the tile source serves
    pub max_zoom: u8,
    /// Maximum number of tiles a single grid may need
    pub max_tiles: usize,
    /// Cap on grid columns/rows after resampling
    pub max_grid_dim: usize,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for TerrariumConfig {
    fn default() -> Self {
        Self {
            url_template: DEFAULT_TERRARIUM_URL.to_string(),
            cache_dir: None,
            use_cache: true,
            max_zoom: 15,
            max_tiles: 64,
            max_grid_dim: 2048,
            timeout_secs: 30,
        }
    }
}

impl TerrariumConfig {
    /// Cache directory after applying the platform default
    pub fn resolved_cache_dir(&self) -> Option<PathBuf> {
        if !self.use_cache {
            return None;
        }
        self.cache_dir
            .clone()
            .or_else(|| dirs::cache_dir().map(|dir| dir.join("station-map")))
    }
}

/// Decoded elevation tile (meters, row-major, row 0 north)
#[derive(Debug, Clone)]
pub struct ElevationTile {
    pub size: u32,
    pub data: Vec<f32>,
}

impl ElevationTile {
    pub fn get(&self, x: u32, y: u32) -> Option<f32> {
        if x < self.size && y < self.size {
            Some(self.data[(y * self.size + x) as usize])
        } else {
            None
        }
    }
}

/// Elevation encoded in one Terrarium pixel
pub fn terrarium_elevation(rgb: [u8; 3]) -> f32 {
    let [r, g, b] = rgb;
    r as f32 * 256.0 + g as f32 + b as f32 / 256.0 - 32768.0
}

/// Decode a Terrarium PNG
pub fn decode_terrarium(name: &str, bytes: &[u8]) -> Result<ElevationTile> {
    let image = image::load_from_memory(bytes)
        .map_err(|source| TopographyError::Decode {
            name: name.to_string(),
            source,
        })?
        .to_rgb8();

    if image.width() != TILE_SIZE || image.height() != TILE_SIZE {
        return Err(TopographyError::InvalidTile {
            name: name.to_string(),
            message: format!(
                "expected {}x{} pixels, got {}x{}",
                TILE_SIZE,
                TILE_SIZE,
                image.width(),
                image.height()
            ),
        });
    }

    let data = image.pixels().map(|p| terrarium_elevation(p.0)).collect();
    Ok(ElevationTile {
        size: TILE_SIZE,
        data,
    })
}

/// On-disk tile cache
#[derive(Debug, Clone)]
pub struct TileCache {
    root: PathBuf,
}

impl TileCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn tile_path(&self, tile: &TileCoord) -> PathBuf {
        self.root
            .join("terrarium")
            .join(tile.zoom.to_string())
            .join(tile.x.to_string())
            .join(format!("{}.png", tile.y))
    }

    /// Cached bytes for a tile, if present
    pub fn read(&self, tile: &TileCoord) -> Option<Vec<u8>> {
        fs::read(self.tile_path(tile)).ok()
    }

    pub fn write(&self, tile: &TileCoord, bytes: &[u8]) -> std::io::Result<()> {
        let path = self.tile_path(tile);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, bytes)
    }
}

/// Topography provider backed by Terrarium tiles
pub struct TerrariumProvider {
    client: reqwest::Client,
    config: TerrariumConfig,
    cache: Option<TileCache>,
}

impl TerrariumProvider {
    pub fn new(config: TerrariumConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("station-map/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|source| TopographyError::Network {
                url: config.url_template.clone(),
                source,
            })?;
        let cache = config.resolved_cache_dir().map(TileCache::new);
        if let Some(cache) = &cache {
            tracing::debug!("Terrarium tile cache at {}", cache.root().display());
        }

        Ok(Self {
            client,
            config,
            cache,
        })
    }

    pub fn tile_url(&self, tile: &TileCoord) -> String {
        self.config
            .url_template
            .replace("{z}", &tile.zoom.to_string())
            .replace("{x}", &tile.x.to_string())
            .replace("{y}", &tile.y.to_string())
    }

    /// Pick the zoom level and tile set for a request
    fn plan(&self, region: &BoundingRegion, resolution: Resolution) -> Result<(u8, Vec<TileCoord>)> {
        let zoom = zoom_for_spacing(
            resolution.spacing_meters(),
            region.center().lat,
            self.config.max_zoom,
        )
        .ok_or_else(|| TopographyError::UnsupportedResolution {
            resolution,
            reason: format!(
                "finer than zoom {}, the finest level {} serves",
                self.config.max_zoom,
                self.name()
            ),
        })?;

        let count = tile_count(region, zoom);
        if count > self.config.max_tiles {
            return Err(TopographyError::TooManyTiles {
                resolution,
                tiles: count,
                limit: self.config.max_tiles,
            });
        }

        Ok((zoom, tiles_for_region(region, zoom)))
    }

    async fn fetch_tile(&self, tile: TileCoord) -> Result<ElevationTile> {
        let name = tile.to_string();

        if let Some(bytes) = self.cache.as_ref().and_then(|cache| cache.read(&tile)) {
            match decode_terrarium(&name, &bytes) {
                Ok(decoded) => return Ok(decoded),
                Err(err) => tracing::debug!("Ignoring unreadable cached tile {}: {}", name, err),
            }
        }

        let url = self.tile_url(&tile);
        tracing::debug!("Downloading elevation tile {}", url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| TopographyError::Network {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TopographyError::Http {
                url,
                status: status.as_u16(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|source| TopographyError::Network {
                url: url.clone(),
                source,
            })?;
        let decoded = decode_terrarium(&name, &bytes)?;

        if let Some(cache) = &self.cache {
            if let Err(err) = cache.write(&tile, &bytes) {
                tracing::warn!("Failed to cache elevation tile {}: {}", name, err);
            }
        }

        Ok(decoded)
    }
}

#[async_trait]
impl TopographyProvider for TerrariumProvider {
    fn name(&self) -> &str {
        "terrarium"
    }

    async fn load(&self, region: &BoundingRegion, resolution: Resolution) -> Result<TopographyGrid> {
        let (zoom, tiles) = self.plan(region, resolution)?;
        tracing::debug!(
            "Resolution {} maps to zoom {} ({} tiles)",
            resolution,
            zoom,
            tiles.len()
        );

        let mut fetched = HashMap::with_capacity(tiles.len());
        for tile in tiles {
            let decoded = self.fetch_tile(tile).await?;
            fetched.insert(tile, decoded);
        }

        assemble_grid(region, resolution, zoom, &fetched, self.config.max_grid_dim)
    }
}

/// Stitched view over a set of same-zoom tiles, addressed in global pixels
struct Mosaic<'a> {
    tiles: &'a HashMap<TileCoord, ElevationTile>,
    zoom: u8,
    min_px: (f64, f64),
    max_px: (f64, f64),
}

impl<'a> Mosaic<'a> {
    fn new(tiles: &'a HashMap<TileCoord, ElevationTile>, zoom: u8) -> Option<Self> {
        let min_x = tiles.keys().map(|t| t.x).min()?;
        let max_x = tiles.keys().map(|t| t.x).max()?;
        let min_y = tiles.keys().map(|t| t.y).min()?;
        let max_y = tiles.keys().map(|t| t.y).max()?;
        let size = TILE_SIZE as f64;

        Some(Self {
            tiles,
            zoom,
            min_px: (min_x as f64 * size, min_y as f64 * size),
            max_px: ((max_x + 1) as f64 * size - 1.0, (max_y + 1) as f64 * size - 1.0),
        })
    }

    fn pixel(&self, px: u32, py: u32) -> f32 {
        let tile = TileCoord::new(px / TILE_SIZE, py / TILE_SIZE, self.zoom);
        self.tiles
            .get(&tile)
            .and_then(|t| t.get(px % TILE_SIZE, py % TILE_SIZE))
            .unwrap_or(f32::NAN)
    }

    /// Bilinear sample at pixel-centre coordinates
    fn sample(&self, gx: f64, gy: f64) -> f32 {
        let u = (gx - 0.5).clamp(self.min_px.0, self.max_px.0);
        let v = (gy - 0.5).clamp(self.min_px.1, self.max_px.1);

        let x0 = u.floor();
        let y0 = v.floor();
        let x1 = (x0 + 1.0).min(self.max_px.0);
        let y1 = (y0 + 1.0).min(self.max_px.1);
        let fx = (u - x0) as f32;
        let fy = (v - y0) as f32;

        let v00 = self.pixel(x0 as u32, y0 as u32);
        let v10 = self.pixel(x1 as u32, y0 as u32);
        let v01 = self.pixel(x0 as u32, y1 as u32);
        let v11 = self.pixel(x1 as u32, y1 as u32);

        let top = v00 * (1.0 - fx) + v10 * fx;
        let bottom = v01 * (1.0 - fx) + v11 * fx;
        top * (1.0 - fy) + bottom * fy
    }
}

/// Resample fetched tiles onto a regular lon/lat grid covering `region`
///
/// The grid gets roughly one node per source pixel, capped at `max_dim`
/// nodes per axis.
pub fn assemble_grid(
    region: &BoundingRegion,
    resolution: Resolution,
    zoom: u8,
    tiles: &HashMap<TileCoord, ElevationTile>,
    max_dim: usize,
) -> Result<TopographyGrid> {
    let mosaic = Mosaic::new(tiles, zoom)
        .ok_or_else(|| TopographyError::InvalidGrid("no tiles to assemble".to_string()))?;

    let north_west = global_pixel(&GeoCoord::new(region.lat_max(), region.lon_min()), zoom);
    let south_east = global_pixel(&GeoCoord::new(region.lat_min(), region.lon_max()), zoom);
    let max_dim = max_dim.max(2);
    let width = ((south_east.0 - north_west.0).ceil() as usize + 1).clamp(2, max_dim);
    let height = ((south_east.1 - north_west.1).ceil() as usize + 1).clamp(2, max_dim);

    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        let lat = region.lat_max() - row as f64 / (height - 1) as f64 * region.height_deg();
        for col in 0..width {
            let lon = region.lon_min() + col as f64 / (width - 1) as f64 * region.width_deg();
            let (gx, gy) = global_pixel(&GeoCoord::new(lat, lon), zoom);
            data.push(mosaic.sample(gx, gy));
        }
    }

    TopographyGrid::from_data(*region, width, height, data, resolution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn encode_constant_tile(elevation: f32) -> Vec<u8> {
        let encoded = elevation + 32768.0;
        let r = (encoded / 256.0).floor();
        let g = (encoded - r * 256.0).floor();
        let b = ((encoded - r * 256.0 - g) * 256.0).round();
        let image = RgbImage::from_pixel(TILE_SIZE, TILE_SIZE, Rgb([r as u8, g as u8, b as u8]));

        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn region() -> BoundingRegion {
        BoundingRegion::from_array([-116.075, -116.033, 37.17, 37.23]).unwrap()
    }

    fn offline_config(cache_dir: &Path) -> TerrariumConfig {
        TerrariumConfig {
            // Nothing listens on the discard port; any download attempt fails fast
            url_template: "http://127.0.0.1:9/{z}/{x}/{y}.png".to_string(),
            cache_dir: Some(cache_dir.to_path_buf()),
            timeout_secs: 2,
            ..TerrariumConfig::default()
        }
    }

    #[test]
    fn test_terrarium_elevation() {
        assert_eq!(terrarium_elevation([128, 0, 0]), 0.0);
        assert_eq!(terrarium_elevation([131, 232, 0]), 1000.0);
        assert_eq!(terrarium_elevation([127, 255, 128]), -0.5);
    }

    #[test]
    fn test_decode_terrarium_tile() {
        let tile = decode_terrarium("test", &encode_constant_tile(1500.0)).unwrap();
        assert_eq!(tile.size, TILE_SIZE);
        assert_eq!(tile.get(0, 0), Some(1500.0));
        assert_eq!(tile.get(255, 255), Some(1500.0));
        assert_eq!(tile.get(256, 0), None);
    }

    #[test]
    fn test_decode_rejects_garbage_and_wrong_size() {
        assert!(matches!(
            decode_terrarium("junk", b"not a png"),
            Err(TopographyError::Decode { .. })
        ));

        let small = RgbImage::from_pixel(16, 16, Rgb([128, 0, 0]));
        let mut bytes = Vec::new();
        small
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        assert!(matches!(
            decode_terrarium("small", &bytes),
            Err(TopographyError::InvalidTile { .. })
        ));
    }

    #[test]
    fn test_tile_cache_layout_and_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TileCache::new(dir.path());
        let tile = TileCoord::new(724, 1589, 12);

        assert_eq!(
            cache.tile_path(&tile),
            dir.path().join("terrarium").join("12").join("724").join("1589.png")
        );
        assert!(cache.read(&tile).is_none());
        cache.write(&tile, b"payload").unwrap();
        assert_eq!(cache.read(&tile).as_deref(), Some(&b"payload"[..]));
    }

    #[test]
    fn test_tile_url_template() {
        let provider = TerrariumProvider::new(TerrariumConfig {
            use_cache: false,
            ..TerrariumConfig::default()
        })
        .unwrap();
        assert_eq!(
            provider.tile_url(&TileCoord::new(1, 2, 3)),
            "https://s3.amazonaws.com/elevation-tiles-prod/terrarium/3/1/2.png"
        );
    }

    #[test]
    fn test_plan_limits() {
        let dir = tempfile::tempdir().unwrap();
        let provider = TerrariumProvider::new(TerrariumConfig {
            max_zoom: 10,
            ..offline_config(dir.path())
        })
        .unwrap();
        let one_arcsec: Resolution = "01s".parse().unwrap();
        assert!(matches!(
            provider.plan(&region(), one_arcsec),
            Err(TopographyError::UnsupportedResolution { .. })
        ));

        let provider = TerrariumProvider::new(TerrariumConfig {
            max_tiles: 4,
            ..offline_config(dir.path())
        })
        .unwrap();
        let wide = BoundingRegion::new(-120.0, -110.0, 33.0, 41.0).unwrap();
        assert!(matches!(
            provider.plan(&wide, one_arcsec),
            Err(TopographyError::TooManyTiles { limit: 4, .. })
        ));

        let (zoom, tiles) = provider.plan(&region(), one_arcsec).unwrap();
        assert_eq!(zoom, 12);
        assert!(!tiles.is_empty() && tiles.len() <= 4);
    }

    #[test]
    fn test_assemble_constant_grid() {
        let region = region();
        let zoom = 12;
        let tiles: HashMap<_, _> = tiles_for_region(&region, zoom)
            .into_iter()
            .map(|t| (t, decode_terrarium("t", &encode_constant_tile(1200.0)).unwrap()))
            .collect();

        let grid = assemble_grid(&region, "01s".parse().unwrap(), zoom, &tiles, 64).unwrap();
        assert!(grid.width >= 2 && grid.width <= 64);
        assert!(grid.height >= 2 && grid.height <= 64);
        assert!(grid.data.iter().all(|v| (*v - 1200.0).abs() < 1e-3));
    }

    #[test]
    fn test_assemble_without_tiles_fails() {
        let tiles = HashMap::new();
        assert!(assemble_grid(&region(), "01s".parse().unwrap(), 12, &tiles, 64).is_err());
    }

    #[tokio::test]
    async fn test_load_served_from_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TileCache::new(dir.path());
        let region = region();
        for tile in tiles_for_region(&region, 12) {
            cache.write(&tile, &encode_constant_tile(900.0)).unwrap();
        }

        let provider = TerrariumProvider::new(offline_config(dir.path())).unwrap();
        let grid = provider.load(&region, "01s".parse().unwrap()).await.unwrap();
        assert_eq!(grid.region, region);
        assert_eq!(grid.min_max(), (900.0, 900.0));
    }

    #[tokio::test]
    async fn test_load_fails_without_cache_or_network() {
        let dir = tempfile::tempdir().unwrap();
        let provider = TerrariumProvider::new(offline_config(dir.path())).unwrap();
        let result = provider.load(&region(), "01s".parse().unwrap()).await;
        assert!(matches!(result, Err(TopographyError::Network { .. })));
    }
}
