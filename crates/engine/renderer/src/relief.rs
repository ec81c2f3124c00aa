//! Shaded-relief raster for the map background

use stationmap_map::coords::{meters_per_degree_lon, METERS_PER_DEGREE};
use stationmap_map::{BoundingRegion, GeoCoord, TopographyGrid};

use crate::projection::MapProjection;

/// Light source, degrees clockwise from north
const LIGHT_AZIMUTH: f64 = 315.0;
const LIGHT_ALTITUDE: f64 = 45.0;

const WATER: [f64; 3] = [160.0, 200.0, 235.0];

/// Elevation colour ramp from the lowest to the highest point of the grid
const RAMP: &[(f32, [f64; 3])] = &[
    (0.00, [46.0, 112.0, 62.0]),
    (0.25, [148.0, 168.0, 92.0]),
    (0.50, [214.0, 194.0, 128.0]),
    (0.75, [168.0, 122.0, 82.0]),
    (1.00, [242.0, 240.0, 235.0]),
];

/// Per-node illumination in `[0, 1]`, flat ground at `sin(altitude)`
pub fn hillshade(grid: &TopographyGrid) -> Vec<f32> {
    let (dlon, dlat) = grid.node_spacing_deg();
    let mid_lat = grid.region.center().lat;
    let dx_m = dlon * meters_per_degree_lon(mid_lat);
    let dy_m = dlat * METERS_PER_DEGREE;

    let az = LIGHT_AZIMUTH.to_radians();
    let alt = LIGHT_ALTITUDE.to_radians();
    let light = [az.sin() * alt.cos(), az.cos() * alt.cos(), alt.sin()];

    let value = |x: usize, y: usize| grid.get(x, y).map(f64::from).filter(|v| v.is_finite());

    let mut shade = Vec::with_capacity(grid.data.len());
    for y in 0..grid.height {
        for x in 0..grid.width {
            let (west, east) = (x.saturating_sub(1), (x + 1).min(grid.width - 1));
            let (north, south) = (y.saturating_sub(1), (y + 1).min(grid.height - 1));

            let gradient = match (value(west, y), value(east, y), value(x, north), value(x, south)) {
                (Some(w), Some(e), Some(n), Some(s)) => {
                    let dzdx = (e - w) / ((east - west).max(1) as f64 * dx_m);
                    let dzdy = (n - s) / ((south - north).max(1) as f64 * dy_m);
                    Some((dzdx, dzdy))
                }
                _ => None,
            };

            let intensity = match gradient {
                Some((dzdx, dzdy)) => {
                    let norm = (dzdx * dzdx + dzdy * dzdy + 1.0).sqrt();
                    let normal = [-dzdx / norm, -dzdy / norm, 1.0 / norm];
                    (normal[0] * light[0] + normal[1] * light[1] + normal[2] * light[2]).max(0.0)
                }
                None => light[2],
            };
            shade.push(intensity as f32);
        }
    }
    shade
}

/// Ramp colour for a position in `[0, 1]`
fn ramp_color(t: f32) -> [f64; 3] {
    let t = t.clamp(0.0, 1.0);
    for pair in RAMP.windows(2) {
        let (t0, c0) = pair[0];
        let (t1, c1) = pair[1];
        if t <= t1 {
            let f = ((t - t0) / (t1 - t0)) as f64;
            return [
                c0[0] + (c1[0] - c0[0]) * f,
                c0[1] + (c1[1] - c0[1]) * f,
                c0[2] + (c1[2] - c0[2]) * f,
            ];
        }
    }
    RAMP[RAMP.len() - 1].1
}

/// Render `grid` as an RGB raster covering `region` at `size` pixels
///
/// Rows follow the projected y axis, so the raster lines up with a chart
/// built on [`MapProjection::y_range`]. `transparency` (percent) fades the
/// relief towards white. Nodes without data are painted as water, and so is
/// everything below `water_level_m` when it is set.
pub fn shade_relief(
    grid: &TopographyGrid,
    region: &BoundingRegion,
    projection: &MapProjection,
    size: (u32, u32),
    transparency: f64,
    water_level_m: Option<f64>,
) -> Vec<u8> {
    let (width, height) = size;
    let (y_south, y_north) = projection.y_range(region);
    let (min, max) = grid.min_max();
    let span = if max - min > 1.0 { max - min } else { 1.0 };
    let fade = (transparency / 100.0).clamp(0.0, 1.0);
    let flat = LIGHT_ALTITUDE.to_radians().sin() as f32;

    let shade = hillshade(grid);
    let shade_grid = TopographyGrid::from_data(grid.region, grid.width, grid.height, shade, grid.resolution).ok();

    let mut raster = Vec::with_capacity(width as usize * height as usize * 3);
    for py in 0..height {
        let y = y_north - (py as f64 + 0.5) / height as f64 * (y_north - y_south);
        let lat = projection.unproject_lat(y);
        for px in 0..width {
            let lon = region.lon_min() + (px as f64 + 0.5) / width as f64 * region.width_deg();
            let coord = GeoCoord::new(lat, lon);

            let base = match grid.sample(&coord).filter(|z| z.is_finite()) {
                Some(z) if water_level_m.is_some_and(|level| f64::from(z) < level) => WATER,
                Some(z) => ramp_color((z - min) / span),
                None => WATER,
            };
            let intensity = shade_grid
                .as_ref()
                .and_then(|g| g.sample(&coord))
                .unwrap_or(flat);
            let factor = (0.55 + 0.45 * (intensity / flat)).clamp(0.35, 1.25) as f64;

            for channel in base {
                let lit = (channel * factor).min(255.0);
                let faded = lit * (1.0 - fade) + 255.0 * fade;
                raster.push(faded.round() as u8);
            }
        }
    }
    raster
}
