//! Coastline layer for the plain basemap
//!
//! Land polygons and shorelines are read from an ESRI shapefile such as the
//! Natural Earth `ne_10m_land` or `ne_10m_coastline` datasets. Polygon rings
//! become filled land, polyline parts become shorelines.

use std::io::Cursor;
use std::path::Path;

use geo_types::Coord;
use stationmap_map::BoundingRegion;

use crate::error::{RenderError, Result};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Coastline {
    /// Outer land rings (lon/lat)
    pub land: Vec<Vec<Coord<f64>>>,
    /// Water bodies inside land (lakes), drawn back in water colour
    pub holes: Vec<Vec<Coord<f64>>>,
    /// Shoreline polylines
    pub shorelines: Vec<Vec<Coord<f64>>>,
}

impl Coastline {
    pub fn from_shapefile(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let mut reader = shapefile::ShapeReader::new(Cursor::new(bytes.as_slice()))
            .map_err(|e| RenderError::Coastline(format!("{}: {}", path.display(), e)))?;

        let mut coastline = Coastline::default();
        for shape in reader.iter_shapes() {
            let shape = shape.map_err(|e| RenderError::Coastline(format!("{}: {}", path.display(), e)))?;
            coastline.push_shape(&shape);
        }

        tracing::debug!(
            "Loaded coastline from {}: {} land rings, {} shorelines",
            path.display(),
            coastline.land.len(),
            coastline.shorelines.len()
        );
        Ok(coastline)
    }

    fn push_shape(&mut self, shape: &shapefile::Shape) {
        let to_coords = |points: &[shapefile::Point]| -> Vec<Coord<f64>> {
            points.iter().map(|p| Coord { x: p.x, y: p.y }).collect()
        };

        match shape {
            shapefile::Shape::Polygon(polygon) => {
                for ring in polygon.rings() {
                    let coords = to_coords(ring.points());
                    match ring {
                        shapefile::PolygonRing::Outer(_) => self.land.push(coords),
                        shapefile::PolygonRing::Inner(_) => self.holes.push(coords),
                    }
                }
            }
            shapefile::Shape::Polyline(polyline) => {
                for part in polyline.parts() {
                    self.shorelines.push(to_coords(part.as_slice()));
                }
            }
            _ => {}
        }
    }

    /// Clip every feature to `region`
    ///
    /// Land and hole rings are clipped as polygons, shorelines are split into
    /// the runs that stay inside. Features that miss the region disappear.
    pub fn clipped_to(&self, region: &BoundingRegion) -> Coastline {
        let rings = |features: &[Vec<Coord<f64>>]| -> Vec<Vec<Coord<f64>>> {
            features
                .iter()
                .map(|ring| clip_ring(ring, region))
                .filter(|ring| ring.len() >= 3)
                .collect()
        };

        Coastline {
            land: rings(&self.land),
            holes: rings(&self.holes),
            shorelines: self
                .shorelines
                .iter()
                .flat_map(|line| clip_polyline(line, region))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.land.is_empty() && self.holes.is_empty() && self.shorelines.is_empty()
    }
}

#[derive(Clone, Copy)]
enum Edge {
    West(f64),
    East(f64),
    South(f64),
    North(f64),
}

impl Edge {
    fn inside(self, c: Coord<f64>) -> bool {
        match self {
            Edge::West(x) => c.x >= x,
            Edge::East(x) => c.x <= x,
            Edge::South(y) => c.y >= y,
            Edge::North(y) => c.y <= y,
        }
    }

    fn intersect(self, a: Coord<f64>, b: Coord<f64>) -> Coord<f64> {
        match self {
            Edge::West(x) | Edge::East(x) => {
                let t = (x - a.x) / (b.x - a.x);
                Coord { x, y: a.y + t * (b.y - a.y) }
            }
            Edge::South(y) | Edge::North(y) => {
                let t = (y - a.y) / (b.y - a.y);
                Coord { x: a.x + t * (b.x - a.x), y }
            }
        }
    }
}

/// Sutherland-Hodgman clip of a ring against the region rectangle
fn clip_ring(ring: &[Coord<f64>], region: &BoundingRegion) -> Vec<Coord<f64>> {
    let edges = [
        Edge::West(region.lon_min()),
        Edge::East(region.lon_max()),
        Edge::South(region.lat_min()),
        Edge::North(region.lat_max()),
    ];

    let mut output: Vec<Coord<f64>> = ring.to_vec();
    for edge in edges {
        if output.is_empty() {
            break;
        }
        let input = std::mem::take(&mut output);
        let mut prev = input[input.len() - 1];
        for &current in &input {
            match (edge.inside(current), edge.inside(prev)) {
                (true, true) => output.push(current),
                (true, false) => {
                    output.push(edge.intersect(prev, current));
                    output.push(current);
                }
                (false, true) => output.push(edge.intersect(prev, current)),
                (false, false) => {}
            }
            prev = current;
        }
    }
    output
}

/// Liang-Barsky clip of one segment; endpoints inside are returned unchanged
fn clip_segment(a: Coord<f64>, b: Coord<f64>, region: &BoundingRegion) -> Option<(Coord<f64>, Coord<f64>)> {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let mut t0: f64 = 0.0;
    let mut t1: f64 = 1.0;
    let checks = [
        (-dx, a.x - region.lon_min()),
        (dx, region.lon_max() - a.x),
        (-dy, a.y - region.lat_min()),
        (dy, region.lat_max() - a.y),
    ];
    for (p, q) in checks {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
        } else {
            let r = q / p;
            if p < 0.0 {
                t0 = t0.max(r);
            } else {
                t1 = t1.min(r);
            }
        }
    }
    if t0 > t1 {
        return None;
    }
    let at = |t: f64| Coord {
        x: a.x + t * dx,
        y: a.y + t * dy,
    };
    let start = if t0 == 0.0 { a } else { at(t0) };
    let end = if t1 == 1.0 { b } else { at(t1) };
    Some((start, end))
}

fn clip_polyline(line: &[Coord<f64>], region: &BoundingRegion) -> Vec<Vec<Coord<f64>>> {
    let mut runs = Vec::new();
    let mut current: Vec<Coord<f64>> = Vec::new();
    for pair in line.windows(2) {
        match clip_segment(pair[0], pair[1], region) {
            Some((start, end)) => {
                if current.last() != Some(&start) {
                    if current.len() >= 2 {
                        runs.push(std::mem::take(&mut current));
                    }
                    current = vec![start];
                }
                current.push(end);
            }
            None => {
                if current.len() >= 2 {
                    runs.push(std::mem::take(&mut current));
                }
                current.clear();
            }
        }
    }
    if current.len() >= 2 {
        runs.push(current);
    }
    runs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x0: f64, y0: f64, size: f64) -> Vec<Coord<f64>> {
        vec![
            Coord { x: x0, y: y0 },
            Coord { x: x0 + size, y: y0 },
            Coord { x: x0 + size, y: y0 + size },
            Coord { x: x0, y: y0 + size },
            Coord { x: x0, y: y0 },
        ]
    }

    #[test]
    fn test_clip_drops_distant_features() {
        let coastline = Coastline {
            land: vec![square(-117.0, 36.0, 2.0), square(10.0, 50.0, 1.0)],
            holes: vec![],
            shorelines: vec![square(-116.06, 37.19, 0.01), vec![]],
        };
        let region = BoundingRegion::from_array([-116.075, -116.033, 37.17, 37.23]).unwrap();
        let clipped = coastline.clipped_to(&region);

        assert_eq!(clipped.land.len(), 1);
        assert_eq!(clipped.shorelines.len(), 1);
        assert!(!clipped.is_empty());
        assert!(Coastline::default().is_empty());

        // The large square is cut down to the region itself
        for c in &clipped.land[0] {
            assert!(c.x >= region.lon_min() - 1e-12 && c.x <= region.lon_max() + 1e-12);
            assert!(c.y >= region.lat_min() - 1e-12 && c.y <= region.lat_max() + 1e-12);
        }
        assert_eq!(clipped.land[0].len(), 4);
    }

    #[test]
    fn test_shoreline_split_into_inside_runs() {
        let region = BoundingRegion::from_array([0.0, 1.0, 0.0, 1.0]).unwrap();
        // Enters, leaves, enters again
        let line = vec![
            Coord { x: -1.0, y: 0.5 },
            Coord { x: 0.5, y: 0.5 },
            Coord { x: 2.0, y: 0.5 },
            Coord { x: 2.0, y: 0.8 },
            Coord { x: 0.5, y: 0.8 },
        ];
        let runs = clip_polyline(&line, &region);
        let close = |c: Coord<f64>, x: f64, y: f64| (c.x - x).abs() < 1e-9 && (c.y - y).abs() < 1e-9;
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].len(), 3);
        assert!(close(runs[0][0], 0.0, 0.5));
        assert_eq!(runs[0][1], Coord { x: 0.5, y: 0.5 });
        assert!(close(runs[0][2], 1.0, 0.5));
        assert_eq!(runs[1].len(), 2);
        assert!(close(runs[1][0], 1.0, 0.8));
        assert_eq!(runs[1][1], Coord { x: 0.5, y: 0.8 });

        assert!(clip_segment(Coord { x: 2.0, y: 2.0 }, Coord { x: 3.0, y: 3.0 }, &region).is_none());
    }

    #[test]
    fn test_missing_shapefile_is_io_error() {
        let result = Coastline::from_shapefile(Path::new("/nonexistent/ne_10m_land.shp"));
        assert!(matches!(result, Err(RenderError::Io(_))));
    }

    #[test]
    fn test_garbage_shapefile_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.shp");
        std::fs::write(&path, b"definitely not a shapefile").unwrap();

        let result = Coastline::from_shapefile(&path);
        assert!(matches!(result, Err(RenderError::Coastline(_))));
    }
}
