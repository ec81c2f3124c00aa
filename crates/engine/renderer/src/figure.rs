//! Map figure composition
//!
//! A figure is drawn in one pass over an RGB buffer: the relief raster is
//! painted into the plot rectangle first, then plotters draws the coastline
//! basemap (when there is no relief), the annotated frame, symbols, labels,
//! scale bar and legend on top.

use std::f64::consts::{PI, SQRT_2};

use image::RgbImage;
use plotters::coord::types::RangedCoordf64;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters::style::{FontDesc, FontFamily, FontStyle};
use serde::{Deserialize, Serialize};
use stationmap_map::coords::meters_per_degree_lon;
use stationmap_map::{BoundingRegion, TopographyGrid};

use crate::backend::FontSafeBackend;
use crate::coastline::Coastline;
use crate::error::{drawing, RenderError, Result};
use crate::legend::{legend_entries, LegendEntry, LegendFile, SYMBOL_COLUMN_CM, TEXT_COLUMN_CM};
use crate::projection::LatitudeAxis;
use crate::relief::shade_relief;
use crate::style::{CoastStyle, FigureStyle, Justify, SymbolShape, SymbolStyle};

/// Largest figure we are willing to allocate
const MAX_PIXELS: u64 = 150_000_000;
const AUTO_TICK_LABELS: usize = 5;
const MAX_TICK_LABELS: usize = 12;
/// Inner ratio of the five-pointed star
const STAR_INNER_RATIO: f64 = 0.382;

const MARGIN_CM: f64 = 0.3;
const X_LABEL_AREA_CM: f64 = 1.1;
const Y_LABEL_AREA_CM: f64 = 1.7;

/// One infrasound array on the map
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayMarker {
    pub lat: f64,
    pub lon: f64,
    pub label: String,
}

/// Ground-truth event location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Epicenter {
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone)]
pub enum Background {
    /// Shaded relief from an elevation grid
    Topography(TopographyGrid),
    /// Plain land/water basemap
    Coastline,
}

/// Everything that goes on one map
#[derive(Debug, Clone)]
pub struct MapScene {
    pub region: BoundingRegion,
    pub arrays: Vec<ArrayMarker>,
    pub epicenter: Option<Epicenter>,
    pub background: Background,
}

/// Pixel layout of a figure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FigureLayout {
    pub width: u32,
    pub height: u32,
    margin: u32,
    x_label_area: u32,
    y_label_area: u32,
    plot: (u32, u32),
}

impl FigureLayout {
    pub fn new(region: &BoundingRegion, style: &FigureStyle) -> Result<Self> {
        let plot = style.projection.plot_size(region, style.dpi);
        let margin = style.cm_to_px(MARGIN_CM).round() as u32;
        let x_label_area = style.cm_to_px(X_LABEL_AREA_CM).round() as u32;
        let y_label_area = style.cm_to_px(Y_LABEL_AREA_CM).round() as u32;

        let width = plot.0.saturating_add(y_label_area).saturating_add(2 * margin);
        let height = plot.1.saturating_add(x_label_area).saturating_add(2 * margin);
        if width as u64 * height as u64 > MAX_PIXELS {
            return Err(RenderError::FigureTooLarge { width, height });
        }

        Ok(Self {
            width,
            height,
            margin,
            x_label_area,
            y_label_area,
            plot,
        })
    }

    /// Plot rectangle as (left, top, width, height) in pixels
    pub fn plot_rect(&self) -> (u32, u32, u32, u32) {
        (self.margin + self.y_label_area, self.margin, self.plot.0, self.plot.1)
    }
}

/// Plot rectangle in backend pixels, edges inclusive
#[derive(Debug, Clone, Copy)]
struct PlotRect {
    left: i32,
    top: i32,
    right: i32,
    bottom: i32,
}

/// Draw `scene` into a new image
pub fn render_map(scene: &MapScene, style: &FigureStyle) -> Result<RgbImage> {
    style.validate()?;
    let layout = FigureLayout::new(&scene.region, style)?;
    tracing::debug!(
        "Rendering {}x{} figure for region {}",
        layout.width,
        layout.height,
        scene.region
    );

    let mut buffer = vec![255u8; layout.width as usize * layout.height as usize * 3];
    if let Background::Topography(grid) = &scene.background {
        let raster = shade_relief(
            grid,
            &scene.region,
            &style.projection,
            layout.plot,
            style.transparency,
            style.water_level_m,
        );
        paint_raster(&mut buffer, &layout, &raster);
    }

    let coastline = match (&scene.background, &style.coast.shapefile) {
        (Background::Coastline, Some(path)) => {
            let clipped = Coastline::from_shapefile(path)?.clipped_to(&scene.region);
            if clipped.is_empty() {
                tracing::debug!("No coastline features from {} inside {}", path.display(), scene.region);
                None
            } else {
                Some(clipped)
            }
        }
        (Background::Coastline, None) => {
            tracing::info!(
                "No coastline shapefile configured (figure.coast.shapefile), drawing the plot area as land"
            );
            None
        }
        _ => None,
    };

    {
        let backend = BitMapBackend::with_buffer(&mut buffer, (layout.width, layout.height));
        let root = FontSafeBackend::new(backend).into_drawing_area();
        draw_figure(&root, scene, style, &layout, coastline.as_ref())?;
        root.present().map_err(drawing)?;
    }

    RgbImage::from_raw(layout.width, layout.height, buffer)
        .ok_or_else(|| RenderError::Drawing("pixel buffer does not match the figure size".to_string()))
}

/// Plot area fill under the coastline layer
///
/// Water only when land polygons are there to cover it; a shoreline-only
/// layer or no layer at all leaves the plot as land.
fn basemap_fill(coastline: Option<&Coastline>, coast: &CoastStyle) -> crate::style::Color {
    match coastline {
        Some(features) if !features.land.is_empty() => coast.water,
        _ => coast.land,
    }
}

fn paint_raster(buffer: &mut [u8], layout: &FigureLayout, raster: &[u8]) {
    let (left, top, width, height) = layout.plot_rect();
    let stride = layout.width as usize * 3;
    let row_len = width as usize * 3;
    for (row, src) in raster.chunks_exact(row_len).take(height as usize).enumerate() {
        let start = (top as usize + row) * stride + left as usize * 3;
        buffer[start..start + row_len].copy_from_slice(src);
    }
}

fn draw_figure<DB>(
    root: &DrawingArea<DB, Shift>,
    scene: &MapScene,
    style: &FigureStyle,
    layout: &FigureLayout,
    coastline: Option<&Coastline>,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let region = &scene.region;
    let x_axis: RangedCoordf64 = (region.lon_min()..region.lon_max()).into();
    let y_axis = LatitudeAxis::new(region, style.projection);

    let mut chart = ChartBuilder::on(root)
        .margin(layout.margin)
        .set_label_area_size(LabelAreaPosition::Left, layout.y_label_area)
        .set_label_area_size(LabelAreaPosition::Bottom, layout.x_label_area)
        .build_cartesian_2d(x_axis, y_axis)
        .map_err(drawing)?;

    if let Background::Coastline = scene.background {
        let coast = &style.coast;
        chart
            .plotting_area()
            .fill(&basemap_fill(coastline, coast).to_rgb())
            .map_err(drawing)?;

        if let Some(features) = coastline {
            let points = |ring: &Vec<geo_types::Coord<f64>>| ring.iter().map(|c| (c.x, c.y)).collect::<Vec<_>>();
            let land = coast.land.to_rgb().filled();
            let water = coast.water.to_rgb().filled();
            let shoreline = coast
                .shoreline
                .to_rgb()
                .stroke_width(pixels(style.pt_to_px(coast.shoreline_width_pt)));

            chart
                .draw_series(features.land.iter().map(|ring| Polygon::new(points(ring), land)))
                .map_err(drawing)?;
            chart
                .draw_series(features.holes.iter().map(|ring| Polygon::new(points(ring), water)))
                .map_err(drawing)?;
            chart
                .draw_series(features.shorelines.iter().map(|line| PathElement::new(points(line), shoreline)))
                .map_err(drawing)?;
        }
    }

    let frame = &style.frame;
    let frame_pen = pixels(style.pt_to_px(frame.pen_width_pt));
    let axis_font = font(style.pt_to_px(frame.font_size_pt));
    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(tick_label_count(region.width_deg(), frame.tick_interval_deg))
        .y_labels(tick_label_count(region.height_deg(), frame.tick_interval_deg))
        .x_label_formatter(&|v| format!("{:.2}", v))
        .y_label_formatter(&|v| format!("{:.2}", v))
        .x_desc(frame.x_label.as_str())
        .y_desc(frame.y_label.as_str())
        .label_style(axis_font.clone())
        .axis_desc_style(axis_font)
        .axis_style(BLACK.stroke_width(frame_pen))
        .draw()
        .map_err(drawing)?;

    let (x_range, y_range) = chart.plotting_area().get_pixel_range();
    let plot = PlotRect {
        left: x_range.start,
        top: y_range.start,
        right: x_range.end - 1,
        bottom: y_range.end - 1,
    };
    let (left, top, _, _) = layout.plot_rect();
    if (plot.left, plot.top) != (left as i32, top as i32) {
        tracing::debug!(
            "Plot area at ({}, {}) differs from layout ({}, {})",
            plot.left,
            plot.top,
            left,
            top
        );
    }
    root.draw(&Rectangle::new(
        [(plot.left, plot.top), (plot.right, plot.bottom)],
        BLACK.stroke_width(frame_pen),
    ))
    .map_err(drawing)?;

    for marker in &scene.arrays {
        let center = chart.backend_coord(&(marker.lon, marker.lat));
        draw_symbol(root, center, &style.arrays, style)?;
    }

    if style.labels.show {
        let labels = &style.labels;
        let text_style = font(style.pt_to_px(labels.font_size_pt))
            .color(&labels.color.to_rgb())
            .pos(anchor(labels.justify));
        let (dx, dy) = (cm_px(style, labels.offset_cm[0]), cm_px(style, labels.offset_cm[1]));
        for marker in &scene.arrays {
            let (x, y) = chart.backend_coord(&(marker.lon, marker.lat));
            root.draw(&Text::new(marker.label.clone(), (x + dx, y - dy), text_style.clone()))
                .map_err(drawing)?;
        }
    }

    if let Some(epicenter) = &scene.epicenter {
        let center = chart.backend_coord(&(epicenter.lon, epicenter.lat));
        draw_symbol(root, center, &style.epicenter, style)?;
    }

    if style.scale_bar.show {
        draw_scale_bar(root, &plot, region, style)?;
    }

    if style.legend.show {
        let entries = legend_entries(style, scene.epicenter.is_some());
        let file = LegendFile::write(&entries)?;
        let drawn = file
            .read_entries()
            .and_then(|entries| draw_legend(root, &plot, &entries, style));
        file.release();
        drawn?;
    }

    Ok(())
}

fn draw_symbol<DB>(
    root: &DrawingArea<DB, Shift>,
    center: (i32, i32),
    symbol: &SymbolStyle,
    style: &FigureStyle,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let radius = style.cm_to_px(symbol.size_cm) / 2.0;
    let fill = symbol.fill.to_rgb().filled();
    let pen = symbol.pen.to_rgb().stroke_width(pixels(style.pt_to_px(symbol.pen_width_pt)));

    if symbol.shape == SymbolShape::Circle {
        let r = pixels(radius);
        root.draw(&Circle::new(center, r, fill)).map_err(drawing)?;
        root.draw(&Circle::new(center, r, pen)).map_err(drawing)?;
        return Ok(());
    }

    let vertices = symbol_vertices(symbol.shape, center, radius);
    root.draw(&Polygon::new(vertices.clone(), fill)).map_err(drawing)?;
    let mut outline = vertices;
    if let Some(&first) = outline.first() {
        outline.push(first);
    }
    root.draw(&PathElement::new(outline, pen)).map_err(drawing)?;
    Ok(())
}

/// Polygon outline of a marker, `radius` in pixels
fn symbol_vertices(shape: SymbolShape, center: (i32, i32), radius: f64) -> Vec<(i32, i32)> {
    let (cx, cy) = (center.0 as f64, center.1 as f64);
    let ring = |count: usize, start_deg: f64, r_at: &dyn Fn(usize) -> f64| -> Vec<(i32, i32)> {
        (0..count)
            .map(|i| {
                let angle = start_deg.to_radians() + i as f64 * 2.0 * PI / count as f64;
                let r = r_at(i);
                ((cx + r * angle.cos()).round() as i32, (cy + r * angle.sin()).round() as i32)
            })
            .collect()
    };

    match shape {
        SymbolShape::Hexagon => ring(6, 0.0, &|_| radius),
        SymbolShape::Star => ring(10, -90.0, &|i| {
            if i % 2 == 0 {
                radius
            } else {
                radius * STAR_INNER_RATIO
            }
        }),
        SymbolShape::Square => ring(4, 45.0, &|_| radius * SQRT_2),
        SymbolShape::Triangle => ring(3, -90.0, &|_| radius),
        SymbolShape::Diamond => ring(4, -90.0, &|_| radius),
        SymbolShape::Circle => ring(32, 0.0, &|_| radius),
    }
}

fn draw_scale_bar<DB>(
    root: &DrawingArea<DB, Shift>,
    plot: &PlotRect,
    region: &BoundingRegion,
    style: &FigureStyle,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let bar = &style.scale_bar;
    let degrees = bar.length_km * 1000.0 / meters_per_degree_lon(region.center().lat);
    let length = (degrees / region.width_deg() * (plot.right - plot.left) as f64).round() as i32;

    let x0 = plot.left + cm_px(style, bar.offset_cm[0]);
    let x1 = x0 + length;
    let y = plot.bottom - cm_px(style, bar.offset_cm[1]);
    let tick = style.pt_to_px(bar.height_pt).round() as i32;
    let pen = BLACK.stroke_width(pixels(style.pt_to_px(bar.pen_width_pt)));

    root.draw(&PathElement::new(vec![(x0, y), (x1, y)], pen))
        .map_err(drawing)?;
    for x in [x0, x1] {
        root.draw(&PathElement::new(vec![(x, y - tick), (x, y)], pen))
            .map_err(drawing)?;
    }

    let text_style = font(style.pt_to_px(bar.font_size_pt))
        .color(&BLACK)
        .pos(Pos::new(HPos::Center, VPos::Bottom));
    root.draw(&Text::new(
        scale_label(bar.length_km),
        ((x0 + x1) / 2, y - tick - 2),
        text_style,
    ))
    .map_err(drawing)?;
    Ok(())
}

fn scale_label(length_km: f64) -> String {
    if length_km >= 1.0 {
        format!("{} km", length_km)
    } else {
        format!("{} m", (length_km * 1000.0).round())
    }
}

fn draw_legend<DB>(
    root: &DrawingArea<DB, Shift>,
    plot: &PlotRect,
    entries: &[LegendEntry],
    style: &FigureStyle,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    if entries.is_empty() {
        return Ok(());
    }

    let legend = &style.legend;
    let font_px = style.pt_to_px(legend.font_size_pt);
    let text_style = font(font_px).color(&BLACK).pos(Pos::new(HPos::Left, VPos::Center));

    let symbol_px = entries
        .iter()
        .map(|e| style.cm_to_px(e.size_cm))
        .fold(0.0, f64::max);
    let row_height = (symbol_px.max(font_px) * 1.5).round() as i32;
    let pad = cm_px(style, 0.15);

    let mut text_width = 0;
    for entry in entries {
        let (w, _) = root.estimate_text_size(&entry.label, &text_style).map_err(drawing)?;
        text_width = text_width.max(w as i32);
    }

    let width = cm_px(style, TEXT_COLUMN_CM) + text_width + pad;
    let height = row_height * entries.len() as i32 + 2 * pad;
    let right = plot.right - cm_px(style, legend.offset_cm[0]);
    let top = plot.top + cm_px(style, legend.offset_cm[1]);
    let corners = [(right - width, top), (right, top + height)];

    root.draw(&Rectangle::new(corners, legend.fill.to_rgb().filled()))
        .map_err(drawing)?;
    root.draw(&Rectangle::new(
        corners,
        legend
            .pen
            .to_rgb()
            .stroke_width(pixels(style.pt_to_px(legend.pen_width_pt))),
    ))
    .map_err(drawing)?;

    let left = right - width;
    for (i, entry) in entries.iter().enumerate() {
        let y = top + pad + row_height * i as i32 + row_height / 2;
        draw_symbol(root, (left + cm_px(style, SYMBOL_COLUMN_CM), y), &entry.symbol(), style)?;
        root.draw(&Text::new(
            entry.label.clone(),
            (left + cm_px(style, TEXT_COLUMN_CM), y),
            text_style.clone(),
        ))
        .map_err(drawing)?;
    }
    Ok(())
}

/// Number of tick labels for a span; falls back to automatic spacing when
/// the requested interval would crowd or starve the axis
fn tick_label_count(span_deg: f64, interval: Option<f64>) -> usize {
    match interval {
        Some(step) => {
            let count = (span_deg / step + 1e-9).floor() as usize + 1;
            if (2..=MAX_TICK_LABELS).contains(&count) {
                count
            } else {
                AUTO_TICK_LABELS
            }
        }
        None => AUTO_TICK_LABELS,
    }
}

fn font(size_px: f64) -> FontDesc<'static> {
    FontDesc::new(FontFamily::SansSerif, size_px, FontStyle::Normal)
}

fn anchor(justify: Justify) -> Pos {
    let h = match justify.horizontal {
        'L' => HPos::Left,
        'R' => HPos::Right,
        _ => HPos::Center,
    };
    let v = match justify.vertical {
        'T' => VPos::Top,
        'B' => VPos::Bottom,
        _ => VPos::Center,
    };
    Pos::new(h, v)
}

fn cm_px(style: &FigureStyle, cm: f64) -> i32 {
    style.cm_to_px(cm).round() as i32
}

/// Stroke width in whole pixels, never thinner than one
fn pixels(px: f64) -> u32 {
    px.round().max(1.0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region() -> BoundingRegion {
        BoundingRegion::from_array([-116.075, -116.033, 37.17, 37.23]).unwrap()
    }

    #[test]
    fn test_basemap_fill() {
        use geo_types::Coord;

        let coast = CoastStyle::default();
        let unit = vec![
            Coord { x: 0.0, y: 0.0 },
            Coord { x: 1.0, y: 0.0 },
            Coord { x: 1.0, y: 1.0 },
            Coord { x: 0.0, y: 0.0 },
        ];
        let land = Coastline {
            land: vec![unit.clone()],
            ..Coastline::default()
        };
        let shorelines_only = Coastline {
            shorelines: vec![unit],
            ..Coastline::default()
        };

        assert_eq!(basemap_fill(None, &coast), coast.land);
        assert_eq!(basemap_fill(Some(&land), &coast), coast.water);
        assert_eq!(basemap_fill(Some(&shorelines_only), &coast), coast.land);
    }

    #[test]
    fn test_tick_label_count() {
        assert_eq!(tick_label_count(0.042, Some(0.02)), 3);
        assert_eq!(tick_label_count(0.06, Some(0.02)), 4);
        // Far too many ticks for a large region
        assert_eq!(tick_label_count(10.0, Some(0.02)), AUTO_TICK_LABELS);
        assert_eq!(tick_label_count(0.01, Some(0.02)), AUTO_TICK_LABELS);
        assert_eq!(tick_label_count(0.042, None), AUTO_TICK_LABELS);
    }

    #[test]
    fn test_symbol_vertex_counts() {
        assert_eq!(symbol_vertices(SymbolShape::Hexagon, (0, 0), 10.0).len(), 6);
        assert_eq!(symbol_vertices(SymbolShape::Star, (0, 0), 10.0).len(), 10);
        assert_eq!(symbol_vertices(SymbolShape::Triangle, (0, 0), 10.0).len(), 3);

        // Star tip points straight up, inner vertices sit closer to the centre
        let star = symbol_vertices(SymbolShape::Star, (100, 100), 20.0);
        assert_eq!(star[0], (100, 80));
        let dist = |p: (i32, i32)| (((p.0 - 100).pow(2) + (p.1 - 100).pow(2)) as f64).sqrt();
        assert!(dist(star[1]) < dist(star[0]) / 2.0);
    }

    #[test]
    fn test_layout_wraps_plot_area() {
        let style = FigureStyle {
            dpi: 100.0,
            ..FigureStyle::default()
        };
        let layout = FigureLayout::new(&region(), &style).unwrap();
        let (left, top, width, height) = layout.plot_rect();
        assert_eq!((width, height), style.projection.plot_size(&region(), 100.0));
        assert!(left > 0 && top > 0);
        assert!(left + width < layout.width);
        assert!(top + height < layout.height);
    }

    #[test]
    fn test_layout_rejects_huge_figures() {
        let style = FigureStyle {
            projection: "M500c".parse().unwrap(),
            dpi: 2400.0,
            ..FigureStyle::default()
        };
        let result = FigureLayout::new(&region(), &style);
        assert!(matches!(result, Err(RenderError::FigureTooLarge { .. })));
    }

    #[test]
    fn test_scale_label() {
        assert_eq!(scale_label(1.0), "1 km");
        assert_eq!(scale_label(2.5), "2.5 km");
        assert_eq!(scale_label(0.5), "500 m");
    }

    #[test]
    fn test_anchor_from_justify() {
        let pos = anchor("RB".parse().unwrap());
        assert!(matches!(pos.h_pos, HPos::Right));
        assert!(matches!(pos.v_pos, VPos::Bottom));
    }
}
