//! Figure styling: colors, symbols, labels, legend and scale bar settings
//!
//! Sizes follow print conventions: symbol sizes and offsets in centimeters,
//! fonts and pens in points. [`FigureStyle::dpi`] turns both into pixels.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use plotters::style::RGBColor;
use serde::{Deserialize, Serialize};

use crate::error::{RenderError, Result};
use crate::projection::MapProjection;

const CM_PER_INCH: f64 = 2.54;
const POINTS_PER_INCH: f64 = 72.0;

/// Opaque RGB color, written as a name, `#rrggbb` or `r/g/b`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color(pub u8, pub u8, pub u8);

const NAMED_COLORS: &[(&str, Color)] = &[
    ("black", Color(0, 0, 0)),
    ("white", Color(255, 255, 255)),
    ("red", Color(255, 0, 0)),
    ("green", Color(0, 255, 0)),
    ("blue", Color(0, 0, 255)),
    ("yellow", Color(255, 255, 0)),
    ("orange", Color(255, 165, 0)),
    ("gray", Color(190, 190, 190)),
    ("grey", Color(190, 190, 190)),
    ("darkgray", Color(169, 169, 169)),
    ("lightgray", Color(211, 211, 211)),
    ("lightblue", Color(173, 216, 230)),
    ("steelblue", Color(70, 130, 180)),
];

impl Color {
    pub const BLACK: Color = Color(0, 0, 0);
    pub const WHITE: Color = Color(255, 255, 255);
    pub const RED: Color = Color(255, 0, 0);
    pub const LIGHT_GRAY: Color = Color(211, 211, 211);
    pub const LIGHT_BLUE: Color = Color(173, 216, 230);

    pub fn to_rgb(self) -> RGBColor {
        RGBColor(self.0, self.1, self.2)
    }
}

impl FromStr for Color {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let invalid = || RenderError::InvalidColor(s.to_string());

        if let Some(hex) = s.strip_prefix('#') {
            if hex.len() != 6 || !hex.is_ascii() {
                return Err(invalid());
            }
            let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
            return Ok(Color(channel(0)?, channel(2)?, channel(4)?));
        }

        if s.contains('/') {
            let parts: Vec<&str> = s.split('/').collect();
            if parts.len() != 3 {
                return Err(invalid());
            }
            let channel = |p: &str| p.trim().parse::<u8>().map_err(|_| invalid());
            return Ok(Color(channel(parts[0])?, channel(parts[1])?, channel(parts[2])?));
        }

        NAMED_COLORS
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(s))
            .map(|(_, color)| *color)
            .ok_or_else(invalid)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match NAMED_COLORS.iter().find(|(_, color)| color == self) {
            Some((name, _)) => f.write_str(name),
            None => write!(f, "#{:02x}{:02x}{:02x}", self.0, self.1, self.2),
        }
    }
}

impl TryFrom<String> for Color {
    type Error = RenderError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

/// Marker shapes, with their GMT symbol codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolShape {
    Hexagon,
    Star,
    Circle,
    Square,
    Triangle,
    Diamond,
}

impl SymbolShape {
    pub fn code(self) -> char {
        match self {
            SymbolShape::Hexagon => 'h',
            SymbolShape::Star => 'a',
            SymbolShape::Circle => 'c',
            SymbolShape::Square => 's',
            SymbolShape::Triangle => 't',
            SymbolShape::Diamond => 'd',
        }
    }

    pub fn from_code(code: char) -> Option<Self> {
        match code {
            'h' => Some(SymbolShape::Hexagon),
            'a' => Some(SymbolShape::Star),
            'c' => Some(SymbolShape::Circle),
            's' => Some(SymbolShape::Square),
            't' => Some(SymbolShape::Triangle),
            'd' => Some(SymbolShape::Diamond),
            _ => None,
        }
    }
}

/// How one category of points is drawn
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SymbolStyle {
    pub shape: SymbolShape,
    /// Symbol diameter in centimeters
    pub size_cm: f64,
    pub fill: Color,
    pub pen: Color,
    #[serde(default = "default_pen_pt")]
    pub pen_width_pt: f64,
}

fn default_pen_pt() -> f64 {
    0.5
}

impl SymbolStyle {
    pub fn array_default() -> Self {
        Self {
            shape: SymbolShape::Hexagon,
            size_cm: 0.5,
            fill: Color::BLACK,
            pen: Color::BLACK,
            pen_width_pt: default_pen_pt(),
        }
    }

    pub fn epicenter_default() -> Self {
        Self {
            shape: SymbolShape::Star,
            size_cm: 0.5,
            fill: Color::RED,
            pen: Color::BLACK,
            pen_width_pt: default_pen_pt(),
        }
    }
}

/// Horizontal and vertical anchor written as a GMT justify code (`"RB"`, `"LT"`, `"CM"`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Justify {
    pub horizontal: char,
    pub vertical: char,
}

impl FromStr for Justify {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || RenderError::InvalidStyle(format!("invalid justification '{}'", s));
        let mut horizontal = 'C';
        let mut vertical = 'M';
        let upper = s.trim().to_ascii_uppercase();
        if upper.is_empty() || upper.len() > 2 {
            return Err(invalid());
        }
        for c in upper.chars() {
            match c {
                'L' | 'R' => horizontal = c,
                'T' | 'B' => vertical = c,
                'C' | 'M' => {}
                _ => return Err(invalid()),
            }
        }
        Ok(Self { horizontal, vertical })
    }
}

impl TryFrom<String> for Justify {
    type Error = RenderError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Justify> for String {
    fn from(j: Justify) -> Self {
        format!("{}{}", j.horizontal, j.vertical)
    }
}

/// Array labels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelStyle {
    pub show: bool,
    pub font_size_pt: f64,
    pub color: Color,
    /// Offset from the symbol centre in centimeters, x right and y up
    pub offset_cm: [f64; 2],
    pub justify: Justify,
}

impl Default for LabelStyle {
    fn default() -> Self {
        Self {
            show: false,
            font_size_pt: 10.0,
            color: Color::BLACK,
            offset_cm: [-0.25, 0.15],
            justify: Justify {
                horizontal: 'R',
                vertical: 'B',
            },
        }
    }
}

/// Frame annotation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameStyle {
    /// Tick spacing in degrees; `None` picks a spacing automatically
    pub tick_interval_deg: Option<f64>,
    pub font_size_pt: f64,
    pub pen_width_pt: f64,
    pub x_label: String,
    pub y_label: String,
}

impl Default for FrameStyle {
    fn default() -> Self {
        Self {
            tick_interval_deg: Some(0.02),
            font_size_pt: 8.0,
            pen_width_pt: 1.0,
            x_label: "Longitude".to_string(),
            y_label: "Latitude".to_string(),
        }
    }
}

/// Scale bar in the lower-left corner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaleBarStyle {
    pub show: bool,
    pub length_km: f64,
    /// Offset from the lower-left plot corner in centimeters
    pub offset_cm: [f64; 2],
    pub pen_width_pt: f64,
    pub height_pt: f64,
    pub font_size_pt: f64,
}

impl Default for ScaleBarStyle {
    fn default() -> Self {
        Self {
            show: true,
            length_km: 1.0,
            offset_cm: [0.5, 0.7],
            pen_width_pt: 1.5,
            height_pt: 7.0,
            font_size_pt: 8.0,
        }
    }
}

/// Boxed legend in the upper-right corner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LegendStyle {
    pub show: bool,
    /// Offset from the upper-right plot corner in centimeters
    pub offset_cm: [f64; 2],
    pub fill: Color,
    pub pen: Color,
    pub pen_width_pt: f64,
    pub font_size_pt: f64,
    pub array_label: String,
    pub array_symbol_cm: f64,
    pub epicenter_label: String,
    pub epicenter_symbol_cm: f64,
}

impl Default for LegendStyle {
    fn default() -> Self {
        Self {
            show: true,
            offset_cm: [0.2, 0.2],
            fill: Color::WHITE,
            pen: Color::BLACK,
            pen_width_pt: 0.5,
            font_size_pt: 8.0,
            array_label: "Infrasound array".to_string(),
            array_symbol_cm: 0.32,
            epicenter_label: "Explosion ground truth".to_string(),
            epicenter_symbol_cm: 0.35,
        }
    }
}

/// Plain basemap drawn when no topography is available
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoastStyle {
    pub land: Color,
    pub water: Color,
    pub shoreline: Color,
    pub shoreline_width_pt: f64,
    /// Natural Earth style land polygons or coastline polylines (`.shp`),
    /// e.g. `ne_10m_land.shp` from naturalearthdata.com. Without one the
    /// plain basemap is a uniform land fill with no shorelines.
    pub shapefile: Option<PathBuf>,
}

impl Default for CoastStyle {
    fn default() -> Self {
        Self {
            land: Color::LIGHT_GRAY,
            water: Color::LIGHT_BLUE,
            shoreline: Color::BLACK,
            shoreline_width_pt: 0.5,
            shapefile: None,
        }
    }
}

/// Everything about how a map figure looks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FigureStyle {
    pub projection: MapProjection,
    pub dpi: f64,
    /// Topography transparency in percent (0 opaque, 100 invisible)
    pub transparency: f64,
    /// Paint relief below this elevation (meters) as water; unset, only
    /// nodes without data are water
    pub water_level_m: Option<f64>,
    pub arrays: SymbolStyle,
    pub epicenter: SymbolStyle,
    pub labels: LabelStyle,
    pub frame: FrameStyle,
    pub scale_bar: ScaleBarStyle,
    pub legend: LegendStyle,
    pub coast: CoastStyle,
}

impl Default for FigureStyle {
    fn default() -> Self {
        Self {
            projection: MapProjection::default(),
            dpi: 450.0,
            transparency: 40.0,
            water_level_m: None,
            arrays: SymbolStyle::array_default(),
            epicenter: SymbolStyle::epicenter_default(),
            labels: LabelStyle::default(),
            frame: FrameStyle::default(),
            scale_bar: ScaleBarStyle::default(),
            legend: LegendStyle::default(),
            coast: CoastStyle::default(),
        }
    }
}

impl FigureStyle {
    pub fn validate(&self) -> Result<()> {
        if !(self.dpi.is_finite() && self.dpi >= 10.0 && self.dpi <= 2400.0) {
            return Err(RenderError::InvalidStyle(format!(
                "dpi must lie within [10, 2400], got {}",
                self.dpi
            )));
        }
        if !(0.0..=100.0).contains(&self.transparency) {
            return Err(RenderError::InvalidStyle(format!(
                "transparency must lie within [0, 100], got {}",
                self.transparency
            )));
        }
        if let Some(level) = self.water_level_m {
            if !level.is_finite() {
                return Err(RenderError::InvalidStyle(format!("water level must be finite, got {}", level)));
            }
        }
        for (name, symbol) in [("arrays", &self.arrays), ("epicenter", &self.epicenter)] {
            if !(symbol.size_cm.is_finite() && symbol.size_cm > 0.0) {
                return Err(RenderError::InvalidStyle(format!(
                    "{} symbol size must be positive",
                    name
                )));
            }
        }
        if let Some(interval) = self.frame.tick_interval_deg {
            if !(interval.is_finite() && interval > 0.0) {
                return Err(RenderError::InvalidStyle(format!(
                    "tick interval must be positive, got {}",
                    interval
                )));
            }
        }
        if self.scale_bar.show && !(self.scale_bar.length_km.is_finite() && self.scale_bar.length_km > 0.0) {
            return Err(RenderError::InvalidStyle(format!(
                "scale bar length must be positive, got {}",
                self.scale_bar.length_km
            )));
        }
        Ok(())
    }

    /// Centimeters to pixels at the figure dpi
    pub fn cm_to_px(&self, cm: f64) -> f64 {
        cm / CM_PER_INCH * self.dpi
    }

    /// Points to pixels at the figure dpi
    pub fn pt_to_px(&self, pt: f64) -> f64 {
        pt / POINTS_PER_INCH * self.dpi
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_parsing() {
        assert_eq!("black".parse::<Color>().unwrap(), Color::BLACK);
        assert_eq!("LightGray".parse::<Color>().unwrap(), Color::LIGHT_GRAY);
        assert_eq!("#ff8000".parse::<Color>().unwrap(), Color(255, 128, 0));
        assert_eq!("10/20/30".parse::<Color>().unwrap(), Color(10, 20, 30));
        for bad in ["", "#12345", "#gg0000", "1/2", "256/0/0", "chartreuse-ish"] {
            assert!(bad.parse::<Color>().is_err(), "{:?} should not parse", bad);
        }
    }

    #[test]
    fn test_color_display() {
        assert_eq!(Color::RED.to_string(), "red");
        assert_eq!(Color(1, 2, 3).to_string(), "#010203");
    }

    #[test]
    fn test_justify_parsing() {
        let rb: Justify = "RB".parse().unwrap();
        assert_eq!((rb.horizontal, rb.vertical), ('R', 'B'));
        let lt: Justify = "tl".parse().unwrap();
        assert_eq!((lt.horizontal, lt.vertical), ('L', 'T'));
        let cm: Justify = "CM".parse().unwrap();
        assert_eq!((cm.horizontal, cm.vertical), ('C', 'M'));
        assert!("RBX".parse::<Justify>().is_err());
        assert!("Q".parse::<Justify>().is_err());
    }

    #[test]
    fn test_symbol_codes() {
        for shape in [
            SymbolShape::Hexagon,
            SymbolShape::Star,
            SymbolShape::Circle,
            SymbolShape::Square,
            SymbolShape::Triangle,
            SymbolShape::Diamond,
        ] {
            assert_eq!(SymbolShape::from_code(shape.code()), Some(shape));
        }
        assert_eq!(SymbolShape::from_code('x'), None);
    }

    #[test]
    fn test_figure_style_from_toml() {
        let style: FigureStyle = toml::from_str(
            r##"
            projection = "Q10c"
            dpi = 150.0

            [arrays]
            shape = "circle"
            size_cm = 0.3
            fill = "#336699"
            pen = "white"

            [labels]
            show = true
            justify = "LT"
            "##,
        )
        .unwrap();

        assert_eq!(style.projection.to_string(), "Q10c");
        assert_eq!(style.arrays.shape, SymbolShape::Circle);
        assert_eq!(style.arrays.fill, Color(0x33, 0x66, 0x99));
        assert_eq!(style.arrays.pen_width_pt, 0.5);
        assert!(style.labels.show);
        assert_eq!(style.labels.font_size_pt, 10.0);
        assert_eq!(style.epicenter.shape, SymbolShape::Star);
        assert!(style.validate().is_ok());
    }

    #[test]
    fn test_figure_style_validation() {
        let mut style = FigureStyle::default();
        assert!(style.validate().is_ok());
        style.transparency = 140.0;
        assert!(style.validate().is_err());

        let mut style = FigureStyle::default();
        style.arrays.size_cm = 0.0;
        assert!(style.validate().is_err());

        let mut style = FigureStyle::default();
        style.water_level_m = Some(0.0);
        assert!(style.validate().is_ok());
        style.water_level_m = Some(f64::NAN);
        assert!(style.validate().is_err());
    }

    #[test]
    fn test_unit_conversion() {
        let style = FigureStyle {
            dpi: 254.0,
            ..FigureStyle::default()
        };
        assert!((style.cm_to_px(1.0) - 100.0).abs() < 1e-9);
        assert!((style.pt_to_px(72.0) - 254.0).abs() < 1e-9);
    }
}
