//! Legend specification file
//!
//! The legend is described in a small text file, one `S` line per symbol in
//! the classic GMT legend layout:
//!
//! ```text
//! S 0.3c a 0.35c red 0.5p,black 0.9c Explosion ground truth
//! ```
//!
//! Fields are: symbol column offset, symbol code, symbol size, fill, pen,
//! text column offset and the label (which may contain spaces). The file is
//! written to the temp directory, read back when the legend is drawn and
//! released afterwards.

use std::fmt;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::{RenderError, Result};
use crate::style::{Color, FigureStyle, SymbolShape, SymbolStyle};

/// Offset of the symbol column inside the legend box
pub const SYMBOL_COLUMN_CM: f64 = 0.3;
/// Offset of the text column inside the legend box
pub const TEXT_COLUMN_CM: f64 = 0.9;

#[derive(Debug, Clone, PartialEq)]
pub struct LegendEntry {
    pub shape: SymbolShape,
    pub size_cm: f64,
    pub fill: Color,
    pub pen: Color,
    pub pen_width_pt: f64,
    pub label: String,
}

impl LegendEntry {
    pub fn new(symbol: &SymbolStyle, size_cm: f64, label: impl Into<String>) -> Self {
        Self {
            shape: symbol.shape,
            size_cm,
            fill: symbol.fill,
            pen: symbol.pen,
            pen_width_pt: symbol.pen_width_pt,
            label: label.into(),
        }
    }

    pub fn symbol(&self) -> SymbolStyle {
        SymbolStyle {
            shape: self.shape,
            size_cm: self.size_cm,
            fill: self.fill,
            pen: self.pen,
            pen_width_pt: self.pen_width_pt,
        }
    }

    fn parse(line_no: usize, line: &str) -> Result<Self> {
        let err = |message: String| RenderError::Legend {
            line: line_no,
            message,
        };

        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 8 {
            return Err(err(format!("expected 8 fields, found {}", fields.len())));
        }
        if fields[0] != "S" {
            return Err(err(format!("unsupported legend code '{}'", fields[0])));
        }

        let cm = |field: &str| -> Result<f64> {
            field
                .strip_suffix('c')
                .unwrap_or(field)
                .parse::<f64>()
                .map_err(|_| err(format!("invalid length '{}'", field)))
        };

        let mut code = fields[2].chars();
        let shape = match (code.next(), code.next()) {
            (Some(c), None) => SymbolShape::from_code(c),
            _ => None,
        }
        .ok_or_else(|| err(format!("unknown symbol '{}'", fields[2])))?;

        let size_cm = cm(fields[3])?;
        let fill: Color = fields[4].parse().map_err(|_| err(format!("invalid fill '{}'", fields[4])))?;

        let (width, pen) = fields[5]
            .split_once(',')
            .ok_or_else(|| err(format!("invalid pen '{}'", fields[5])))?;
        let pen_width_pt = width
            .strip_suffix('p')
            .unwrap_or(width)
            .parse::<f64>()
            .map_err(|_| err(format!("invalid pen width '{}'", width)))?;
        let pen: Color = pen.parse().map_err(|_| err(format!("invalid pen color '{}'", pen)))?;

        Ok(Self {
            shape,
            size_cm,
            fill,
            pen,
            pen_width_pt,
            label: fields[7..].join(" "),
        })
    }
}

impl fmt::Display for LegendEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "S {}c {} {}c {} {}p,{} {}c {}",
            SYMBOL_COLUMN_CM,
            self.shape.code(),
            self.size_cm,
            self.fill,
            self.pen_width_pt,
            self.pen,
            TEXT_COLUMN_CM,
            self.label
        )
    }
}

/// Legend lines for a figure; the epicenter entry only appears when one is drawn
pub fn legend_entries(style: &FigureStyle, has_epicenter: bool) -> Vec<LegendEntry> {
    let legend = &style.legend;
    let mut entries = Vec::with_capacity(2);
    if has_epicenter {
        entries.push(LegendEntry::new(
            &style.epicenter,
            legend.epicenter_symbol_cm,
            &legend.epicenter_label,
        ));
    }
    entries.push(LegendEntry::new(&style.arrays, legend.array_symbol_cm, &legend.array_label));
    entries
}

/// Parse legend text, skipping blank lines and `#` comments
pub fn parse_legend(text: &str) -> Result<Vec<LegendEntry>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(i, line)| LegendEntry::parse(i + 1, line))
        .collect()
}

/// Legend specification written to a temporary `.leg` file
pub struct LegendFile {
    file: NamedTempFile,
}

impl LegendFile {
    pub fn write(entries: &[LegendEntry]) -> Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("station-map-")
            .suffix(".leg")
            .tempfile()?;
        for entry in entries {
            writeln!(file, "{}", entry)?;
        }
        file.flush()?;
        tracing::debug!("Wrote legend file {}", file.path().display());
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn read_entries(&self) -> Result<Vec<LegendEntry>> {
        let text = std::fs::read_to_string(self.path())?;
        parse_legend(&text)
    }

    /// Delete the file; failure is logged and otherwise ignored
    pub fn release(self) {
        let path = self.path().to_path_buf();
        match self.file.close() {
            Ok(()) => tracing::debug!("Removed legend file {}", path.display()),
            Err(e) => tracing::warn!("Failed to remove legend file {}: {}", path.display(), e),
        }
    }
}
