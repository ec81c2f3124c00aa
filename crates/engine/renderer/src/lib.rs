//! Static map figures
//!
//! Turns a [`MapScene`] (region, array markers, epicenter, background) into
//! an RGB image with a projected frame, shaded relief or coastline basemap,
//! symbols, labels, a scale bar and a legend, then saves or shows it.

pub mod backend;
pub mod coastline;
pub mod error;
pub mod figure;
pub mod legend;
pub mod output;
pub mod projection;
pub mod relief;
pub mod style;

pub use coastline::Coastline;
pub use error::{RenderError, Result};
pub use figure::{render_map, ArrayMarker, Background, Epicenter, FigureLayout, MapScene};
pub use legend::{legend_entries, parse_legend, LegendEntry, LegendFile};
pub use output::{export_png, show_image};
pub use projection::{LatitudeAxis, MapProjection, ProjectionKind};
pub use style::{
    CoastStyle, Color, FigureStyle, FrameStyle, Justify, LabelStyle, LegendStyle, ScaleBarStyle, SymbolShape,
    SymbolStyle,
};
