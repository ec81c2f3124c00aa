use thiserror::Error;

/// Result type for rendering operations
pub type Result<T> = std::result::Result<T, RenderError>;

/// Errors that can occur while drawing or exporting a map
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("invalid projection '{0}', expected e.g. \"M14c\" or \"Q6i\"")]
    InvalidProjection(String),

    #[error("invalid color '{0}'")]
    InvalidColor(String),

    #[error("invalid style: {0}")]
    InvalidStyle(String),

    #[error("figure of {width}x{height} pixels is too large")]
    FigureTooLarge { width: u32, height: u32 },

    #[error("drawing failed: {0}")]
    Drawing(String),

    #[error("invalid legend entry at line {line}: {message}")]
    Legend { line: usize, message: String },

    #[error("failed to read coastline shapefile: {0}")]
    Coastline(String),

    #[error("failed to encode image")]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Map any plotters drawing error into [`RenderError::Drawing`]
pub(crate) fn drawing<E: std::fmt::Display>(err: E) -> RenderError {
    RenderError::Drawing(err.to_string())
}
