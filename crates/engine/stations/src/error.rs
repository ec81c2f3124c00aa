use thiserror::Error;

/// Result type for station metadata queries
pub type Result<T> = std::result::Result<T, FdsnError>;

/// Errors raised while querying an FDSN station service
#[derive(Debug, Error)]
pub enum FdsnError {
    #[error("unknown FDSN data center '{0}'")]
    UnknownSource(String),

    #[error("invalid FDSN query: {0}")]
    InvalidQuery(String),

    #[error("failed to build HTTP client")]
    Client(#[source] reqwest::Error),

    #[error("station query to {url} failed")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("station service returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("malformed station response at line {line}: {message}")]
    Parse { line: u64, message: String },
}

/// Errors raised while grouping stations into arrays
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AggregateError {
    #[error("no stations to aggregate")]
    NoStations,
}
