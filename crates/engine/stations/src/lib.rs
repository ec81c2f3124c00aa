//! Station metadata for station maps
//!
//! - [`record`]: station records keyed by station code
//! - [`fdsn`]: FDSN station web-service client
//! - [`arrays`]: grouping of array elements into array centroids

pub mod arrays;
pub mod error;
pub mod fdsn;
pub mod record;

pub use arrays::{aggregate, classify, display_label, ArrayGroup, ArrayGroups, ARRAY_PREFIX};
pub use error::{AggregateError, FdsnError, Result};
pub use fdsn::{parse_station_text, FdsnClient, StationQuery, StationSource};
pub use record::{StationRecord, StationSet};
