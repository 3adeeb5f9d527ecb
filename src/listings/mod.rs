//! Direct record queries: chains by last scrape date and locations by last
//! update. Unlike exports these return records, not a download link.

mod chains;
mod locations;

pub use chains::{CHAIN_COLUMNS, ChainQuery};
pub use locations::{BoundingBox, DEFAULT_PAGE_SIZE, LocationQuery};

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ListingError {
    #[error("{field} must be within [-{limit}, {limit}], got {value}")]
    CoordinateOutOfRange {
        field: &'static str,
        value: f64,
        limit: f64,
    },

    #[error("south edge {south} lies north of north edge {north}")]
    InvertedBounds { south: f64, north: f64 },

    #[error("page size must be positive or -1 for no limit, got {0}")]
    InvalidPageSize(i64),
}
