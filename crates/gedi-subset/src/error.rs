//! Error types for subsetting.

use gedi_common::{ArrayError, GeoError};
use h5frame::FrameError;
use thiserror::Error;

/// Result type alias using SubsetError.
pub type Result<T> = std::result::Result<T, SubsetError>;

/// Errors that can occur while subsetting a granule.
#[derive(Error, Debug)]
pub enum SubsetError {
    /// Projection, lookup or query failure inside a beam.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// AOI or coordinate failure.
    #[error(transparent)]
    Geo(#[from] GeoError),

    #[error(transparent)]
    Array(#[from] ArrayError),

    /// Beam option that names an unknown beam or mixes keywords.
    #[error("invalid beams option '{value}': {reason}")]
    InvalidBeams { value: String, reason: String },

    #[error("configuration error: {0}")]
    InvalidConfig(String),

    /// A beam lacks one of the coordinate datasets.
    #[error("beam {beam} has no coordinate dataset '{column}'")]
    MissingCoordinates { beam: String, column: String },

    /// A coordinate dataset is not numeric.
    #[error("coordinate dataset '{column}' of beam {beam} is not numeric")]
    NonNumericCoordinates { beam: String, column: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
