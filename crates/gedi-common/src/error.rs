//! Error types shared by the subsetting crates.

use thiserror::Error;

use crate::array::DType;

/// Result type alias using GeoError.
pub type GeoResult<T> = Result<T, GeoError>;

/// Result type alias using ArrayError.
pub type ArrayResult<T> = Result<T, ArrayError>;

/// Errors raised while loading or using an area of interest.
#[derive(Debug, Error)]
pub enum GeoError {
    #[error("Failed to read AOI file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid GeoJSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Unsupported geometry type: {0}")]
    UnsupportedGeometry(String),

    #[error("Invalid polygon: {0}")]
    InvalidPolygon(String),

    #[error("Invalid coordinate: {0}")]
    InvalidCoordinate(String),

    #[error("Unsupported CRS: {0}")]
    UnsupportedCrs(String),

    #[error("AOI contains no polygons")]
    EmptyAoi,

    #[error("Coordinate arrays differ in length: {lon} longitudes, {lat} latitudes")]
    CoordinateLengthMismatch { lon: usize, lat: usize },
}

/// Errors raised by column and matrix operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ArrayError {
    #[error("Length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: DType, actual: DType },

    #[error("Index {index} out of range for length {length}")]
    IndexOutOfRange { index: i64, length: usize },

    #[error("Matrix values cannot themselves be rows")]
    NestedRows,
}
