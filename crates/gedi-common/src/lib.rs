//! Common types shared across the GEDI subsetting crates.
//!
//! Holds the column data model used for projected datasets and the
//! geographic types (bounding boxes, CRS, area-of-interest polygons) used to
//! clip subset results.

pub mod aoi;
pub mod array;
pub mod bbox;
pub mod crs;
pub mod error;

pub use aoi::{AreaOfInterest, Point, Polygon};
pub use array::{Column, ColumnData, DType, Matrix, Scalar};
pub use bbox::BoundingBox;
pub use crs::CrsCode;
pub use error::{ArrayError, ArrayResult, GeoError, GeoResult};
