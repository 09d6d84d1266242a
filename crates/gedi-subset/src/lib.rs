//! Spatial and attribute subsetting of GEDI granules.
//!
//! A granule's `BEAMxxxx` groups are read through [`h5frame`] lazy tables:
//! only the datasets named by the requested columns, the filter query and
//! the coordinate columns are loaded.
//!
//! # Example
//!
//! ```ignore
//! use gedi_subset::{BeamFilter, Subsetter};
//!
//! let subsetter = Subsetter::new(&["agbd", "sensitivity"])
//!     .with_beams(BeamFilter::Coverage)
//!     .with_query(Some("l2_quality_flag == 1 and sensitivity > 0.95"));
//! let result = subsetter.subset_hdf5(&granule, &aoi)?;
//! ```

pub mod beams;
pub mod config;
pub mod error;
pub mod geoframe;
pub mod geojson;
pub mod subset;

// Re-export commonly used types at crate root
pub use beams::{BeamFilter, COVERAGE_BEAMS, POWER_BEAMS};
pub use config::SubsetConfig;
pub use error::{Result, SubsetError};
pub use geoframe::{GeoFrame, GEOMETRY_COLUMN};
pub use geojson::{to_feature_collection, write_geojson};
pub use subset::{
    subset_beam, subset_hdf5, Subsetter, BEAM_COLUMN, DEFAULT_LAT, DEFAULT_LON, FILENAME_COLUMN,
};
