//! Granule fan-out and output for the `gedi-subset` command.
//!
//! Each granule is opened and subset on its own rayon worker, so no table
//! or file handle is shared between threads. Results are combined in input
//! order and written as one GeoJSON FeatureCollection.

pub mod output;
pub mod runner;

pub use output::{collect_inputs, write_output};
pub use runner::{run_granules, RunSummary};
