//! Tabular access to hierarchical array stores.
//!
//! This crate treats a group of an HDF5-like file as a relational table whose
//! columns are the group's datasets:
//!
//! - **Projection**: [`Projector`] resolves column keys (`agbd`, `rh[-1]`,
//!   `xvar[1:]`, `land_cover_data/landsat_treecover`) to array data,
//!   touching only the datasets named.
//! - **Lazy tables**: [`LazyTable`] reads columns on first reference and
//!   caches them, so a filter expression only loads what it mentions.
//!
//! # Architecture
//!
//! ```text
//! LazyTable::query("sensitivity > 0.95")
//!      │
//!      ├─► parse expression, collect names
//!      │
//!      ├─► LazyTable::get(name) for each name
//!      │         │
//!      │         ├─► Cached: reuse column
//!      │         │
//!      │         └─► Not cached: read dataset via HierarchicalGroup
//!      │
//!      └─► evaluate mask, narrow rows
//! ```
//!
//! Backends implement [`HierarchicalGroup`]. [`MemoryGroup`] is always
//! available; the native HDF5 backend requires the `hdf5` feature.

pub mod error;
pub mod frame;
pub mod group;
pub mod lazy;
pub mod memory;
#[cfg(feature = "hdf5")]
pub mod native;
pub mod projector;

// Re-export commonly used types at crate root
pub use error::{FrameError, Result};
pub use frame::Frame;
pub use group::{ArrayData, Dataset, HierarchicalGroup, Node};
pub use lazy::{LazyTable, Resolved};
pub use memory::{GroupBuilder, MemoryDataset, MemoryGroup};
#[cfg(feature = "hdf5")]
pub use native::{silence_hdf5_errors, H5Dataset, H5Group};
pub use projector::{
    compute_indices, parse_key, plan_one, project_one, ColumnSelector, Planned, Projection,
    Projector,
};
