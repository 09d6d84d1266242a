//! Native HDF5 backend using the hdf5-metno library.
//!
//! Requires libhdf5 at build time. Handles are reference counted by the HDF5
//! library, so cloning an [`H5Group`] is cheap and the file stays open until
//! the last handle is dropped.

use std::path::Path;
use std::sync::Once;

use gedi_common::{ColumnData, Matrix};
use hdf5::types::{TypeDescriptor, VarLenAscii, VarLenUnicode};
use hdf5::{FloatSize, H5Type, IntSize, LocationType};
use ndarray::s;

use crate::error::{FrameError, Result};
use crate::group::{ArrayData, Dataset, HierarchicalGroup, Node};

/// Silence HDF5's automatic error printing to stderr.
///
/// Lookups of optional members and attributes fail inside the C library even
/// when the failure is handled here, and HDF5 prints a diagnostic stack for
/// each of them. Call once early in `main()`; repeated calls are no-ops.
pub fn silence_hdf5_errors() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        // SAFETY: H5Eset_auto2 is thread-safe and null handlers are a
        // documented way of disabling automatic error printing.
        unsafe {
            hdf5_metno_sys::h5e::H5Eset_auto2(
                hdf5_metno_sys::h5e::H5E_DEFAULT,
                None,
                std::ptr::null_mut(),
            );
        }
    });
}

fn read_error(path: impl Into<String>, err: hdf5::Error) -> FrameError {
    FrameError::Read {
        path: path.into(),
        message: err.to_string(),
    }
}

/// A group of an open HDF5 file.
#[derive(Clone)]
pub struct H5Group {
    group: hdf5::Group,
}

impl H5Group {
    /// Open a file read-only and return its root group.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        silence_hdf5_errors();
        let path = path.as_ref();
        let file = hdf5::File::open(path)
            .map_err(|e| read_error(path.display().to_string(), e))?;
        let group = file
            .as_group()
            .map_err(|e| read_error(path.display().to_string(), e))?;
        Ok(Self { group })
    }
}

impl From<hdf5::Group> for H5Group {
    fn from(group: hdf5::Group) -> Self {
        Self { group }
    }
}

impl HierarchicalGroup for H5Group {
    type Dataset = H5Dataset;

    fn name(&self) -> String {
        self.group.name()
    }

    fn filename(&self) -> String {
        self.group.filename()
    }

    fn member_names(&self) -> Result<Vec<String>> {
        let mut names = self
            .group
            .member_names()
            .map_err(|e| read_error(self.group.name(), e))?;
        names.sort();
        Ok(names)
    }

    fn get(&self, path: &str) -> Result<Option<Node<Self, H5Dataset>>> {
        let path = path.trim_matches('/');
        if path.is_empty() || !self.group.link_exists(path) {
            return Ok(None);
        }

        let info = self
            .group
            .loc_info_by_name(path)
            .map_err(|e| read_error(format!("{}/{}", self.group.name(), path), e))?;
        let node = match info.loc_type {
            LocationType::Group => self.group.group(path).map(|g| Node::Group(H5Group::from(g))),
            LocationType::Dataset => self
                .group
                .dataset(path)
                .map(|dataset| Node::Dataset(H5Dataset { dataset })),
            LocationType::NamedDatatype => return Ok(None),
        };
        node.map(Some)
            .map_err(|e| read_error(format!("{}/{}", self.group.name(), path), e))
    }

    fn attr(&self, name: &str) -> Result<Option<String>> {
        let names = self
            .group
            .attr_names()
            .map_err(|e| read_error(self.group.name(), e))?;
        if !names.iter().any(|n| n == name) {
            return Ok(None);
        }

        let attr = self
            .group
            .attr(name)
            .map_err(|e| read_error(format!("{}@{}", self.group.name(), name), e))?;
        if let Ok(value) = attr.read_scalar::<VarLenUnicode>() {
            return Ok(Some(value.as_str().to_string()));
        }
        attr.read_scalar::<VarLenAscii>()
            .map(|value| Some(value.as_str().to_string()))
            .map_err(|e| read_error(format!("{}@{}", self.group.name(), name), e))
    }
}

/// A dataset of an open HDF5 file.
#[derive(Clone)]
pub struct H5Dataset {
    dataset: hdf5::Dataset,
}

impl H5Dataset {
    /// Values of the whole dataset, or of one column of a 2D dataset.
    fn values<T: H5Type + Clone>(&self, col: Option<usize>) -> Result<Vec<T>> {
        let values = match col {
            None => self.dataset.read_raw::<T>(),
            Some(col) => self
                .dataset
                .read_slice_1d::<T, _>(s![.., col])
                .map(|column| column.to_vec()),
        };
        values.map_err(|e| read_error(self.dataset.name(), e))
    }

    fn read_values(&self, col: Option<usize>) -> Result<ColumnData> {
        let descriptor = self
            .dataset
            .dtype()
            .and_then(|dtype| dtype.to_descriptor())
            .map_err(|e| read_error(self.dataset.name(), e))?;

        let data = match descriptor {
            TypeDescriptor::Integer(IntSize::U1) => ColumnData::Int8(self.values(col)?),
            TypeDescriptor::Integer(IntSize::U2) => ColumnData::Int16(self.values(col)?),
            TypeDescriptor::Integer(IntSize::U4) => ColumnData::Int32(self.values(col)?),
            TypeDescriptor::Integer(IntSize::U8) => ColumnData::Int64(self.values(col)?),
            TypeDescriptor::Unsigned(IntSize::U1) => ColumnData::UInt8(self.values(col)?),
            TypeDescriptor::Unsigned(IntSize::U2) => ColumnData::UInt16(self.values(col)?),
            TypeDescriptor::Unsigned(IntSize::U4) => ColumnData::UInt32(self.values(col)?),
            TypeDescriptor::Unsigned(IntSize::U8) => ColumnData::UInt64(self.values(col)?),
            TypeDescriptor::Float(FloatSize::U4) => ColumnData::Float32(self.values(col)?),
            TypeDescriptor::Float(FloatSize::U8) => ColumnData::Float64(self.values(col)?),
            TypeDescriptor::Boolean => ColumnData::Bool(self.values(col)?),
            TypeDescriptor::VarLenUnicode => ColumnData::Utf8(
                self.values::<VarLenUnicode>(col)?
                    .iter()
                    .map(|s| s.as_str().to_string())
                    .collect(),
            ),
            TypeDescriptor::VarLenAscii => ColumnData::Utf8(
                self.values::<VarLenAscii>(col)?
                    .iter()
                    .map(|s| s.as_str().to_string())
                    .collect(),
            ),
            other => {
                return Err(FrameError::UnsupportedType {
                    path: self.dataset.name(),
                    dtype: format!("{:?}", other),
                })
            }
        };
        Ok(data)
    }
}

impl Dataset for H5Dataset {
    fn name(&self) -> String {
        self.dataset.name()
    }

    fn shape(&self) -> Vec<usize> {
        self.dataset.shape()
    }

    fn read(&self) -> Result<ArrayData> {
        let shape = self.shape();
        let values = self.read_values(None)?;
        match shape.as_slice() {
            [_] => Ok(ArrayData::OneD(values)),
            [nrows, ncols] => Ok(ArrayData::TwoD(Matrix::new(values, *nrows, *ncols)?)),
            _ => Err(FrameError::UnsupportedType {
                path: self.dataset.name(),
                dtype: format!("rank {} array", shape.len()),
            }),
        }
    }

    /// Read one column with a hyperslab selection, leaving the rest of the
    /// dataset on disk.
    fn read_column(&self, col: usize) -> Result<ColumnData> {
        match self.shape().as_slice() {
            [_, ncols] if col < *ncols => self.read_values(Some(col)),
            [_, ncols] => Err(FrameError::IndexOutOfRange {
                index: col as i64,
                length: *ncols,
            }),
            _ => Err(FrameError::RankMismatch {
                dataset: self.dataset.name(),
                key: format!("{}[{}]", self.dataset.name(), col),
            }),
        }
    }
}
