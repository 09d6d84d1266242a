//! Read interface over a hierarchical array store.
//!
//! A granule is a tree of groups whose leaves are one- or two-dimensional
//! datasets. The projector and lazy tables only ever talk to the store
//! through these traits, so an open HDF5 file and an in-memory tree are
//! interchangeable.

use gedi_common::{ColumnData, Matrix};

use crate::error::Result;

/// Data read from a dataset.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    OneD(ColumnData),
    TwoD(Matrix),
}

impl ArrayData {
    /// Number of rows (length of the first dimension).
    pub fn nrows(&self) -> usize {
        match self {
            ArrayData::OneD(data) => data.len(),
            ArrayData::TwoD(matrix) => matrix.nrows(),
        }
    }

    /// Keep the rows at the given positions.
    pub fn take_rows(&self, rows: &[usize]) -> Self {
        match self {
            ArrayData::OneD(data) => ArrayData::OneD(data.take(rows)),
            ArrayData::TwoD(matrix) => ArrayData::TwoD(matrix.take_rows(rows)),
        }
    }

    /// Single column form: 2D data becomes a column of whole rows.
    pub fn into_column(self) -> ColumnData {
        match self {
            ArrayData::OneD(data) => data,
            ArrayData::TwoD(matrix) => ColumnData::Rows(matrix),
        }
    }
}

/// A leaf array.
pub trait Dataset: Clone {
    /// Full path of the dataset within its file.
    fn name(&self) -> String;

    /// Dimensions, outermost first.
    fn shape(&self) -> Vec<usize>;

    fn ndim(&self) -> usize {
        self.shape().len()
    }

    /// Read the whole dataset.
    fn read(&self) -> Result<ArrayData>;

    /// Read one column of a 2D dataset.
    fn read_column(&self, col: usize) -> Result<ColumnData> {
        match self.read()? {
            ArrayData::TwoD(matrix) => Ok(matrix.column(col)?),
            ArrayData::OneD(_) => Err(crate::FrameError::RankMismatch {
                dataset: self.name(),
                key: format!("{}[{}]", self.name(), col),
            }),
        }
    }
}

/// A member of a group.
pub enum Node<G, D> {
    Group(G),
    Dataset(D),
}

/// A group node of the store.
///
/// Implementations are cheap handles; cloning one does not copy data.
pub trait HierarchicalGroup: Clone {
    type Dataset: Dataset;

    /// Full path of the group within its file, e.g. `/BEAM0000`.
    fn name(&self) -> String;

    /// Name of the backing file.
    fn filename(&self) -> String;

    /// Names of the immediate members, sorted.
    fn member_names(&self) -> Result<Vec<String>>;

    /// Look up a member by relative path (`/`-separated).
    fn get(&self, path: &str) -> Result<Option<Node<Self, Self::Dataset>>>;

    /// String attribute attached to this group.
    fn attr(&self, name: &str) -> Result<Option<String>>;

    /// Final path component of [`HierarchicalGroup::name`].
    fn basename(&self) -> String {
        let name = self.name();
        name.rsplit('/').next().unwrap_or_default().to_string()
    }

    /// Look up a dataset, returning `None` for groups and missing paths.
    fn dataset(&self, path: &str) -> Result<Option<Self::Dataset>> {
        Ok(match self.get(path)? {
            Some(Node::Dataset(dataset)) => Some(dataset),
            _ => None,
        })
    }

    /// Look up a sub-group, returning `None` for datasets and missing paths.
    fn group(&self, path: &str) -> Result<Option<Self>> {
        Ok(match self.get(path)? {
            Some(Node::Group(group)) => Some(group),
            _ => None,
        })
    }
}
