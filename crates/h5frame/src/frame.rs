//! Column-oriented tables.

use std::fmt;

use gedi_common::{Column, ColumnData, Scalar};

use crate::error::{FrameError, Result};

/// An ordered set of equally long, uniquely named columns.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    columns: Vec<Column>,
    nrows: usize,
}

impl Frame {
    /// An empty frame with no columns and no rows.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a frame from columns, checking names and lengths.
    pub fn from_columns(columns: impl IntoIterator<Item = Column>) -> Result<Self> {
        let mut frame = Self::new();
        for column in columns {
            frame.push(column)?;
        }
        Ok(frame)
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.columns.len()
    }

    /// True when the frame has no rows.
    pub fn is_empty(&self) -> bool {
        self.nrows == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(Column::name).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn into_columns(self) -> Vec<Column> {
        self.columns
    }

    /// Append a column.
    pub fn push(&mut self, column: Column) -> Result<()> {
        let position = self.columns.len();
        self.insert(position, column)
    }

    /// Insert a column at `position` (clamped to the column count).
    pub fn insert(&mut self, position: usize, column: Column) -> Result<()> {
        if self.contains(column.name()) {
            return Err(FrameError::DuplicateColumn(column.name().to_string()));
        }
        if !self.columns.is_empty() && column.len() != self.nrows {
            return Err(FrameError::RowCountMismatch {
                name: column.name().to_string(),
                expected: self.nrows,
                actual: column.len(),
            });
        }
        if self.columns.is_empty() {
            self.nrows = column.len();
        }
        let position = position.min(self.columns.len());
        self.columns.insert(position, column);
        Ok(())
    }

    /// Insert a column holding `value` in every row.
    pub fn insert_constant(&mut self, position: usize, name: &str, value: &str) -> Result<()> {
        let data = ColumnData::repeat_str(value, self.nrows);
        self.insert(position, Column::new(name, data))
    }

    /// Remove a column by name, returning it.
    pub fn remove(&mut self, name: &str) -> Option<Column> {
        let position = self.columns.iter().position(|c| c.name() == name)?;
        let column = self.columns.remove(position);
        if self.columns.is_empty() {
            self.nrows = 0;
        }
        Some(column)
    }

    /// New frame holding the named columns in the given order.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Frame> {
        let mut frame = Frame::new();
        for name in names {
            let name = name.as_ref();
            let column = self
                .column(name)
                .ok_or_else(|| FrameError::KeyNotFound(name.to_string()))?;
            frame.push(column.clone())?;
        }
        Ok(frame)
    }

    /// New frame with the rows at `indices`.
    pub fn take(&self, indices: &[usize]) -> Frame {
        Frame {
            columns: self.columns.iter().map(|c| c.take(indices)).collect(),
            nrows: if self.columns.is_empty() { 0 } else { indices.len() },
        }
    }

    /// New frame with the rows where `mask` is true.
    pub fn filter(&self, mask: &[bool]) -> Result<Frame> {
        if !self.columns.is_empty() && mask.len() != self.nrows {
            return Err(FrameError::RowCountMismatch {
                name: "<mask>".to_string(),
                expected: self.nrows,
                actual: mask.len(),
            });
        }
        let indices: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter_map(|(i, keep)| keep.then_some(i))
            .collect();
        Ok(self.take(&indices))
    }

    /// Stack frames vertically.
    ///
    /// Frames without columns are skipped; all others must have the same
    /// column names in the same order.
    pub fn concat(frames: &[Frame]) -> Result<Frame> {
        let mut non_empty = frames.iter().filter(|f| f.ncols() > 0);
        let Some(first) = non_empty.next() else {
            return Ok(Frame::new());
        };

        let mut data: Vec<ColumnData> = first.columns.iter().map(|c| c.data().clone()).collect();
        let mut nrows = first.nrows;
        for frame in non_empty {
            if frame.column_names() != first.column_names() {
                return Err(FrameError::InvalidKey(format!(
                    "cannot concatenate frames with columns [{}] and [{}]",
                    first.column_names().join(", "),
                    frame.column_names().join(", ")
                )));
            }
            for (acc, column) in data.iter_mut().zip(&frame.columns) {
                acc.extend(column.data())?;
            }
            nrows += frame.nrows;
        }

        let columns = first
            .columns
            .iter()
            .zip(data)
            .map(|(c, d)| Column::new(c.name(), d))
            .collect();
        Ok(Frame { columns, nrows })
    }

    /// Values of row `i`, in column order.
    pub fn row(&self, i: usize) -> Option<Vec<Scalar>> {
        if i >= self.nrows {
            return None;
        }
        self.columns.iter().map(|c| c.data().get(i)).collect()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.column_names().join("\t"))?;
        for i in 0..self.nrows {
            if let Some(row) = self.row(i) {
                let cells: Vec<String> = row.iter().map(ToString::to_string).collect();
                writeln!(f, "{}", cells.join("\t"))?;
            }
        }
        Ok(())
    }
}
