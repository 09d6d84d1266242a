//! Tables with a point geometry per row.

use gedi_common::{Column, CrsCode, Point, Scalar};
use h5frame::Frame;

use crate::error::Result;

/// Name reported for the geometry column.
pub const GEOMETRY_COLUMN: &str = "geometry";

/// A [`Frame`] plus one point per row.
///
/// The row count is the number of points, so a frame without attribute
/// columns still has rows.
#[derive(Debug, Clone, Default)]
pub struct GeoFrame {
    frame: Frame,
    geometry: Vec<Point>,
    crs: CrsCode,
}

impl GeoFrame {
    /// Pair a frame with its geometry.
    ///
    /// A frame with columns must have one row per point.
    pub fn new(frame: Frame, geometry: Vec<Point>, crs: CrsCode) -> Result<Self> {
        if frame.ncols() > 0 && frame.nrows() != geometry.len() {
            return Err(h5frame::FrameError::RowCountMismatch {
                name: GEOMETRY_COLUMN.to_string(),
                expected: frame.nrows(),
                actual: geometry.len(),
            }
            .into());
        }
        Ok(Self {
            frame,
            geometry,
            crs,
        })
    }

    /// An empty frame with the given column names and no rows.
    ///
    /// Used when no beam was selected, so the types of the columns are
    /// unknown; every column is an empty string column.
    pub fn empty<S: AsRef<str>>(columns: &[S]) -> Result<Self> {
        let frame = Frame::from_columns(columns.iter().map(|name| {
            Column::new(name.as_ref(), gedi_common::ColumnData::Utf8(Vec::new()))
        }))?;
        Ok(Self {
            frame,
            geometry: Vec::new(),
            crs: CrsCode::default(),
        })
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn geometry(&self) -> &[Point] {
        &self.geometry
    }

    pub fn crs(&self) -> CrsCode {
        self.crs
    }

    pub fn nrows(&self) -> usize {
        self.geometry.len()
    }

    /// True when there are no rows.
    pub fn is_empty(&self) -> bool {
        self.geometry.is_empty()
    }

    /// Attribute column names followed by [`GEOMETRY_COLUMN`].
    pub fn column_names(&self) -> Vec<&str> {
        let mut names = self.frame.column_names();
        names.push(GEOMETRY_COLUMN);
        names
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.frame.column(name)
    }

    /// Insert a column holding `value` in every row.
    pub fn insert_constant(&mut self, position: usize, name: &str, value: &str) -> Result<()> {
        let data = gedi_common::ColumnData::repeat_str(value, self.nrows());
        self.frame.insert(position, Column::new(name, data))?;
        Ok(())
    }

    /// Keep the rows where `mask` is true.
    pub fn filter(&self, mask: &[bool]) -> Result<GeoFrame> {
        let frame = if self.frame.ncols() > 0 {
            self.frame.filter(mask)?
        } else {
            Frame::new()
        };
        let geometry = self
            .geometry
            .iter()
            .zip(mask)
            .filter_map(|(point, keep)| keep.then_some(*point))
            .collect();
        Ok(GeoFrame {
            frame,
            geometry,
            crs: self.crs,
        })
    }

    /// Stack frames vertically; all must have the same columns.
    pub fn concat(frames: &[GeoFrame]) -> Result<GeoFrame> {
        let tables: Vec<Frame> = frames.iter().map(|f| f.frame.clone()).collect();
        let frame = Frame::concat(&tables)?;
        let geometry = frames
            .iter()
            .flat_map(|f| f.geometry.iter().copied())
            .collect();
        let crs = frames.first().map(|f| f.crs).unwrap_or_default();
        Ok(GeoFrame {
            frame,
            geometry,
            crs,
        })
    }

    /// Attribute values of row `i`, in column order.
    pub fn row(&self, i: usize) -> Option<(Vec<Scalar>, Point)> {
        let point = *self.geometry.get(i)?;
        let values = if self.frame.ncols() > 0 {
            self.frame.row(i)?
        } else {
            Vec::new()
        };
        Some((values, point))
    }
}
