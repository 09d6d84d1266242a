//! Column and array data types.
//!
//! Datasets read from a granule are either one-dimensional (one value per
//! shot) or two-dimensional (a fixed number of values per shot, such as
//! `rh` or `xvar`). One-dimensional data is held in a typed [`ColumnData`];
//! two-dimensional data is held in a row-major [`Matrix`].

use std::fmt;
use std::sync::Arc;

use crate::error::{ArrayError, ArrayResult};

/// Element type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Bool,
    Utf8,
    /// Each element is one full row of a 2D dataset.
    List,
}

impl DType {
    /// Check if values of this type can be compared and combined numerically.
    pub fn is_numeric(&self) -> bool {
        !matches!(self, DType::Bool | DType::Utf8 | DType::List)
    }

    /// Check if this is a floating-point type.
    pub fn is_float(&self) -> bool {
        matches!(self, DType::Float32 | DType::Float64)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DType::Int8 => "int8",
            DType::Int16 => "int16",
            DType::Int32 => "int32",
            DType::Int64 => "int64",
            DType::UInt8 => "uint8",
            DType::UInt16 => "uint16",
            DType::UInt32 => "uint32",
            DType::UInt64 => "uint64",
            DType::Float32 => "float32",
            DType::Float64 => "float64",
            DType::Bool => "bool",
            DType::Utf8 => "utf8",
            DType::List => "list",
        };
        write!(f, "{}", name)
    }
}

/// A single value taken from a column.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
    Str(String),
    Row(Vec<Scalar>),
}

impl Scalar {
    /// Numeric value as `f64`, if this scalar is numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(v) => Some(*v as f64),
            Scalar::UInt(v) => Some(*v as f64),
            Scalar::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Int(v) => write!(f, "{}", v),
            Scalar::UInt(v) => write!(f, "{}", v),
            Scalar::Float(v) => write!(f, "{}", v),
            Scalar::Bool(v) => write!(f, "{}", v),
            Scalar::Str(v) => write!(f, "{}", v),
            Scalar::Row(values) => {
                write!(f, "[")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Typed one-dimensional column values.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Int8(Vec<i8>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    UInt8(Vec<u8>),
    UInt16(Vec<u16>),
    UInt32(Vec<u32>),
    UInt64(Vec<u64>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    Bool(Vec<bool>),
    Utf8(Vec<String>),
    /// A 2D dataset kept whole, one matrix row per column element.
    Rows(Matrix),
}

/// Apply an expression to the vector inside any flat variant, producing a
/// value of the same variant. `Rows` is handled by the second arm.
macro_rules! map_flat {
    ($data:expr, $v:ident => $body:expr, $m:ident => $rows:expr) => {
        match $data {
            ColumnData::Int8($v) => ColumnData::Int8($body),
            ColumnData::Int16($v) => ColumnData::Int16($body),
            ColumnData::Int32($v) => ColumnData::Int32($body),
            ColumnData::Int64($v) => ColumnData::Int64($body),
            ColumnData::UInt8($v) => ColumnData::UInt8($body),
            ColumnData::UInt16($v) => ColumnData::UInt16($body),
            ColumnData::UInt32($v) => ColumnData::UInt32($body),
            ColumnData::UInt64($v) => ColumnData::UInt64($body),
            ColumnData::Float32($v) => ColumnData::Float32($body),
            ColumnData::Float64($v) => ColumnData::Float64($body),
            ColumnData::Bool($v) => ColumnData::Bool($body),
            ColumnData::Utf8($v) => ColumnData::Utf8($body),
            ColumnData::Rows($m) => ColumnData::Rows($rows),
        }
    };
}

/// Evaluate an expression against the vector inside any flat variant.
macro_rules! with_flat {
    ($data:expr, $v:ident => $body:expr, $m:ident => $rows:expr) => {
        match $data {
            ColumnData::Int8($v) => $body,
            ColumnData::Int16($v) => $body,
            ColumnData::Int32($v) => $body,
            ColumnData::Int64($v) => $body,
            ColumnData::UInt8($v) => $body,
            ColumnData::UInt16($v) => $body,
            ColumnData::UInt32($v) => $body,
            ColumnData::UInt64($v) => $body,
            ColumnData::Float32($v) => $body,
            ColumnData::Float64($v) => $body,
            ColumnData::Bool($v) => $body,
            ColumnData::Utf8($v) => $body,
            ColumnData::Rows($m) => $rows,
        }
    };
}

impl ColumnData {
    /// Number of elements (rows).
    pub fn len(&self) -> usize {
        with_flat!(self, v => v.len(), m => m.nrows())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element type.
    pub fn dtype(&self) -> DType {
        match self {
            ColumnData::Int8(_) => DType::Int8,
            ColumnData::Int16(_) => DType::Int16,
            ColumnData::Int32(_) => DType::Int32,
            ColumnData::Int64(_) => DType::Int64,
            ColumnData::UInt8(_) => DType::UInt8,
            ColumnData::UInt16(_) => DType::UInt16,
            ColumnData::UInt32(_) => DType::UInt32,
            ColumnData::UInt64(_) => DType::UInt64,
            ColumnData::Float32(_) => DType::Float32,
            ColumnData::Float64(_) => DType::Float64,
            ColumnData::Bool(_) => DType::Bool,
            ColumnData::Utf8(_) => DType::Utf8,
            ColumnData::Rows(_) => DType::List,
        }
    }

    /// An empty column of the same type.
    pub fn empty_like(&self) -> Self {
        map_flat!(self, _v => Vec::new(), m => m.take_rows(&[]))
    }

    /// A column of `len` copies of `value`.
    pub fn repeat_str(value: &str, len: usize) -> Self {
        ColumnData::Utf8(vec![value.to_string(); len])
    }

    /// Select rows by position, in the given order.
    ///
    /// Panics if any index is out of bounds.
    pub fn take(&self, indices: &[usize]) -> Self {
        map_flat!(
            self,
            v => indices.iter().map(|&i| v[i].clone()).collect(),
            m => m.take_rows(indices)
        )
    }

    /// Keep only the rows where `mask` is true.
    pub fn filter(&self, mask: &[bool]) -> ArrayResult<Self> {
        if mask.len() != self.len() {
            return Err(ArrayError::LengthMismatch {
                expected: self.len(),
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

    /// Append the rows of `other`, which must have the same type.
    pub fn extend(&mut self, other: &ColumnData) -> ArrayResult<()> {
        macro_rules! extend_same {
            ($this:expr, $other:expr; $($variant:ident),*) => {
                match ($this, $other) {
                    $((ColumnData::$variant(a), ColumnData::$variant(b)) => {
                        a.extend(b.iter().cloned());
                        Ok(())
                    })*
                    (ColumnData::Rows(a), ColumnData::Rows(b)) => a.extend(b),
                    (a, b) => Err(ArrayError::TypeMismatch {
                        expected: a.dtype(),
                        actual: b.dtype(),
                    }),
                }
            };
        }
        extend_same!(
            self, other;
            Int8, Int16, Int32, Int64, UInt8, UInt16, UInt32, UInt64, Float32, Float64, Bool,
            Utf8
        )
    }

    /// Value at position `i`.
    pub fn get(&self, i: usize) -> Option<Scalar> {
        if i >= self.len() {
            return None;
        }
        Some(match self {
            ColumnData::Int8(v) => Scalar::Int(v[i] as i64),
            ColumnData::Int16(v) => Scalar::Int(v[i] as i64),
            ColumnData::Int32(v) => Scalar::Int(v[i] as i64),
            ColumnData::Int64(v) => Scalar::Int(v[i]),
            ColumnData::UInt8(v) => Scalar::UInt(v[i] as u64),
            ColumnData::UInt16(v) => Scalar::UInt(v[i] as u64),
            ColumnData::UInt32(v) => Scalar::UInt(v[i] as u64),
            ColumnData::UInt64(v) => Scalar::UInt(v[i]),
            ColumnData::Float32(v) => Scalar::Float(v[i] as f64),
            ColumnData::Float64(v) => Scalar::Float(v[i]),
            ColumnData::Bool(v) => Scalar::Bool(v[i]),
            ColumnData::Utf8(v) => Scalar::Str(v[i].clone()),
            ColumnData::Rows(m) => Scalar::Row(m.row(i).iter_scalars().collect()),
        })
    }

    /// Iterate over all values as scalars.
    pub fn iter_scalars(&self) -> impl Iterator<Item = Scalar> + '_ {
        (0..self.len()).filter_map(move |i| self.get(i))
    }

    /// Numeric values widened to `f64`, or `None` for non-numeric columns.
    pub fn to_f64_vec(&self) -> Option<Vec<f64>> {
        Some(match self {
            ColumnData::Int8(v) => v.iter().map(|&x| x as f64).collect(),
            ColumnData::Int16(v) => v.iter().map(|&x| x as f64).collect(),
            ColumnData::Int32(v) => v.iter().map(|&x| x as f64).collect(),
            ColumnData::Int64(v) => v.iter().map(|&x| x as f64).collect(),
            ColumnData::UInt8(v) => v.iter().map(|&x| x as f64).collect(),
            ColumnData::UInt16(v) => v.iter().map(|&x| x as f64).collect(),
            ColumnData::UInt32(v) => v.iter().map(|&x| x as f64).collect(),
            ColumnData::UInt64(v) => v.iter().map(|&x| x as f64).collect(),
            ColumnData::Float32(v) => v.iter().map(|&x| x as f64).collect(),
            ColumnData::Float64(v) => v.clone(),
            _ => return None,
        })
    }
}

/// Row-major two-dimensional array of a single flat type.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    values: Box<ColumnData>,
    nrows: usize,
    ncols: usize,
}

impl Matrix {
    /// Create a matrix from flat row-major values.
    pub fn new(values: ColumnData, nrows: usize, ncols: usize) -> ArrayResult<Self> {
        if matches!(values, ColumnData::Rows(_)) {
            return Err(ArrayError::NestedRows);
        }
        if values.len() != nrows * ncols {
            return Err(ArrayError::LengthMismatch {
                expected: nrows * ncols,
                actual: values.len(),
            });
        }
        Ok(Self {
            values: Box::new(values),
            nrows,
            ncols,
        })
    }

    /// Build a `Float64` matrix from nested rows. All rows must have equal length.
    pub fn from_rows(rows: &[Vec<f64>]) -> ArrayResult<Self> {
        let ncols = rows.first().map_or(0, Vec::len);
        let mut flat = Vec::with_capacity(rows.len() * ncols);
        for row in rows {
            if row.len() != ncols {
                return Err(ArrayError::LengthMismatch {
                    expected: ncols,
                    actual: row.len(),
                });
            }
            flat.extend_from_slice(row);
        }
        Self::new(ColumnData::Float64(flat), rows.len(), ncols)
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.nrows, self.ncols)
    }

    /// Element type of the matrix values.
    pub fn dtype(&self) -> DType {
        self.values.dtype()
    }

    /// Extract column `col` (0-based, non-negative) as a 1D column.
    pub fn column(&self, col: usize) -> ArrayResult<ColumnData> {
        if col >= self.ncols {
            return Err(ArrayError::IndexOutOfRange {
                index: col as i64,
                length: self.ncols,
            });
        }
        let positions: Vec<usize> = (0..self.nrows).map(|r| r * self.ncols + col).collect();
        Ok(self.values.take(&positions))
    }

    /// Extract row `row` as a 1D column.
    ///
    /// Panics if `row` is out of bounds.
    pub fn row(&self, row: usize) -> ColumnData {
        let start = row * self.ncols;
        let positions: Vec<usize> = (start..start + self.ncols).collect();
        self.values.take(&positions)
    }

    /// Select whole rows by position.
    pub fn take_rows(&self, rows: &[usize]) -> Self {
        let positions: Vec<usize> = rows
            .iter()
            .flat_map(|&r| (r * self.ncols)..(r * self.ncols + self.ncols))
            .collect();
        Self {
            values: Box::new(self.values.take(&positions)),
            nrows: rows.len(),
            ncols: self.ncols,
        }
    }

    /// Append the rows of another matrix with the same width and type.
    pub fn extend(&mut self, other: &Matrix) -> ArrayResult<()> {
        if other.ncols != self.ncols {
            return Err(ArrayError::LengthMismatch {
                expected: self.ncols,
                actual: other.ncols,
            });
        }
        self.values.extend(&other.values)?;
        self.nrows += other.nrows;
        Ok(())
    }
}

/// A named column whose data is shared, so cached columns can be handed out
/// without copying.
#[derive(Debug, Clone)]
pub struct Column {
    name: String,
    data: Arc<ColumnData>,
}

impl Column {
    pub fn new(name: impl Into<String>, data: ColumnData) -> Self {
        Self {
            name: name.into(),
            data: Arc::new(data),
        }
    }

    /// Wrap already shared data.
    pub fn from_shared(name: impl Into<String>, data: Arc<ColumnData>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &ColumnData {
        &self.data
    }

    /// The shared data handle.
    pub fn shared(&self) -> &Arc<ColumnData> {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    /// Same data under a different name.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: Arc::clone(&self.data),
        }
    }

    /// Check whether two columns share the same underlying allocation.
    pub fn ptr_eq(&self, other: &Column) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    /// Select rows by position.
    pub fn take(&self, indices: &[usize]) -> Self {
        Self::new(self.name.clone(), self.data.take(indices))
    }
}
