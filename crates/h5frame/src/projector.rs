//! Column projection from a hierarchical group.
//!
//! A group is treated as a flat relational table whose columns are its
//! datasets, named by their path relative to the group (`agbd`,
//! `land_cover_data/landsat_treecover`). A key may also select columns of a
//! 2D dataset:
//!
//! | Key          | Result                                              |
//! |--------------|-----------------------------------------------------|
//! | `rh`         | the whole dataset under `rh` (1D or 2D)             |
//! | `rh[0]`      | column 0 under `rh[0]`                              |
//! | `rh[-1]`     | the last column under `rh[-1]`                      |
//! | `rh[1:]`     | columns 1.. under `rh[1]`, `rh[2]`, ...             |
//! | `rh[-2:]`    | the last two columns under `rh[-2]`, `rh[-1]`       |
//! | `rh[::2]`    | every other column                                  |
//!
//! Negative positions are kept in output names so callers can refer to "the
//! last column" without knowing how many columns a dataset has. A slice that
//! selects nothing produces no columns rather than an error.

use filter_expr::TokenTable;
use gedi_common::{Column, ColumnData, Matrix};
use nom::{
    bytes::complete::take_while1,
    character::complete::{char, digit1},
    combinator::{all_consuming, opt, recognize},
    multi::many0,
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};
use tracing::debug;

use crate::error::{FrameError, Result};
use crate::frame::Frame;
use crate::group::{ArrayData, Dataset, HierarchicalGroup};

/// Column selection suffix of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnSelector {
    Index(i64),
    Slice {
        start: Option<i64>,
        end: Option<i64>,
        step: Option<i64>,
    },
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn dataset_path(i: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(is_name_char),
        many0(preceded(char('/'), take_while1(is_name_char))),
    ))(i)
}

fn signed(i: &str) -> IResult<&str, i64> {
    let (rest, text) = recognize(pair(opt(char('-')), digit1))(i)?;
    match text.parse() {
        Ok(v) => Ok((rest, v)),
        Err(_) => Err(nom::Err::Error(nom::error::Error::new(
            i,
            nom::error::ErrorKind::Digit,
        ))),
    }
}

fn selector(i: &str) -> IResult<&str, ColumnSelector> {
    let (rest, (start, colon)) = pair(opt(signed), opt(char(':')))(i)?;
    match (start, colon) {
        (Some(index), None) => Ok((rest, ColumnSelector::Index(index))),
        (_, Some(_)) => {
            let (rest, (end, step)) = tuple((opt(signed), opt(preceded(char(':'), opt(signed)))))(rest)?;
            Ok((
                rest,
                ColumnSelector::Slice {
                    start,
                    end,
                    step: step.flatten(),
                },
            ))
        }
        (None, None) => Err(nom::Err::Error(nom::error::Error::new(
            i,
            nom::error::ErrorKind::Char,
        ))),
    }
}

fn keyed(i: &str) -> IResult<&str, (&str, ColumnSelector)> {
    all_consuming(pair(dataset_path, delimited(char('['), selector, char(']'))))(i)
}

/// Split a key into a dataset path and an optional column selector.
///
/// Keys that do not end in a well-formed `[index]` or `[start:end:step]`
/// suffix are returned whole with no selector.
pub fn parse_key(key: &str) -> (String, Option<ColumnSelector>) {
    match keyed(key) {
        Ok((_, (name, selector))) => (name.to_string(), Some(selector)),
        Err(_) => (key.to_string(), None),
    }
}

/// Concrete column positions covered by `selector` for `length` columns.
///
/// An index is returned as given (negative indices stay negative) and must
/// lie in `-length..length`. Slices are clipped to the available columns;
/// when the slice start is negative the positions are reported counted from
/// the end.
pub fn compute_indices(selector: ColumnSelector, length: usize) -> Result<Vec<i64>> {
    let len = length as i64;
    match selector {
        ColumnSelector::Index(i) => {
            if i < -len || i >= len {
                return Err(FrameError::IndexOutOfRange { index: i, length });
            }
            Ok(vec![i])
        }
        ColumnSelector::Slice { start, end, step } => {
            let step = step.unwrap_or(1);
            if step == 0 {
                return Err(FrameError::InvalidKey("slice step cannot be zero".to_string()));
            }
            let (lower, upper) = if step > 0 { (0, len) } else { (-1, len - 1) };
            let clamp = |bound: Option<i64>, default: i64| match bound {
                None => default,
                Some(b) if b < 0 => (b + len).max(lower),
                Some(b) => b.min(upper),
            };
            let from = clamp(start, if step > 0 { lower } else { upper });
            let to = clamp(end, if step > 0 { upper } else { lower });

            let mut positions = Vec::new();
            let mut i = from;
            while (step > 0 && i < to) || (step < 0 && i > to) {
                positions.push(i);
                i += step;
            }

            if start.is_some_and(|s| s < 0) {
                positions.iter_mut().for_each(|p| *p -= len);
            }
            Ok(positions)
        }
    }
}

/// Absolute column position for a possibly negative index.
pub fn resolve_position(index: i64, length: usize) -> usize {
    if index < 0 {
        (index + length as i64) as usize
    } else {
        index as usize
    }
}

/// Fetch a dataset by relative path.
pub fn fetch_dataset<G: HierarchicalGroup>(group: &G, name: &str) -> Result<G::Dataset> {
    group
        .dataset(name)?
        .ok_or_else(|| FrameError::DatasetNotFound {
            group: group.name(),
            name: name.to_string(),
        })
}

/// A dataset read selected by a key, not yet performed.
pub enum Planned<D> {
    /// The whole dataset.
    Whole { name: String, dataset: D },
    /// One column of a 2D dataset.
    Column {
        name: String,
        dataset: D,
        position: usize,
    },
}

impl<D: Dataset> Planned<D> {
    /// Output name of the read.
    pub fn name(&self) -> &str {
        match self {
            Planned::Whole { name, .. } | Planned::Column { name, .. } => name,
        }
    }

    pub fn read(&self) -> Result<ArrayData> {
        match self {
            Planned::Whole { dataset, .. } => dataset.read(),
            Planned::Column { dataset, position, .. } => {
                Ok(ArrayData::OneD(dataset.read_column(*position)?))
            }
        }
    }
}

/// Work out which reads a key needs, checking the dataset exists and has the
/// rank and columns the key asks for.
///
/// `key` must already be desanitized.
pub fn plan_one<G: HierarchicalGroup>(group: &G, key: &str) -> Result<Vec<Planned<G::Dataset>>> {
    let (name, selector) = parse_key(key);
    let dataset = fetch_dataset(group, &name)?;

    let Some(selector) = selector else {
        return Ok(vec![Planned::Whole { name, dataset }]);
    };

    if dataset.ndim() < 2 {
        return Err(FrameError::RankMismatch {
            dataset: dataset.name(),
            key: key.to_string(),
        });
    }

    let ncols = dataset.shape()[1];
    Ok(compute_indices(selector, ncols)?
        .into_iter()
        .map(|i| Planned::Column {
            name: format!("{}[{}]", name, i),
            dataset: dataset.clone(),
            position: resolve_position(i, ncols),
        })
        .collect())
}

/// Resolve a single key against a group.
///
/// `key` must already be desanitized.
pub fn project_one<G: HierarchicalGroup>(group: &G, key: &str) -> Result<Vec<(String, ArrayData)>> {
    plan_one(group, key)?
        .into_iter()
        .map(|planned| Ok((planned.name().to_string(), planned.read()?)))
        .collect()
}

/// Ordered mapping of output names to projected data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection {
    entries: Vec<(String, ArrayData)>,
}

impl Projection {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> Vec<&str> {
        self.entries.iter().map(|(k, _)| k.as_str()).collect()
    }

    pub fn get(&self, key: &str) -> Option<&ArrayData> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArrayData)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Add an entry unless its key is already present.
    fn merge(&mut self, key: String, data: ArrayData) {
        if self.get(&key).is_none() {
            self.entries.push((key, data));
        }
    }

    /// Convert to a table.
    ///
    /// 1D entries become one column each. A 2D entry becomes a single column
    /// of whole rows, or with `expand` one column per matrix column named
    /// `0`, `1`, ...
    pub fn into_frame(self, expand: bool) -> Result<Frame> {
        let mut frame = Frame::new();
        for (key, data) in self.entries {
            match data {
                ArrayData::OneD(column) => frame.push(Column::new(key, column))?,
                ArrayData::TwoD(matrix) if expand => {
                    for column in expand_matrix(&matrix)? {
                        frame.push(column)?;
                    }
                }
                ArrayData::TwoD(matrix) => frame.push(Column::new(key, ColumnData::Rows(matrix)))?,
            }
        }
        Ok(frame)
    }
}

/// One column per matrix column, positionally named.
pub fn expand_matrix(matrix: &Matrix) -> Result<Vec<Column>> {
    (0..matrix.ncols())
        .map(|i| Ok(Column::new(i.to_string(), matrix.column(i)?)))
        .collect()
}

/// Projects columns of one group, recovering backtick-mangled keys.
pub struct Projector<'a, G> {
    group: &'a G,
    tokens: &'a TokenTable,
}

impl<'a, G: HierarchicalGroup> Projector<'a, G> {
    pub fn new(group: &'a G, tokens: &'a TokenTable) -> Self {
        Self { group, tokens }
    }

    /// Resolve keys into a projection, in key order without duplicates.
    pub fn project<S: AsRef<str>>(&self, keys: &[S]) -> Result<Projection> {
        let mut projection = Projection::default();
        for key in keys {
            let key = self.tokens.desanitize(key.as_ref());
            for (name, data) in project_one(self.group, &key)? {
                projection.merge(name, data);
            }
        }
        debug!(
            group = %self.group.name(),
            columns = projection.len(),
            "Projected columns"
        );
        Ok(projection)
    }

    /// Select a single key; 2D results are expanded into numbered columns.
    pub fn select(&self, key: &str) -> Result<Frame> {
        self.project(&[key])?.into_frame(true)
    }

    /// Select several keys; 2D results stay whole as columns of rows.
    pub fn select_many<S: AsRef<str>>(&self, keys: &[S]) -> Result<Frame> {
        self.project(keys)?.into_frame(false)
    }
}
