//! Lazily materialized tables over hierarchical groups.
//!
//! A [`LazyTable`] starts out with no data. Columns are read from the
//! backing group the first time they are referenced, either directly with
//! [`LazyTable::get`] or from a filter expression passed to
//! [`LazyTable::query`], and are cached for reuse.
//!
//! Tables for sub-groups share the column store of the table they were
//! reached from, so a nested dataset referenced as
//! `land_cover_data.landsat_treecover` is cached once under its full path
//! `land_cover_data/landsat_treecover`.
//!
//! The store also tracks which rows of the underlying datasets survive
//! earlier queries. Every newly read column is cut down to those rows, so it
//! lines up with the columns already present, including when no rows are
//! left at all.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use filter_expr::{evaluate, parse, ExprError, NameRef, Predicate, TokenTable};
use gedi_common::{Column, ColumnData, Matrix};
use tracing::debug;

use crate::error::{FrameError, Result};
use crate::frame::Frame;
use crate::group::{ArrayData, Dataset, HierarchicalGroup, Node};
use crate::projector::{expand_matrix, parse_key, plan_one, ColumnSelector, Planned};

/// Result of looking up a key in a [`LazyTable`].
pub enum Resolved<G: HierarchicalGroup> {
    /// A 1D column, cached in the table.
    Column(Column),
    /// A sub-group, as a lazy table of its own.
    Table(LazyTable<G>),
    /// A whole 2D dataset. These are not cached.
    Matrix { name: String, data: Matrix },
    /// Several columns selected by a slice.
    Frame(Frame),
}

impl<G: HierarchicalGroup> Resolved<G> {
    /// The column, if this is one.
    pub fn into_column(self) -> Option<Column> {
        match self {
            Resolved::Column(column) => Some(column),
            _ => None,
        }
    }

    /// Tabular form: 2D data is expanded into numbered columns.
    pub fn into_frame(self) -> Result<Frame> {
        match self {
            Resolved::Column(column) => Frame::from_columns([column]),
            Resolved::Matrix { data, .. } => Frame::from_columns(expand_matrix(&data)?),
            Resolved::Frame(frame) => Ok(frame),
            Resolved::Table(table) => table.materialized(),
        }
    }
}

/// Materialized columns plus the surviving row positions.
#[derive(Debug, Clone, Default)]
struct ColumnStore {
    /// Positions, in the original datasets, of the rows still present.
    /// `None` means every row.
    index: Option<Vec<usize>>,
    /// Row count of the underlying datasets, set by the first read.
    source_rows: Option<usize>,
    columns: Vec<Column>,
}

impl ColumnStore {
    fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name() == name)
    }

    fn nrows(&self) -> Option<usize> {
        match &self.index {
            Some(index) => Some(index.len()),
            None => self.columns.first().map(Column::len),
        }
    }

    /// Check a newly read dataset against the row count of earlier reads.
    fn check_rows(&mut self, name: &str, rows: usize) -> Result<()> {
        match self.source_rows {
            Some(expected) if expected != rows => Err(FrameError::RowCountMismatch {
                name: name.to_string(),
                expected,
                actual: rows,
            }),
            Some(_) => Ok(()),
            None => {
                self.source_rows = Some(rows);
                Ok(())
            }
        }
    }

    /// Cut freshly read data down to the surviving rows.
    fn align(&mut self, name: &str, data: ArrayData) -> Result<ArrayData> {
        self.check_rows(name, data.nrows())?;
        Ok(match &self.index {
            Some(index) => data.take_rows(index),
            None => data,
        })
    }

    /// Cache a column, keeping any column already stored under the name.
    fn insert(&mut self, column: Column) -> Column {
        if let Some(existing) = self.column(column.name()) {
            return existing.clone();
        }
        self.columns.push(column.clone());
        column
    }

    fn narrowed(&self, predicate: &Predicate) -> Result<ColumnStore> {
        let mask = match predicate {
            Predicate::Constant(true) => return Ok(self.clone()),
            Predicate::Constant(false) => vec![false; self.nrows().unwrap_or(0)],
            Predicate::Mask(mask) => mask.clone(),
        };

        if let Some(nrows) = self.nrows() {
            if nrows != mask.len() {
                return Err(FrameError::RowCountMismatch {
                    name: "<query mask>".to_string(),
                    expected: nrows,
                    actual: mask.len(),
                });
            }
        }

        let kept: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter_map(|(i, keep)| keep.then_some(i))
            .collect();
        let index = match &self.index {
            Some(index) => kept.iter().map(|&i| index[i]).collect(),
            None => kept.clone(),
        };
        let columns = self
            .columns
            .iter()
            .map(|c| c.take(&kept))
            .collect();

        Ok(ColumnStore {
            index: Some(index),
            source_rows: self.source_rows,
            columns,
        })
    }
}

/// A table view over a hierarchical group that reads columns on demand.
///
/// Not thread-safe: each worker builds its own tables.
pub struct LazyTable<G: HierarchicalGroup> {
    group: G,
    parent: Option<Rc<LazyTable<G>>>,
    store: Rc<RefCell<ColumnStore>>,
    tokens: Arc<TokenTable>,
}

impl<G: HierarchicalGroup> Clone for LazyTable<G> {
    fn clone(&self) -> Self {
        Self {
            group: self.group.clone(),
            parent: self.parent.clone(),
            store: Rc::clone(&self.store),
            tokens: Arc::clone(&self.tokens),
        }
    }
}

impl<G: HierarchicalGroup> LazyTable<G> {
    /// Create a root table over `group`.
    pub fn new(group: G, tokens: Arc<TokenTable>) -> Self {
        Self {
            group,
            parent: None,
            store: Rc::new(RefCell::new(ColumnStore::default())),
            tokens,
        }
    }

    pub fn group(&self) -> &G {
        &self.group
    }

    pub fn parent(&self) -> Option<&LazyTable<G>> {
        self.parent.as_deref()
    }

    /// The ancestor without a parent.
    pub fn root(&self) -> &LazyTable<G> {
        let mut table = self;
        while let Some(parent) = &table.parent {
            table = parent.as_ref();
        }
        table
    }

    /// Path of this table's group relative to the root's group.
    pub fn relative_path(&self) -> String {
        let root = self.root().group.name();
        let own = self.group.name();
        own.strip_prefix(&root)
            .unwrap_or(&own)
            .trim_matches('/')
            .to_string()
    }

    /// Full column name of `key` as stored in the shared column store.
    fn qualified(&self, key: &str) -> String {
        let relative = self.relative_path();
        if relative.is_empty() {
            key.to_string()
        } else {
            format!("{}/{}", relative, key)
        }
    }

    fn child(&self, group: G) -> LazyTable<G> {
        LazyTable {
            group,
            parent: Some(Rc::new(self.clone())),
            store: Rc::clone(&self.store),
            tokens: Arc::clone(&self.tokens),
        }
    }

    /// Number of rows, once known.
    ///
    /// Unknown until a column has been read or a query has narrowed the rows.
    pub fn nrows(&self) -> Option<usize> {
        self.store.borrow().nrows()
    }

    /// Names of the columns materialized so far.
    pub fn column_names(&self) -> Vec<String> {
        self.store
            .borrow()
            .columns
            .iter()
            .map(|c| c.name().to_string())
            .collect()
    }

    /// Snapshot of the materialized columns.
    pub fn materialized(&self) -> Result<Frame> {
        Frame::from_columns(self.store.borrow().columns.iter().cloned())
    }

    /// Check whether `key` names a materialized column or a group member.
    pub fn contains(&self, key: &str) -> bool {
        if self.store.borrow().column(&self.qualified(key)).is_some() {
            return true;
        }
        if matches!(self.group.get(key), Ok(Some(_))) {
            return true;
        }
        if self.tokens.is_mangled(key) {
            let original = self.tokens.desanitize(key);
            return original != key && self.contains(&original);
        }
        false
    }

    /// Look up a key, reading and caching data as needed.
    ///
    /// Keys are tried in this order: a cached column; a member of the group
    /// (sub-group, 1D or 2D dataset); a backtick-mangled name, after
    /// recovering the original; a dataset path with an `[index]` or
    /// `[start:end]` suffix; and `<name><digits>`, meaning one column of the
    /// 2D dataset `<name>`.
    pub fn get(&self, key: &str) -> Result<Resolved<G>> {
        let full = self.qualified(key);
        if let Some(column) = self.store.borrow().column(&full) {
            return Ok(Resolved::Column(column.clone()));
        }

        match self.group.get(key)? {
            Some(Node::Group(group)) => return Ok(Resolved::Table(self.child(group))),
            Some(Node::Dataset(_)) => return self.project(key),
            None => {}
        }

        if self.tokens.is_mangled(key) {
            let original = self.tokens.desanitize(key);
            if original != key {
                debug!(key = %key, original = %original, "Recovered mangled name");
                return self.get(&original);
            }
        }

        if parse_key(key).1.is_some() {
            return self.project(key);
        }

        if let Some((name, index)) = split_trailing_index(key) {
            if let Some(dataset) = self.group.dataset(name)? {
                if dataset.ndim() == 2 {
                    let indexed = format!("{}[{}]", name, index);
                    if let Some(planned) = plan_one(&self.group, &indexed)?.pop() {
                        return self.materialize(&full, &planned);
                    }
                }
            }
        }

        Err(FrameError::KeyNotFound(key.to_string()))
    }

    /// Look up a key that must resolve to a single column.
    pub fn column(&self, key: &str) -> Result<Column> {
        match self.get(key)? {
            Resolved::Column(column) => Ok(column),
            Resolved::Matrix { .. } => Err(FrameError::Ambiguous2D {
                names: vec![key.to_string()],
                suggestions: suggestions_for(key),
            }),
            Resolved::Frame(_) | Resolved::Table(_) => Err(FrameError::NotAColumn(key.to_string())),
        }
    }

    /// Look up several keys as a table of single columns.
    ///
    /// Slices contribute one column per selected position. Whole 2D datasets
    /// are rejected with the offending names and indexed alternatives.
    pub fn get_many<S: AsRef<str>>(&self, keys: &[S]) -> Result<Frame> {
        let mut frame = Frame::new();
        let mut ambiguous = Vec::new();
        let mut suggestions = Vec::new();

        for key in keys {
            let key = key.as_ref();
            let columns = match self.get(key)? {
                Resolved::Column(column) => vec![column],
                Resolved::Frame(selected) => selected.into_columns(),
                Resolved::Matrix { .. } => {
                    ambiguous.push(key.to_string());
                    suggestions.extend(suggestions_for(key));
                    continue;
                }
                Resolved::Table(_) => return Err(FrameError::NotAColumn(key.to_string())),
            };
            for column in columns {
                if !frame.contains(column.name()) {
                    frame.push(column)?;
                }
            }
        }

        if !ambiguous.is_empty() {
            return Err(FrameError::Ambiguous2D {
                names: ambiguous,
                suggestions,
            });
        }
        Ok(frame)
    }

    /// Resolve a name from a filter expression into a column.
    ///
    /// Dotted paths walk into sub-groups and a trailing index selects one
    /// column of a 2D dataset. A whole 2D dataset resolves to a column of
    /// rows.
    pub fn resolve_name(&self, name: &NameRef) -> Result<Column> {
        let Some((last, parents)) = name.path.split_last() else {
            return Err(FrameError::KeyNotFound(name.key()));
        };

        let mut table = self.clone();
        for part in parents {
            table = match table.get(part)? {
                Resolved::Table(child) => child,
                _ => return Err(FrameError::KeyNotFound(name.key())),
            };
        }

        let key = match name.index {
            Some(i) => format!("{}[{}]", last, i),
            None => last.clone(),
        };
        match table.get(&key)? {
            Resolved::Column(column) => Ok(column),
            Resolved::Matrix { name, data } => Ok(Column::new(name, ColumnData::Rows(data))),
            Resolved::Table(_) | Resolved::Frame(_) => Err(FrameError::NotAColumn(name.key())),
        }
    }

    /// Evaluate a filter expression, reading any column it mentions.
    pub fn predicate(&self, expr: &str) -> Result<Predicate> {
        let parsed = parse(expr, &self.tokens)?;

        let mut env: HashMap<String, Arc<ColumnData>> = HashMap::new();
        for name in parsed.names() {
            let column = self.resolve_name(&name).map_err(|e| match e {
                FrameError::KeyNotFound(_) | FrameError::DatasetNotFound { .. } => {
                    FrameError::Expression(ExprError::UndefinedName(
                        self.tokens.desanitize(&name.key()),
                    ))
                }
                other => other,
            })?;
            env.insert(name.key(), Arc::clone(column.shared()));
        }

        Ok(evaluate(&parsed, &env)?)
    }

    /// New table restricted to the rows satisfying `expr`.
    ///
    /// The new table has the same group and parent but its own column store,
    /// so this table is left unchanged.
    pub fn query(&self, expr: &str) -> Result<LazyTable<G>> {
        let predicate = self.predicate(expr)?;
        let store = self.store.borrow().narrowed(&predicate)?;
        debug!(
            group = %self.group.name(),
            query = %expr,
            rows = store.nrows().unwrap_or(0),
            "Applied query"
        );
        Ok(LazyTable {
            group: self.group.clone(),
            parent: self.parent.clone(),
            store: Rc::new(RefCell::new(store)),
            tokens: Arc::clone(&self.tokens),
        })
    }

    /// Restrict this table (and every table sharing its store) to the rows
    /// satisfying `expr`.
    pub fn query_in_place(&self, expr: &str) -> Result<()> {
        let predicate = self.predicate(expr)?;
        let narrowed = self.store.borrow().narrowed(&predicate)?;
        *self.store.borrow_mut() = narrowed;
        Ok(())
    }

    /// Read what a dataset key selects through the projector.
    ///
    /// Slices resolve to a frame of their columns; everything else to a
    /// single column or a whole 2D dataset.
    fn project(&self, key: &str) -> Result<Resolved<G>> {
        let mut resolved = plan_one(&self.group, key)?
            .iter()
            .map(|planned| self.materialize(&self.qualified(planned.name()), planned))
            .collect::<Result<Vec<_>>>()?;

        match parse_key(key).1 {
            Some(ColumnSelector::Slice { .. }) => Ok(Resolved::Frame(Frame::from_columns(
                resolved.into_iter().filter_map(Resolved::into_column),
            )?)),
            _ => resolved
                .pop()
                .ok_or_else(|| FrameError::KeyNotFound(key.to_string())),
        }
    }

    /// Perform a planned read under the store name `full`, aligned to the
    /// surviving rows. 1D results are cached; whole 2D datasets are not.
    fn materialize(&self, full: &str, planned: &Planned<G::Dataset>) -> Result<Resolved<G>> {
        if let Some(column) = self.store.borrow().column(full) {
            return Ok(Resolved::Column(column.clone()));
        }

        let data = planned.read()?;
        let mut store = self.store.borrow_mut();
        match store.align(full, data)? {
            ArrayData::OneD(data) => {
                let column = store.insert(Column::new(full, data));
                debug!(column = %full, rows = column.len(), "Materialized column");
                Ok(Resolved::Column(column))
            }
            ArrayData::TwoD(data) => Ok(Resolved::Matrix {
                name: full.to_string(),
                data,
            }),
        }
    }
}

/// Split `xvar0` into `("xvar", 0)`.
fn split_trailing_index(key: &str) -> Option<(&str, usize)> {
    let name = key.trim_end_matches(|c: char| c.is_ascii_digit());
    if name.is_empty() || name.len() == key.len() {
        return None;
    }
    key[name.len()..].parse().ok().map(|index| (name, index))
}

fn suggestions_for(key: &str) -> Vec<String> {
    vec![format!("{}[0]", key), format!("{}[-1]", key), format!("{}[:]", key)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{GroupBuilder, MemoryGroup};

    fn beam() -> MemoryGroup {
        GroupBuilder::new("/")
            .group(
                GroupBuilder::new("BEAM0000")
                    .dataset("agbd", ColumnData::Float32(vec![1.271942, 1.3311168, 1.1160929]))
                    .dataset("sensitivity", ColumnData::Float32(vec![0.9, 0.97, 0.99]))
                    .dataset("l2_quality_flag", ColumnData::Int8(vec![0, 1, 1]))
                    .dataset_2d(
                        "xvar",
                        Matrix::from_rows(&[vec![10.0, 15.0], vec![20.0, 10.0], vec![15.0, 20.0]])
                            .unwrap(),
                    )
                    .group(
                        GroupBuilder::new("land_cover_data")
                            .dataset("landsat_treecover", ColumnData::Float64(vec![77.0, 98.0, 95.0])),
                    ),
            )
            .build("fixture.h5")
            .group("BEAM0000")
            .unwrap()
            .unwrap()
    }

    fn table() -> LazyTable<MemoryGroup> {
        LazyTable::new(beam(), Arc::new(TokenTable::new()))
    }

    #[test]
    fn test_split_trailing_index() {
        assert_eq!(split_trailing_index("xvar0"), Some(("xvar", 0)));
        assert_eq!(split_trailing_index("rh12"), Some(("rh", 12)));
        assert_eq!(split_trailing_index("xvar"), None);
        assert_eq!(split_trailing_index("123"), None);
    }

    #[test]
    fn test_nothing_read_until_referenced() {
        let t = table();
        assert!(t.contains("agbd"));
        assert!(t.contains("land_cover_data"));
        assert!(!t.contains("missing"));
        assert!(t.group().reads().is_empty());
        assert_eq!(t.nrows(), None);
    }

    #[test]
    fn test_get_caches_columns() {
        let t = table();
        let first = t.column("agbd").unwrap();
        let second = t.column("agbd").unwrap();
        assert!(first.ptr_eq(&second));
        assert_eq!(t.group().reads(), vec!["/BEAM0000/agbd"]);
        assert_eq!(t.column_names(), vec!["agbd"]);
    }

    #[test]
    fn test_nested_column_stored_at_root() {
        let t = table();
        let child = match t.get("land_cover_data").unwrap() {
            Resolved::Table(child) => child,
            _ => panic!("expected a sub-table"),
        };
        assert_eq!(child.relative_path(), "land_cover_data");
        assert!(child.parent().is_some());
        assert_eq!(child.root().relative_path(), "");

        let column = child.column("landsat_treecover").unwrap();
        assert_eq!(column.name(), "land_cover_data/landsat_treecover");
        assert_eq!(t.column_names(), vec!["land_cover_data/landsat_treecover"]);
    }

    #[test]
    fn test_two_dimensional_lookups() {
        let t = table();
        assert!(matches!(t.get("xvar").unwrap(), Resolved::Matrix { .. }));
        assert!(t.column_names().is_empty());

        let last = t.column("xvar[-1]").unwrap();
        assert_eq!(last.data(), &ColumnData::Float64(vec![15.0, 10.0, 20.0]));

        let first = t.column("xvar0").unwrap();
        assert_eq!(first.name(), "xvar0");
        assert_eq!(first.data(), &ColumnData::Float64(vec![10.0, 20.0, 15.0]));

        assert!(matches!(
            t.get("agbd[0]"),
            Err(FrameError::RankMismatch { .. })
        ));
        assert!(matches!(t.get("missing"), Err(FrameError::KeyNotFound(_))));
    }

    #[test]
    fn test_get_many_rejects_whole_2d() {
        let t = table();
        match t.get_many(&["agbd", "xvar"]) {
            Err(FrameError::Ambiguous2D { names, suggestions }) => {
                assert_eq!(names, vec!["xvar"]);
                assert!(suggestions.contains(&"xvar[0]".to_string()));
            }
            other => panic!("expected Ambiguous2D, got {:?}", other.map(|f| f.ncols())),
        }

        let frame = t.get_many(&["agbd", "xvar[:]", "agbd"]).unwrap();
        assert_eq!(frame.column_names(), vec!["agbd", "xvar[0]", "xvar[1]"]);
    }

    #[test]
    fn test_query_narrows_new_columns() {
        let t = table();
        let narrowed = t.query("l2_quality_flag == 1").unwrap();
        assert_eq!(narrowed.nrows(), Some(2));
        let agbd = narrowed.column("agbd").unwrap();
        assert_eq!(agbd.data(), &ColumnData::Float32(vec![1.3311168, 1.1160929]));

        // The source table is untouched.
        assert_eq!(t.nrows(), Some(3));
    }

    #[test]
    fn test_query_to_zero_rows_keeps_alignment() {
        let t = table();
        let empty = t.query("sensitivity < 0.9").unwrap();
        assert_eq!(empty.nrows(), Some(0));
        let agbd = empty.column("agbd").unwrap();
        assert_eq!(agbd.len(), 0);
        let nested = empty
            .resolve_name(&NameRef {
                path: vec!["land_cover_data".into(), "landsat_treecover".into()],
                index: None,
            })
            .unwrap();
        assert_eq!(nested.len(), 0);
    }

    #[test]
    fn test_query_in_place_and_constant_queries() {
        let t = table();
        t.query_in_place("sensitivity > 0.95").unwrap();
        assert_eq!(t.nrows(), Some(2));
        assert_eq!(t.query("True").unwrap().nrows(), Some(2));
        assert_eq!(t.query("False").unwrap().nrows(), Some(0));
    }

    #[test]
    fn test_query_undefined_name() {
        let t = table();
        assert!(matches!(
            t.query("nope > 1"),
            Err(FrameError::Expression(ExprError::UndefinedName(name))) if name == "nope"
        ));
    }

    #[test]
    fn test_dot_and_backtick_queries_agree() {
        let dotted = table()
            .query("land_cover_data.landsat_treecover > 80.0")
            .unwrap();
        let quoted = table()
            .query("`land_cover_data/landsat_treecover` > 80.0")
            .unwrap();
        assert_eq!(dotted.nrows(), Some(2));
        assert_eq!(quoted.nrows(), Some(2));
        assert_eq!(
            dotted.column("agbd").unwrap().data(),
            quoted.column("agbd").unwrap().data()
        );
    }
}
