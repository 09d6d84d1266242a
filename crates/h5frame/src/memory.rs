//! In-memory hierarchical groups.
//!
//! Used for tests and for data that is already resident. Every dataset read
//! is recorded in a log shared by all handles of one tree, which makes it
//! possible to check which datasets a projection actually touched.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use gedi_common::{ColumnData, Matrix};

use crate::error::{FrameError, Result};
use crate::group::{ArrayData, Dataset, HierarchicalGroup, Node};

type ReadLog = Arc<Mutex<Vec<String>>>;

#[derive(Debug)]
struct GroupNode {
    path: String,
    attrs: BTreeMap<String, String>,
    members: BTreeMap<String, MemberNode>,
}

#[derive(Debug)]
enum MemberNode {
    Group(Arc<GroupNode>),
    Dataset(Arc<DatasetNode>),
}

#[derive(Debug)]
struct DatasetNode {
    path: String,
    data: ArrayData,
}

/// Builder for an in-memory group tree.
#[derive(Debug, Clone)]
pub struct GroupBuilder {
    name: String,
    attrs: BTreeMap<String, String>,
    members: BTreeMap<String, MemberBuilder>,
}

#[derive(Debug, Clone)]
enum MemberBuilder {
    Group(GroupBuilder),
    Dataset(ArrayData),
}

impl GroupBuilder {
    /// Start a group. The name of the root group is ignored.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: BTreeMap::new(),
            members: BTreeMap::new(),
        }
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    /// Add a 1D dataset.
    pub fn dataset(mut self, name: impl Into<String>, data: ColumnData) -> Self {
        self.members
            .insert(name.into(), MemberBuilder::Dataset(ArrayData::OneD(data)));
        self
    }

    /// Add a 2D dataset.
    pub fn dataset_2d(mut self, name: impl Into<String>, data: Matrix) -> Self {
        self.members
            .insert(name.into(), MemberBuilder::Dataset(ArrayData::TwoD(data)));
        self
    }

    /// Add a sub-group.
    pub fn group(mut self, child: GroupBuilder) -> Self {
        self.members
            .insert(child.name.clone(), MemberBuilder::Group(child));
        self
    }

    /// Freeze the tree. The result is the root group of a file called `filename`.
    pub fn build(self, filename: impl Into<String>) -> MemoryGroup {
        MemoryGroup {
            filename: Arc::from(filename.into()),
            node: Arc::new(self.freeze("/".to_string())),
            reads: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn freeze(self, path: String) -> GroupNode {
        let members = self
            .members
            .into_iter()
            .map(|(name, member)| {
                let child_path = if path == "/" {
                    format!("/{}", name)
                } else {
                    format!("{}/{}", path, name)
                };
                let node = match member {
                    MemberBuilder::Group(group) => {
                        MemberNode::Group(Arc::new(group.freeze(child_path)))
                    }
                    MemberBuilder::Dataset(data) => MemberNode::Dataset(Arc::new(DatasetNode {
                        path: child_path,
                        data,
                    })),
                };
                (name, node)
            })
            .collect();

        GroupNode {
            path,
            attrs: self.attrs,
            members,
        }
    }
}

/// Handle to a group of an in-memory tree.
#[derive(Debug, Clone)]
pub struct MemoryGroup {
    filename: Arc<str>,
    node: Arc<GroupNode>,
    reads: ReadLog,
}

impl MemoryGroup {
    /// Full paths of the datasets read so far, in read order.
    pub fn reads(&self) -> Vec<String> {
        self.reads.lock().map(|log| log.clone()).unwrap_or_default()
    }

    /// Forget recorded reads.
    pub fn clear_reads(&self) {
        if let Ok(mut log) = self.reads.lock() {
            log.clear();
        }
    }
}

impl HierarchicalGroup for MemoryGroup {
    type Dataset = MemoryDataset;

    fn name(&self) -> String {
        self.node.path.clone()
    }

    fn filename(&self) -> String {
        self.filename.to_string()
    }

    fn member_names(&self) -> Result<Vec<String>> {
        Ok(self.node.members.keys().cloned().collect())
    }

    fn get(&self, path: &str) -> Result<Option<Node<Self, MemoryDataset>>> {
        let mut parts = path.split('/').filter(|p| !p.is_empty()).peekable();
        if parts.peek().is_none() {
            return Ok(None);
        }

        let mut current = Arc::clone(&self.node);
        while let Some(part) = parts.next() {
            let last = parts.peek().is_none();
            let next = match current.members.get(part) {
                None => return Ok(None),
                Some(MemberNode::Group(group)) if last => {
                    return Ok(Some(Node::Group(MemoryGroup {
                        filename: Arc::clone(&self.filename),
                        node: Arc::clone(group),
                        reads: Arc::clone(&self.reads),
                    })));
                }
                Some(MemberNode::Group(group)) => Arc::clone(group),
                Some(MemberNode::Dataset(dataset)) if last => {
                    return Ok(Some(Node::Dataset(MemoryDataset {
                        node: Arc::clone(dataset),
                        reads: Arc::clone(&self.reads),
                    })));
                }
                Some(MemberNode::Dataset(_)) => return Ok(None),
            };
            current = next;
        }
        Ok(None)
    }

    fn attr(&self, name: &str) -> Result<Option<String>> {
        Ok(self.node.attrs.get(name).cloned())
    }
}

/// Handle to a dataset of an in-memory tree.
#[derive(Debug, Clone)]
pub struct MemoryDataset {
    node: Arc<DatasetNode>,
    reads: ReadLog,
}

impl MemoryDataset {
    fn record_read(&self) {
        if let Ok(mut log) = self.reads.lock() {
            log.push(self.node.path.clone());
        }
    }
}

impl Dataset for MemoryDataset {
    fn name(&self) -> String {
        self.node.path.clone()
    }

    fn shape(&self) -> Vec<usize> {
        match &self.node.data {
            ArrayData::OneD(data) => vec![data.len()],
            ArrayData::TwoD(matrix) => vec![matrix.nrows(), matrix.ncols()],
        }
    }

    fn read(&self) -> Result<ArrayData> {
        self.record_read();
        Ok(self.node.data.clone())
    }

    fn read_column(&self, col: usize) -> Result<ColumnData> {
        self.record_read();
        match &self.node.data {
            ArrayData::TwoD(matrix) => Ok(matrix.column(col)?),
            ArrayData::OneD(_) => Err(FrameError::RankMismatch {
                dataset: self.node.path.clone(),
                key: format!("{}[{}]", self.node.path, col),
            }),
        }
    }
}
