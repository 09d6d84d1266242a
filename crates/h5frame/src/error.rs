//! Error types for projecting and querying hierarchical groups.

use filter_expr::ExprError;
use gedi_common::ArrayError;
use thiserror::Error;

/// Result type alias using FrameError.
pub type Result<T> = std::result::Result<T, FrameError>;

/// Errors raised by the projector and lazy tables.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The path does not name a dataset (it is missing or is a group).
    #[error("Dataset not found in group '{group}': {name}")]
    DatasetNotFound { group: String, name: String },

    /// The key names neither a materialized column nor a group member.
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// Index or slice syntax applied to a one-dimensional dataset.
    #[error("Dataset '{dataset}' is 1D; indexing and slicing are not permitted: {key}")]
    RankMismatch { dataset: String, key: String },

    /// Two-dimensional datasets requested where single columns are required.
    #[error(
        "2D datasets cannot be selected as single columns: {}; select specific columns instead, e.g. {}",
        names.join(", "),
        suggestions.join(", ")
    )]
    Ambiguous2D {
        names: Vec<String>,
        suggestions: Vec<String>,
    },

    /// A group was requested where a column is required.
    #[error("'{0}' is a group, not a column")]
    NotAColumn(String),

    #[error("Column index {index} out of range for {length} columns")]
    IndexOutOfRange { index: i64, length: usize },

    #[error("Invalid column key: {0}")]
    InvalidKey(String),

    #[error("Column '{name}' has {actual} rows, expected {expected}")]
    RowCountMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("Duplicate column: {0}")]
    DuplicateColumn(String),

    #[error(transparent)]
    Expression(#[from] ExprError),

    #[error(transparent)]
    Array(#[from] ArrayError),

    /// Backend read failure.
    #[error("Failed to read {path}: {message}")]
    Read { path: String, message: String },

    #[error("Unsupported dataset type for {path}: {dtype}")]
    UnsupportedType { path: String, dtype: String },
}
