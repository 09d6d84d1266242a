//! Error types for filter expressions.

use thiserror::Error;

/// Result type alias using ExprError.
pub type Result<T> = std::result::Result<T, ExprError>;

/// Errors raised while parsing or evaluating a filter expression.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    #[error("Invalid filter expression '{expr}': {message}")]
    Parse { expr: String, message: String },

    #[error("Undefined name in filter expression: {0}")]
    UndefinedName(String),

    #[error("Type error: cannot apply '{op}' to {left} and {right}")]
    Type {
        op: String,
        left: String,
        right: String,
    },

    #[error("Filter expression must evaluate to a boolean, got {0}")]
    NotBoolean(String),

    #[error("Operand lengths differ: {left} vs {right}")]
    LengthMismatch { left: usize, right: usize },
}
