//! Boolean filter expressions over named columns.
//!
//! Filtering is done in two phases. A query string is parsed into an
//! [`Expr`] whose free names ([`Expr::names`]) are handed to the caller for
//! resolution, and the expression is then evaluated over the resolved
//! columns with [`evaluate`], producing a row [`Predicate`].
//!
//! Names that are not plain identifiers are written in backticks and are
//! mangled through a [`TokenTable`]; the same table recovers the original
//! name with [`TokenTable::desanitize`].

pub mod ast;
pub mod error;
pub mod eval;
pub mod parser;
pub mod tokens;

pub use ast::{BinaryOp, CompareOp, Expr, Literal, NameRef, UnaryOp};
pub use error::{ExprError, Result};
pub use eval::{evaluate, Environment, Predicate};
pub use parser::parse;
pub use tokens::{TokenTable, BACKTICK_PREFIX};
