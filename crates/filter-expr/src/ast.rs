//! Filter expression syntax tree.

use std::fmt;

/// A literal value appearing in an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int(v) => write!(f, "{}", v),
            Literal::Float(v) => write!(f, "{:?}", v),
            Literal::Bool(true) => write!(f, "True"),
            Literal::Bool(false) => write!(f, "False"),
            Literal::Str(v) => write!(f, "{:?}", v),
        }
    }
}

/// A reference to a column: one or more dot-separated identifiers with an
/// optional trailing column index, e.g. `land_cover_data.landsat_treecover`
/// or `xvar[-1]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NameRef {
    pub path: Vec<String>,
    pub index: Option<i64>,
}

impl NameRef {
    /// A plain single-identifier reference.
    pub fn simple(name: impl Into<String>) -> Self {
        Self {
            path: vec![name.into()],
            index: None,
        }
    }

    /// Key under which the resolved column is bound for evaluation.
    pub fn key(&self) -> String {
        let mut key = self.path.join(".");
        if let Some(i) = self.index {
            key.push_str(&format!("[{}]", i));
        }
        key
    }
}

impl fmt::Display for NameRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    And,
    Or,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UnaryOp::Not => "not",
            UnaryOp::Neg => "-",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        };
        write!(f, "{}", s)
    }
}

/// Parsed filter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Name(NameRef),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    /// A comparison chain: `a < b <= c` is `a < b and b <= c`.
    Compare {
        first: Box<Expr>,
        rest: Vec<(CompareOp, Expr)>,
    },
}

impl Expr {
    /// Free names referenced by the expression, in first-appearance order
    /// without duplicates.
    pub fn names(&self) -> Vec<NameRef> {
        let mut names = Vec::new();
        self.collect_names(&mut names);
        names
    }

    fn collect_names(&self, out: &mut Vec<NameRef>) {
        match self {
            Expr::Literal(_) => {}
            Expr::Name(name) => {
                if !out.contains(name) {
                    out.push(name.clone());
                }
            }
            Expr::Unary(_, operand) => operand.collect_names(out),
            Expr::Binary(_, left, right) => {
                left.collect_names(out);
                right.collect_names(out);
            }
            Expr::Compare { first, rest } => {
                first.collect_names(out);
                for (_, operand) in rest {
                    operand.collect_names(out);
                }
            }
        }
    }
}
