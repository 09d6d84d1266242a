//! Vectorised evaluation of filter expressions over resolved columns.
//!
//! Evaluation happens after every free name of the expression has been
//! resolved into a column, so the evaluator only ever sees an
//! [`Environment`] of materialized data.
//!
//! Numeric comparisons follow the element types involved: integer operands
//! compare exactly, a float32 column compared with a literal or another
//! float32 column compares in float32, and everything else compares in
//! float64. Arithmetic is evaluated in float64.

use std::collections::HashMap;
use std::sync::Arc;

use gedi_common::{ColumnData, DType};

use crate::ast::{BinaryOp, CompareOp, Expr, Literal, NameRef, UnaryOp};
use crate::error::{ExprError, Result};

/// Source of column data for the names in an expression.
pub trait Environment {
    fn lookup(&self, name: &NameRef) -> Option<Arc<ColumnData>>;
}

impl Environment for HashMap<String, Arc<ColumnData>> {
    fn lookup(&self, name: &NameRef) -> Option<Arc<ColumnData>> {
        self.get(&name.key()).cloned()
    }
}

impl Environment for HashMap<String, ColumnData> {
    fn lookup(&self, name: &NameRef) -> Option<Arc<ColumnData>> {
        self.get(&name.key()).map(|data| Arc::new(data.clone()))
    }
}

/// Outcome of evaluating a filter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// The expression does not depend on any column.
    Constant(bool),
    /// One flag per row.
    Mask(Vec<bool>),
}

impl Predicate {
    /// Row mask for a table of `len` rows.
    pub fn to_mask(&self, len: usize) -> Vec<bool> {
        match self {
            Predicate::Constant(b) => vec![*b; len],
            Predicate::Mask(mask) => mask.clone(),
        }
    }

    /// Number of selected rows in a table of `len` rows.
    pub fn count(&self, len: usize) -> usize {
        match self {
            Predicate::Constant(true) => len,
            Predicate::Constant(false) => 0,
            Predicate::Mask(mask) => mask.iter().filter(|&&b| b).count(),
        }
    }
}

/// Evaluate a parsed expression against an environment.
pub fn evaluate<E: Environment + ?Sized>(expr: &Expr, env: &E) -> Result<Predicate> {
    match eval(expr, env)? {
        Value::Scalar(Literal::Bool(b)) => Ok(Predicate::Constant(b)),
        Value::Array(data) => match data.as_ref() {
            ColumnData::Bool(mask) => Ok(Predicate::Mask(mask.clone())),
            other => Err(ExprError::NotBoolean(other.dtype().to_string())),
        },
        Value::Scalar(other) => Err(ExprError::NotBoolean(format!("literal {}", other))),
    }
}

#[derive(Debug, Clone)]
enum Value {
    Scalar(Literal),
    Array(Arc<ColumnData>),
}

impl Value {
    fn describe(&self) -> String {
        match self {
            Value::Scalar(Literal::Int(_)) => "int literal".to_string(),
            Value::Scalar(Literal::Float(_)) => "float literal".to_string(),
            Value::Scalar(Literal::Bool(_)) => "bool literal".to_string(),
            Value::Scalar(Literal::Str(_)) => "string literal".to_string(),
            Value::Array(data) => format!("{} column", data.dtype()),
        }
    }

    fn len(&self) -> Option<usize> {
        match self {
            Value::Scalar(_) => None,
            Value::Array(data) => Some(data.len()),
        }
    }

    fn is_literal(&self) -> bool {
        matches!(self, Value::Scalar(_))
    }

    fn num_kind(&self) -> Option<NumKind> {
        match self {
            Value::Scalar(Literal::Int(_)) | Value::Scalar(Literal::Bool(_)) => {
                Some(NumKind::Integer)
            }
            Value::Scalar(Literal::Float(_)) => Some(NumKind::Float64),
            Value::Scalar(Literal::Str(_)) => None,
            Value::Array(data) => match data.dtype() {
                DType::Float32 => Some(NumKind::Float32),
                DType::Float64 => Some(NumKind::Float64),
                DType::Utf8 | DType::List => None,
                _ => Some(NumKind::Integer),
            },
        }
    }

    fn is_bool(&self) -> bool {
        match self {
            Value::Scalar(Literal::Bool(_)) => true,
            Value::Array(data) => data.dtype() == DType::Bool,
            _ => false,
        }
    }

    fn is_str(&self) -> bool {
        match self {
            Value::Scalar(Literal::Str(_)) => true,
            Value::Array(data) => data.dtype() == DType::Utf8,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NumKind {
    Integer,
    Float32,
    Float64,
}

fn eval<E: Environment + ?Sized>(expr: &Expr, env: &E) -> Result<Value> {
    match expr {
        Expr::Literal(lit) => Ok(Value::Scalar(lit.clone())),
        Expr::Name(name) => env
            .lookup(name)
            .map(Value::Array)
            .ok_or_else(|| ExprError::UndefinedName(name.key())),
        Expr::Unary(op, operand) => unary(*op, eval(operand, env)?),
        Expr::Binary(op, left, right) => binary(*op, eval(left, env)?, eval(right, env)?),
        Expr::Compare { first, rest } => {
            let mut left = eval(first, env)?;
            let mut result: Option<Value> = None;
            for (op, operand) in rest {
                let right = eval(operand, env)?;
                let step = compare(*op, &left, &right)?;
                result = Some(match result {
                    None => step,
                    Some(acc) => binary(BinaryOp::And, acc, step)?,
                });
                left = right;
            }
            result.ok_or_else(|| ExprError::Parse {
                expr: format!("{:?}", expr),
                message: "comparison without operands".to_string(),
            })
        }
    }
}

/// Common length of two operands, or `None` when both are scalars.
fn broadcast_len(left: &Value, right: &Value) -> Result<Option<usize>> {
    match (left.len(), right.len()) {
        (Some(l), Some(r)) if l != r => Err(ExprError::LengthMismatch { left: l, right: r }),
        (Some(l), _) => Ok(Some(l)),
        (None, r) => Ok(r),
    }
}

fn type_error(op: impl ToString, left: &Value, right: &Value) -> ExprError {
    ExprError::Type {
        op: op.to_string(),
        left: left.describe(),
        right: right.describe(),
    }
}

fn bool_values(value: &Value, len: usize) -> Option<Vec<bool>> {
    match value {
        Value::Scalar(Literal::Bool(b)) => Some(vec![*b; len]),
        Value::Array(data) => match data.as_ref() {
            ColumnData::Bool(v) => Some(v.clone()),
            _ => None,
        },
        _ => None,
    }
}

fn str_values(value: &Value, len: usize) -> Option<Vec<String>> {
    match value {
        Value::Scalar(Literal::Str(s)) => Some(vec![s.clone(); len]),
        Value::Array(data) => match data.as_ref() {
            ColumnData::Utf8(v) => Some(v.clone()),
            _ => None,
        },
        _ => None,
    }
}

fn i128_values(value: &Value, len: usize) -> Option<Vec<i128>> {
    match value {
        Value::Scalar(Literal::Int(v)) => Some(vec![*v as i128; len]),
        Value::Scalar(Literal::Bool(b)) => Some(vec![*b as i128; len]),
        Value::Array(data) => Some(match data.as_ref() {
            ColumnData::Int8(v) => v.iter().map(|&x| x as i128).collect(),
            ColumnData::Int16(v) => v.iter().map(|&x| x as i128).collect(),
            ColumnData::Int32(v) => v.iter().map(|&x| x as i128).collect(),
            ColumnData::Int64(v) => v.iter().map(|&x| x as i128).collect(),
            ColumnData::UInt8(v) => v.iter().map(|&x| x as i128).collect(),
            ColumnData::UInt16(v) => v.iter().map(|&x| x as i128).collect(),
            ColumnData::UInt32(v) => v.iter().map(|&x| x as i128).collect(),
            ColumnData::UInt64(v) => v.iter().map(|&x| x as i128).collect(),
            ColumnData::Bool(v) => v.iter().map(|&x| x as i128).collect(),
            _ => return None,
        }),
        _ => None,
    }
}

fn f64_values(value: &Value, len: usize) -> Option<Vec<f64>> {
    match value {
        Value::Scalar(Literal::Int(v)) => Some(vec![*v as f64; len]),
        Value::Scalar(Literal::Float(v)) => Some(vec![*v; len]),
        Value::Scalar(Literal::Bool(b)) => Some(vec![if *b { 1.0 } else { 0.0 }; len]),
        Value::Array(data) => match data.as_ref() {
            ColumnData::Bool(v) => Some(v.iter().map(|&b| if b { 1.0 } else { 0.0 }).collect()),
            other => other.to_f64_vec(),
        },
        _ => None,
    }
}

fn f32_values(value: &Value, len: usize) -> Option<Vec<f32>> {
    match value {
        Value::Array(data) => match data.as_ref() {
            ColumnData::Float32(v) => Some(v.clone()),
            _ => None,
        },
        scalar => f64_values(scalar, len).map(|v| v.into_iter().map(|x| x as f32).collect()),
    }
}

fn compare_vecs<T: PartialOrd>(op: CompareOp, left: &[T], right: &[T]) -> Vec<bool> {
    left.iter()
        .zip(right)
        .map(|(l, r)| match op {
            CompareOp::Eq => l == r,
            CompareOp::Ne => l != r,
            CompareOp::Lt => l < r,
            CompareOp::Le => l <= r,
            CompareOp::Gt => l > r,
            CompareOp::Ge => l >= r,
        })
        .collect()
}

/// Wrap a result vector, collapsing to a scalar when both inputs were scalars.
fn bool_result(len: Option<usize>, values: Vec<bool>) -> Value {
    match len {
        Some(_) => Value::Array(Arc::new(ColumnData::Bool(values))),
        None => Value::Scalar(Literal::Bool(values.first().copied().unwrap_or(false))),
    }
}

fn compare(op: CompareOp, left: &Value, right: &Value) -> Result<Value> {
    let len = broadcast_len(left, right)?;
    let n = len.unwrap_or(1);

    if left.is_str() || right.is_str() {
        return match (str_values(left, n), str_values(right, n)) {
            (Some(l), Some(r)) => Ok(bool_result(len, compare_vecs(op, &l, &r))),
            _ => Err(type_error(op, left, right)),
        };
    }

    let (Some(lk), Some(rk)) = (left.num_kind(), right.num_kind()) else {
        return Err(type_error(op, left, right));
    };

    let use_f32 = (lk == NumKind::Float32 && (rk == NumKind::Float32 || right.is_literal()))
        || (rk == NumKind::Float32 && left.is_literal());

    let values = if lk == NumKind::Integer && rk == NumKind::Integer {
        let (l, r) = (i128_values(left, n), i128_values(right, n));
        l.zip(r).map(|(l, r)| compare_vecs(op, &l, &r))
    } else if use_f32 {
        let (l, r) = (f32_values(left, n), f32_values(right, n));
        l.zip(r).map(|(l, r)| compare_vecs(op, &l, &r))
    } else {
        let (l, r) = (f64_values(left, n), f64_values(right, n));
        l.zip(r).map(|(l, r)| compare_vecs(op, &l, &r))
    };

    values
        .map(|v| bool_result(len, v))
        .ok_or_else(|| type_error(op, left, right))
}

fn unary(op: UnaryOp, operand: Value) -> Result<Value> {
    match op {
        UnaryOp::Not => match &operand {
            Value::Scalar(Literal::Bool(b)) => Ok(Value::Scalar(Literal::Bool(!b))),
            Value::Array(data) => match data.as_ref() {
                ColumnData::Bool(v) => Ok(Value::Array(Arc::new(ColumnData::Bool(
                    v.iter().map(|b| !b).collect(),
                )))),
                _ => Err(type_error(op, &operand, &operand)),
            },
            _ => Err(type_error(op, &operand, &operand)),
        },
        UnaryOp::Neg => match &operand {
            Value::Scalar(Literal::Int(v)) => Ok(Value::Scalar(Literal::Int(-v))),
            Value::Scalar(Literal::Float(v)) => Ok(Value::Scalar(Literal::Float(-v))),
            Value::Array(data) if operand.num_kind().is_some() && !operand.is_bool() => {
                let values = data
                    .to_f64_vec()
                    .ok_or_else(|| type_error(op, &operand, &operand))?;
                Ok(Value::Array(Arc::new(ColumnData::Float64(
                    values.into_iter().map(|x| -x).collect(),
                ))))
            }
            _ => Err(type_error(op, &operand, &operand)),
        },
    }
}

fn binary(op: BinaryOp, left: Value, right: Value) -> Result<Value> {
    match op {
        BinaryOp::And | BinaryOp::Or => logical(op, &left, &right),
        _ => arithmetic(op, &left, &right),
    }
}

fn logical(op: BinaryOp, left: &Value, right: &Value) -> Result<Value> {
    if !left.is_bool() || !right.is_bool() {
        return Err(type_error(op, left, right));
    }
    let len = broadcast_len(left, right)?;
    let n = len.unwrap_or(1);
    let (Some(l), Some(r)) = (bool_values(left, n), bool_values(right, n)) else {
        return Err(type_error(op, left, right));
    };
    let values = l
        .iter()
        .zip(&r)
        .map(|(&a, &b)| if op == BinaryOp::And { a && b } else { a || b })
        .collect();
    Ok(bool_result(len, values))
}

fn arithmetic(op: BinaryOp, left: &Value, right: &Value) -> Result<Value> {
    if left.is_str() || right.is_str() || left.is_bool() || right.is_bool() {
        return Err(type_error(op, left, right));
    }

    if let (Value::Scalar(Literal::Int(a)), Value::Scalar(Literal::Int(b))) = (left, right) {
        let exact = match op {
            BinaryOp::Add => a.checked_add(*b),
            BinaryOp::Sub => a.checked_sub(*b),
            BinaryOp::Mul => a.checked_mul(*b),
            BinaryOp::Mod if *b != 0 => {
                let r = a.rem_euclid(*b);
                Some(if *b < 0 && r != 0 { r + b } else { r })
            }
            _ => None,
        };
        if let Some(v) = exact {
            return Ok(Value::Scalar(Literal::Int(v)));
        }
    }

    let len = broadcast_len(left, right)?;
    let n = len.unwrap_or(1);
    let (Some(l), Some(r)) = (f64_values(left, n), f64_values(right, n)) else {
        return Err(type_error(op, left, right));
    };

    let values: Vec<f64> = l
        .iter()
        .zip(&r)
        .map(|(&a, &b)| match op {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => a / b,
            _ => a - b * (a / b).floor(),
        })
        .collect();

    Ok(match len {
        Some(_) => Value::Array(Arc::new(ColumnData::Float64(values))),
        None => Value::Scalar(Literal::Float(values.first().copied().unwrap_or(f64::NAN))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::tokens::TokenTable;

    fn beam0000() -> HashMap<String, ColumnData> {
        let mut env = HashMap::new();
        env.insert(
            "sensitivity".to_string(),
            ColumnData::Float32(vec![0.9, 0.97, 0.99]),
        );
        env.insert(
            "agbd".to_string(),
            ColumnData::Float32(vec![1.271942, 1.3311168, 1.1160929]),
        );
        env.insert(
            "l2_quality_flag".to_string(),
            ColumnData::Int8(vec![0, 1, 1]),
        );
        env.insert(
            "l4_quality_flag".to_string(),
            ColumnData::Int8(vec![1, 0, 1]),
        );
        env.insert(
            "shot_number".to_string(),
            ColumnData::UInt64(vec![9007199254740993, 9007199254740992, 0]),
        );
        env.insert(
            "name".to_string(),
            ColumnData::Utf8(vec!["a".into(), "b".into(), "c".into()]),
        );
        env
    }

    fn run(expr: &str) -> Result<Predicate> {
        let tokens = TokenTable::new();
        evaluate(&parse(expr, &tokens)?, &beam0000())
    }

    #[test]
    fn test_float32_comparison_against_literal() {
        assert_eq!(
            run("sensitivity < 0.9").unwrap(),
            Predicate::Mask(vec![false, false, false])
        );
        assert_eq!(
            run("sensitivity >= 0.9").unwrap(),
            Predicate::Mask(vec![true, true, true])
        );
    }

    #[test]
    fn test_logical_combinations() {
        assert_eq!(
            run("sensitivity > 0.95 and l4_quality_flag == 1").unwrap(),
            Predicate::Mask(vec![false, false, true])
        );
        assert_eq!(
            run("l2_quality_flag == 1 & sensitivity > 0.9").unwrap(),
            Predicate::Mask(vec![false, true, true])
        );
        assert_eq!(
            run("not (l2_quality_flag == 1) | agbd > 1.3").unwrap(),
            Predicate::Mask(vec![true, true, false])
        );
    }

    #[test]
    fn test_large_integers_compare_exactly() {
        // 2^53 + 1 is not representable as f64.
        assert_eq!(
            run("shot_number == 9007199254740993").unwrap(),
            Predicate::Mask(vec![true, false, false])
        );
    }

    #[test]
    fn test_string_comparison() {
        assert_eq!(
            run("name != 'b'").unwrap(),
            Predicate::Mask(vec![true, false, true])
        );
        assert!(matches!(
            run("name > 1"),
            Err(ExprError::Type { .. })
        ));
    }

    #[test]
    fn test_arithmetic_and_chains() {
        assert_eq!(
            run("agbd * 2 > 2.6").unwrap(),
            Predicate::Mask(vec![false, true, false])
        );
        assert_eq!(
            run("0 < l2_quality_flag <= 1").unwrap(),
            Predicate::Mask(vec![false, true, true])
        );
        assert_eq!(run("1 + 1 == 2").unwrap(), Predicate::Constant(true));
        assert_eq!(run("7 % 3 == 1").unwrap(), Predicate::Constant(true));
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            run("missing > 1"),
            Err(ExprError::UndefinedName(name)) if name == "missing"
        ));
        assert!(matches!(run("agbd + 1"), Err(ExprError::NotBoolean(_))));
        assert!(matches!(
            run("agbd and sensitivity"),
            Err(ExprError::Type { .. })
        ));
    }

    #[test]
    fn test_predicate_helpers() {
        let p = Predicate::Mask(vec![true, false, true]);
        assert_eq!(p.count(3), 2);
        assert_eq!(Predicate::Constant(true).to_mask(2), vec![true, true]);
        assert_eq!(Predicate::Constant(false).count(5), 0);
    }
}
