//! Value operations
//!
//! Arithmetic, comparison and logic over [`Value`]s with C-like numeric
//! promotion. `Null` operands propagate through arithmetic and comparisons.

#![allow(clippy::cast_precision_loss, clippy::cast_possible_wrap)]

use std::cmp::Ordering;

use crate::error::operation_error;
use crate::value::{is_truthy, Value};
use crate::Result;

/// Binary arithmetic operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Rem,
}

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

enum Numeric {
    Signed(i64, i64),
    Unsigned(u64, u64),
    Floating(f64, f64),
}

fn numeric_pair(a: &Value, b: &Value) -> Option<Numeric> {
    if !a.is_numeric() || !b.is_numeric() {
        return None;
    }
    if matches!(a, Value::Float(_)) || matches!(b, Value::Float(_)) {
        return Some(Numeric::Floating(a.as_f64()?, b.as_f64()?));
    }
    let unsigned_like = |v: &Value| matches!(v, Value::UInt(_) | Value::Bool(_));
    if unsigned_like(a) && unsigned_like(b) && (matches!(a, Value::UInt(_)) || matches!(b, Value::UInt(_))) {
        return Some(Numeric::Unsigned(a.as_u64()?, b.as_u64()?));
    }
    Some(Numeric::Signed(a.as_i64()?, b.as_i64()?))
}

/// Apply an arithmetic operator
pub fn arith(op: ArithOp, a: &Value, b: &Value) -> Result<Value> {
    if a.is_null() || b.is_null() {
        return Ok(Value::Null);
    }
    let pair = numeric_pair(a, b).ok_or_else(|| {
        operation_error(format!(
            "cannot apply {:?} to {} and {}",
            op,
            a.type_name(),
            b.type_name()
        ))
    })?;
    match pair {
        Numeric::Floating(x, y) => Ok(Value::Float(match op {
            ArithOp::Add => x + y,
            ArithOp::Sub => x - y,
            ArithOp::Mul => x * y,
            ArithOp::Div => x / y,
            ArithOp::Rem => return Err(operation_error("'%' requires integer operands")),
        })),
        Numeric::Signed(x, y) => {
            let value = match op {
                ArithOp::Add => x.wrapping_add(y),
                ArithOp::Sub => x.wrapping_sub(y),
                ArithOp::Mul => x.wrapping_mul(y),
                ArithOp::Div | ArithOp::Rem if y == 0 => {
                    return Err(operation_error("Division by zero"))
                }
                ArithOp::Div => x.wrapping_div(y),
                ArithOp::Rem => x.wrapping_rem(y),
            };
            Ok(Value::Int(value))
        }
        Numeric::Unsigned(x, y) => {
            let value = match op {
                ArithOp::Add => x.wrapping_add(y),
                ArithOp::Sub => x.wrapping_sub(y),
                ArithOp::Mul => x.wrapping_mul(y),
                ArithOp::Div | ArithOp::Rem if y == 0 => {
                    return Err(operation_error("Division by zero"))
                }
                ArithOp::Div => x / y,
                ArithOp::Rem => x % y,
            };
            Ok(Value::UInt(value))
        }
    }
}

/// Compare two values for ordering
pub fn compare_values(a: &Value, b: &Value) -> Result<Ordering> {
    match (a, b) {
        (Value::String(x), Value::String(y)) => Ok(x.cmp(y)),
        _ => match numeric_pair(a, b) {
            Some(Numeric::Floating(x, y)) => x
                .partial_cmp(&y)
                .ok_or_else(|| operation_error("Cannot compare NaN values")),
            Some(Numeric::Signed(x, y)) => Ok(x.cmp(&y)),
            Some(Numeric::Unsigned(x, y)) => Ok(x.cmp(&y)),
            None => Err(operation_error(format!(
                "Cannot compare values of types {} and {}",
                a.type_name(),
                b.type_name()
            ))),
        },
    }
}

/// Apply a comparison operator
///
/// Comparisons involving `Null` yield `Null`. Comparisons involving NaN are
/// false except `!=`.
pub fn compare(op: CmpOp, a: &Value, b: &Value) -> Result<Value> {
    if a.is_null() || b.is_null() {
        return Ok(Value::Null);
    }
    let ordering = match compare_values(a, b) {
        Ok(ordering) => ordering,
        Err(_) if a.as_f64().is_some_and(f64::is_nan) || b.as_f64().is_some_and(f64::is_nan) => {
            return Ok(Value::Bool(op == CmpOp::Ne));
        }
        Err(e) => return Err(e),
    };
    let result = match op {
        CmpOp::Eq => ordering == Ordering::Equal,
        CmpOp::Ne => ordering != Ordering::Equal,
        CmpOp::Lt => ordering == Ordering::Less,
        CmpOp::Le => ordering != Ordering::Greater,
        CmpOp::Gt => ordering == Ordering::Greater,
        CmpOp::Ge => ordering != Ordering::Less,
    };
    Ok(Value::Bool(result))
}

/// Arithmetic negation
pub fn negate(value: &Value) -> Result<Value> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::Bool(b) => Ok(Value::Int(-i64::from(*b))),
        Value::Int(i) => Ok(Value::Int(i.wrapping_neg())),
        Value::UInt(u) => Ok(Value::UInt(u.wrapping_neg())),
        Value::Float(f) => Ok(Value::Float(-f)),
        Value::String(_) => Err(operation_error("Cannot negate string")),
    }
}

/// Logical negation
pub fn not(value: &Value) -> Value {
    Value::Bool(!is_truthy(value))
}
