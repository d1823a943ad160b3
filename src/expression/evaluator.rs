// SPDX-License-Identifier: MIT

//! Expression evaluator
//!
//! Fields are resolved lazily through [`Bindings`], so the right side of a
//! short-circuited `&&` / `||` never looks up its fields.

use std::collections::HashMap;

use super::ast::{ArithmeticOp, CompareOp, Expression, Literal};
use super::value::Value;
use crate::pipeline::error::ExpressionError;
use crate::pipeline::event::Event;
use crate::pipeline::fields::{self, FieldMap};

type Result<T> = std::result::Result<T, ExpressionError>;

/// Source of field values during evaluation
pub trait Bindings {
    /// Resolve a field path; `None` when the path is absent
    fn lookup(&self, path: &str) -> Option<Value>;
}

impl Bindings for HashMap<String, Value> {
    fn lookup(&self, path: &str) -> Option<Value> {
        self.get(path).cloned()
    }
}

impl Bindings for FieldMap {
    fn lookup(&self, path: &str) -> Option<Value> {
        if path.split('.').any(|segment| segment == "*") {
            let values = fields::get_all(self, path);
            if values.is_empty() {
                return None;
            }
            return Some(Value::Sequence(values.into_iter().map(Value::from).collect()));
        }
        fields::get(self, path).ok().map(Value::from)
    }
}

impl Bindings for Event {
    fn lookup(&self, path: &str) -> Option<Value> {
        self.fields().lookup(path)
    }
}

/// Evaluate an expression to a boolean
pub fn evaluate_bool(expr: &Expression, bindings: &dyn Bindings) -> Result<bool> {
    let value = evaluate(expr, bindings)?;
    value.as_bool().ok_or_else(|| {
        ExpressionError::type_mismatch(format!(
            "expression must produce a boolean, got {}",
            value.type_name()
        ))
    })
}

/// Evaluate an expression to a value
pub fn evaluate(expr: &Expression, bindings: &dyn Bindings) -> Result<Value> {
    match expr {
        Expression::Literal(literal) => Ok(literal_value(literal)),
        Expression::Field(path) => bindings
            .lookup(path)
            .ok_or_else(|| ExpressionError::field_not_found(path.as_str())),
        Expression::Array(items) => Ok(Value::Sequence(
            items
                .iter()
                .map(|item| evaluate(item, bindings))
                .collect::<Result<_>>()?,
        )),
        Expression::Not(inner) => Ok(Value::Boolean(!boolean(inner, bindings, "!")?)),
        Expression::Negate(inner) => {
            let value = evaluate(inner, bindings)?;
            let n = value.as_number().ok_or_else(|| {
                ExpressionError::type_mismatch(format!("cannot negate {}", value.type_name()))
            })?;
            Ok(Value::Number(-n))
        }
        Expression::Arithmetic { op, left, right } => {
            let left = evaluate(left, bindings)?;
            let right = evaluate(right, bindings)?;
            arithmetic(*op, &left, &right)
        }
        Expression::Compare { op, left, right } => {
            let left = evaluate(left, bindings)?;
            let right = evaluate(right, bindings)?;
            compare(*op, &left, &right).map(Value::Boolean)
        }
        Expression::Match {
            subject,
            pattern,
            negated,
        } => {
            let subject = evaluate(subject, bindings)?;
            let text = subject.as_str().ok_or_else(|| {
                ExpressionError::type_mismatch(format!(
                    "regex match needs a string, got {}",
                    subject.type_name()
                ))
            })?;
            Ok(Value::Boolean(pattern.0.is_match(text) != *negated))
        }
        Expression::In { needle, haystack } => {
            let needle = evaluate(needle, bindings)?;
            let haystack = evaluate(haystack, bindings)?;
            contains(&haystack, &needle).map(Value::Boolean)
        }
        Expression::And(left, right) => {
            let result = boolean(left, bindings, "&&")? && boolean(right, bindings, "&&")?;
            Ok(Value::Boolean(result))
        }
        Expression::Or(left, right) => {
            let result = boolean(left, bindings, "||")? || boolean(right, bindings, "||")?;
            Ok(Value::Boolean(result))
        }
        Expression::Call { function, args } => {
            let args = args
                .iter()
                .map(|arg| argument(arg, bindings))
                .collect::<Result<Vec<_>>>()?;
            (function.call)(&args)
        }
    }
}

fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::String(s) => Value::String(s.clone()),
        Literal::Number(n) => Value::Number(*n),
        Literal::Boolean(b) => Value::Boolean(*b),
        Literal::Time(t, text) => Value::Time(*t, text.clone()),
    }
}

fn boolean(expr: &Expression, bindings: &dyn Bindings, op: &str) -> Result<bool> {
    let value = evaluate(expr, bindings)?;
    value.as_bool().ok_or_else(|| {
        ExpressionError::type_mismatch(format!(
            "'{}' needs boolean operands, got {}",
            op,
            value.type_name()
        ))
    })
}

/// Function arguments see an absent field as a missing value
fn argument(expr: &Expression, bindings: &dyn Bindings) -> Result<Value> {
    match expr {
        Expression::Field(path) => Ok(bindings.lookup(path).unwrap_or(Value::Missing)),
        other => evaluate(other, bindings),
    }
}

fn numbers(op: impl std::fmt::Display, left: &Value, right: &Value) -> Result<(f64, f64)> {
    match (left.as_number(), right.as_number()) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(ExpressionError::type_mismatch(format!(
            "'{}' needs numeric operands, got {} and {}",
            op,
            left.type_name(),
            right.type_name()
        ))),
    }
}

fn arithmetic(op: ArithmeticOp, left: &Value, right: &Value) -> Result<Value> {
    if let (ArithmeticOp::Add, Some(a), Some(b)) = (op, left.as_str(), right.as_str()) {
        return Ok(Value::String(format!("{}{}", a, b)));
    }

    let (a, b) = numbers(op, left, right)?;
    let result = match op {
        ArithmeticOp::Add => a + b,
        ArithmeticOp::Sub => a - b,
        ArithmeticOp::Mul => a * b,
        ArithmeticOp::Div | ArithmeticOp::Rem if b == 0.0 => {
            return Err(ExpressionError::type_mismatch(format!(
                "'{}' by zero",
                op
            )))
        }
        ArithmeticOp::Div => a / b,
        ArithmeticOp::Rem => a % b,
    };
    Ok(Value::Number(result))
}

fn compare(op: CompareOp, left: &Value, right: &Value) -> Result<bool> {
    let result = match op {
        CompareOp::Eq => left.loosely_equals(right),
        CompareOp::NotEq => !left.loosely_equals(right),
        CompareOp::Gt | CompareOp::Gte | CompareOp::Lt | CompareOp::Lte => {
            let (a, b) = numbers(op, left, right)?;
            match op {
                CompareOp::Gt => a > b,
                CompareOp::Gte => a >= b,
                CompareOp::Lt => a < b,
                _ => a <= b,
            }
        }
    };
    Ok(result)
}

/// Membership: element of a sequence, or substring of a string
fn contains(haystack: &Value, needle: &Value) -> Result<bool> {
    match (haystack, needle) {
        (Value::Sequence(items), _) => Ok(items.iter().any(|item| item.loosely_equals(needle))),
        _ => match (haystack.as_str(), needle.as_str()) {
            (Some(text), Some(part)) => Ok(text.contains(part)),
            _ => Err(ExpressionError::type_mismatch(format!(
            "'in' needs a sequence or two strings, got {} in {}",
                needle.type_name(),
                haystack.type_name()
            ))),
        },
    }
}
