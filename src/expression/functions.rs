// SPDX-License-Identifier: MIT

//! Built-in functions callable from expressions
//!
//! The set is closed: calls to any other name fail at compile time.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt;

use super::value::Value;
use crate::pipeline::error::ExpressionError;

pub type BuiltinFn = fn(&[Value]) -> Result<Value, ExpressionError>;

/// A resolved built-in function
#[derive(Clone, Copy)]
pub struct Builtin {
    pub name: &'static str,
    pub call: BuiltinFn,
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Builtin({})", self.name)
    }
}

impl PartialEq for Builtin {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

static BUILTINS: Lazy<HashMap<&'static str, Builtin>> = Lazy::new(|| {
    [
        Builtin {
            name: "len",
            call: len,
        },
        Builtin {
            name: "bool",
            call: truthy,
        },
    ]
    .into_iter()
    .map(|b| (b.name, b))
    .collect()
});

/// Look up a built-in by name
pub fn lookup(name: &str) -> Option<Builtin> {
    BUILTINS.get(name).copied()
}

/// Length of a string (in characters), sequence or map; 1 for scalars
fn len(args: &[Value]) -> Result<Value, ExpressionError> {
    let n = match args.first() {
        None => 0,
        Some(Value::String(s) | Value::Time(_, s)) => s.chars().count(),
        Some(Value::Sequence(items)) => items.len(),
        Some(Value::Map(map)) => map.len(),
        Some(_) => 1,
    };
    Ok(Value::Number(n as f64))
}

/// Booleans pass through, missing values are false, anything else is true
fn truthy(args: &[Value]) -> Result<Value, ExpressionError> {
    let b = match args.first() {
        None | Some(Value::Missing) => false,
        Some(Value::Boolean(b)) => *b,
        Some(_) => true,
    };
    Ok(Value::Boolean(b))
}
