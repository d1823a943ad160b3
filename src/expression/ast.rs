// SPDX-License-Identifier: MIT

//! Compiled expression tree

use chrono::{DateTime, Utc};
use regex::Regex;
use std::fmt;

use super::functions::Builtin;

/// A node of a compiled expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Literal operand
    Literal(Literal),
    /// Field reference, resolved at evaluation time
    Field(String),
    /// Explicit operand list
    Array(Vec<Expression>),
    /// Logical NOT
    Not(Box<Expression>),
    /// Arithmetic negation
    Negate(Box<Expression>),
    /// Arithmetic: left op right
    Arithmetic {
        op: ArithmeticOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    /// Comparison: left op right
    Compare {
        op: CompareOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    /// Regex match: `=~`, or `!~` when negated
    Match {
        subject: Box<Expression>,
        pattern: Pattern,
        negated: bool,
    },
    /// Membership: needle in haystack
    In {
        needle: Box<Expression>,
        haystack: Box<Expression>,
    },
    /// Logical AND
    And(Box<Expression>, Box<Expression>),
    /// Logical OR
    Or(Box<Expression>, Box<Expression>),
    /// Built-in function call
    Call { function: Builtin, args: Vec<Expression> },
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CompareOp {
    /// ==
    Eq,
    /// !=
    NotEq,
    /// >
    Gt,
    /// >=
    Gte,
    /// <
    Lt,
    /// <=
    Lte,
}

/// Arithmetic operators
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArithmeticOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

/// Literal values in expressions
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Number(f64),
    Boolean(bool),
    /// Parsed instant and the quoted text
    Time(DateTime<Utc>, String),
}

/// Regex compiled once when the expression is compiled
#[derive(Debug, Clone)]
pub struct Pattern(pub Regex);

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_str() == other.0.as_str()
    }
}

impl Expression {
    /// Collect every distinct field path referenced by this expression
    pub fn variables(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_variables(&mut out);
        out
    }

    fn collect_variables(&self, out: &mut Vec<String>) {
        match self {
            Expression::Field(path) => {
                if !out.contains(path) {
                    out.push(path.clone());
                }
            }
            Expression::Literal(_) => {}
            Expression::Array(items) | Expression::Call { args: items, .. } => {
                for item in items {
                    item.collect_variables(out);
                }
            }
            Expression::Not(inner) | Expression::Negate(inner) => inner.collect_variables(out),
            Expression::Match { subject, .. } => subject.collect_variables(out),
            Expression::Arithmetic { left, right, .. }
            | Expression::Compare { left, right, .. }
            | Expression::In {
                needle: left,
                haystack: right,
            }
            | Expression::And(left, right)
            | Expression::Or(left, right) => {
                left.collect_variables(out);
                right.collect_variables(out);
            }
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompareOp::Eq => write!(f, "=="),
            CompareOp::NotEq => write!(f, "!="),
            CompareOp::Gt => write!(f, ">"),
            CompareOp::Gte => write!(f, ">="),
            CompareOp::Lt => write!(f, "<"),
            CompareOp::Lte => write!(f, "<="),
        }
    }
}

impl fmt::Display for ArithmeticOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArithmeticOp::Add => write!(f, "+"),
            ArithmeticOp::Sub => write!(f, "-"),
            ArithmeticOp::Mul => write!(f, "*"),
            ArithmeticOp::Div => write!(f, "/"),
            ArithmeticOp::Rem => write!(f, "%"),
        }
    }
}
