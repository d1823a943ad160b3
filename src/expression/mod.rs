// SPDX-License-Identifier: MIT

//! Conditional expressions for routing events
//!
//! Surface text goes through four steps:
//! - `translate` - surface syntax to normalized text
//! - `tokenize` - normalized text to a validated token stream
//! - `CompiledExpression::compile` - tokens to an expression tree
//! - `evaluate` - tree plus field bindings to a value
//!
//! Examples of surface expressions:
//! - `[location][city] == "Paris"`
//! - `"_grokparsefailure" not in [tags] and [way] =~ /(RECEIVE|SEND)/`
//! - `len([tags]) > 2 or [status] >= 500`

pub mod ast;
pub mod evaluator;
pub mod functions;
pub mod lexer;
pub mod parser;
pub mod token;
pub mod translator;
pub mod value;

pub use ast::{ArithmeticOp, CompareOp, Expression, Literal};
pub use evaluator::{evaluate, evaluate_bool, Bindings};
pub use lexer::tokenize;
pub use parser::{parse, CompiledExpression};
pub use token::{Token, TokenKind, TokenValue};
pub use translator::translate;
pub use value::Value;
