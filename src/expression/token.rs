// SPDX-License-Identifier: MIT

//! Token kinds and the lexer transition table

use chrono::{DateTime, Utc};
use regex::Regex;
use std::fmt;

/// Kind of a lexed token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// `(`
    Clause,
    /// `)`
    ClauseClose,
    Numeric,
    Boolean,
    String,
    /// Quoted string holding a date or timestamp
    Time,
    /// Regex literal on the right of `=~` / `!~`
    Pattern,
    /// Parenthesized, comma-separated operand list
    Array,
    /// Field reference, `[a.b]` or a bare name
    Variable,
    /// Name of a built-in function, directly followed by `(`
    Function,
    /// `,` between function arguments
    Separator,
    /// `+ - * / %`
    Modifier,
    /// `== != < > <= >= =~ !~ in`
    Comparator,
    /// `&& ||`
    LogicalOp,
    /// Unary `!` and `-`
    Prefix,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::Clause => "CLAUSE",
            TokenKind::ClauseClose => "CLAUSE_CLOSE",
            TokenKind::Numeric => "NUMERIC",
            TokenKind::Boolean => "BOOLEAN",
            TokenKind::String => "STRING",
            TokenKind::Time => "TIME",
            TokenKind::Pattern => "PATTERN",
            TokenKind::Array => "ARRAY",
            TokenKind::Variable => "VARIABLE",
            TokenKind::Function => "FUNCTION",
            TokenKind::Separator => "SEPARATOR",
            TokenKind::Modifier => "MODIFIER",
            TokenKind::Comparator => "COMPARATOR",
            TokenKind::LogicalOp => "LOGICALOP",
            TokenKind::Prefix => "PREFIX",
        };
        write!(f, "{}", name)
    }
}

/// Parsed payload of a token
#[derive(Debug, Clone)]
pub enum TokenValue {
    None,
    Number(f64),
    Boolean(bool),
    /// Strings, variable paths, function names and operator symbols
    Text(String),
    /// Parsed instant and the literal text
    Time(DateTime<Utc>, String),
    Pattern(Regex),
    Array(Vec<Token>),
}

impl PartialEq for TokenValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TokenValue::None, TokenValue::None) => true,
            (TokenValue::Number(a), TokenValue::Number(b)) => a == b,
            (TokenValue::Boolean(a), TokenValue::Boolean(b)) => a == b,
            (TokenValue::Text(a), TokenValue::Text(b)) => a == b,
            (TokenValue::Time(a, x), TokenValue::Time(b, y)) => a == b && x == y,
            (TokenValue::Pattern(a), TokenValue::Pattern(b)) => a.as_str() == b.as_str(),
            (TokenValue::Array(a), TokenValue::Array(b)) => a == b,
            _ => false,
        }
    }
}

/// A lexed token
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: TokenValue,
    /// Byte offset in the normalized expression
    pub position: usize,
}

impl Token {
    pub fn new(kind: TokenKind, value: TokenValue, position: usize) -> Self {
        Self {
            kind,
            value,
            position,
        }
    }

    /// Textual payload, for symbols, strings, variables and functions
    pub fn text(&self) -> Option<&str> {
        match &self.value {
            TokenValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            TokenValue::None => write!(f, "{}", self.kind),
            TokenValue::Number(n) => write!(f, "{} {}", self.kind, n),
            TokenValue::Boolean(b) => write!(f, "{} {}", self.kind, b),
            TokenValue::Text(s) => write!(f, "{} {}", self.kind, s),
            TokenValue::Time(_, text) => write!(f, "{} '{}'", self.kind, text),
            TokenValue::Pattern(re) => write!(f, "{} /{}/", self.kind, re.as_str()),
            TokenValue::Array(items) => {
                let parts: Vec<String> = items.iter().map(|t| t.to_string()).collect();
                write!(f, "{} [{}]", self.kind, parts.join(", "))
            }
        }
    }
}

/// One row of the transition table
#[derive(Debug)]
pub struct LexerState {
    /// `None` is the virtual start state
    pub kind: Option<TokenKind>,
    /// Whether an expression may end after this token
    pub can_end: bool,
    pub valid_next: &'static [TokenKind],
}

impl LexerState {
    pub fn can_transition_to(&self, kind: TokenKind) -> bool {
        self.valid_next.contains(&kind)
    }
}

mod table {
    use super::TokenKind::*;
    use super::{LexerState, TokenKind};

    const OPERAND_CONTINUATIONS: &[TokenKind] =
        &[Modifier, Comparator, LogicalOp, ClauseClose, Separator];

    pub(super) static LEXER_STATES: [LexerState; 16] = [
        LexerState {
            kind: None,
            can_end: false,
            valid_next: &[Prefix, Numeric, Boolean, String, Time, Variable, Function, Clause],
        },
        LexerState {
            kind: Some(Clause),
            can_end: false,
            valid_next: &[
                Prefix, Numeric, Boolean, String, Time, Variable, Function, Clause, Array, ClauseClose,
            ],
        },
        LexerState {
            kind: Some(ClauseClose),
            can_end: true,
            valid_next: &[Comparator, Modifier, LogicalOp, ClauseClose, Separator],
        },
        LexerState {
            kind: Some(Numeric),
            can_end: true,
            valid_next: OPERAND_CONTINUATIONS,
        },
        LexerState {
            kind: Some(Boolean),
            can_end: true,
            valid_next: OPERAND_CONTINUATIONS,
        },
        LexerState {
            kind: Some(String),
            can_end: true,
            valid_next: OPERAND_CONTINUATIONS,
        },
        LexerState {
            kind: Some(Time),
            can_end: true,
            valid_next: OPERAND_CONTINUATIONS,
        },
        LexerState {
            kind: Some(Variable),
            can_end: true,
            valid_next: OPERAND_CONTINUATIONS,
        },
        LexerState {
            kind: Some(Pattern),
            can_end: true,
            valid_next: &[LogicalOp, ClauseClose, Separator],
        },
        LexerState {
            kind: Some(Array),
            can_end: true,
            valid_next: &[LogicalOp, ClauseClose, Separator],
        },
        LexerState {
            kind: Some(Function),
            can_end: false,
            valid_next: &[Clause],
        },
        LexerState {
            kind: Some(Separator),
            can_end: false,
            valid_next: &[Prefix, Numeric, Boolean, String, Time, Variable, Function, Clause, Array],
        },
        LexerState {
            kind: Some(Modifier),
            can_end: false,
            valid_next: &[Prefix, Numeric, String, Variable, Function, Clause],
        },
        LexerState {
            kind: Some(Comparator),
            can_end: false,
            valid_next: &[
                Prefix, Numeric, Boolean, String, Time, Variable, Function, Clause, Array, Pattern,
            ],
        },
        LexerState {
            kind: Some(LogicalOp),
            can_end: false,
            valid_next: &[Prefix, Numeric, Boolean, String, Time, Variable, Function, Clause],
        },
        LexerState {
            kind: Some(Prefix),
            can_end: false,
            valid_next: &[Prefix, Numeric, Boolean, Variable, Function, Clause],
        },
    ];
}

/// Look up the state for the last emitted token kind (`None` = start)
pub fn lexer_state(kind: Option<TokenKind>) -> &'static LexerState {
    table::LEXER_STATES
        .iter()
        .find(|state| state.kind == kind)
        .unwrap_or(&table::LEXER_STATES[0])
}
