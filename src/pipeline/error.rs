// SPDX-License-Identifier: MIT

//! Typed error handling for branchline-rs
//!
//! Expression errors are split by when they can happen: syntax and unknown
//! functions are found while compiling, missing fields and type mismatches
//! only show up while evaluating against a concrete event.

use thiserror::Error;

/// Top-level error type for branchline-rs
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Conditional expression errors
    #[error("Expression error: {0}")]
    Expression(#[from] ExpressionError),

    /// Stage configuration errors
    #[error("Stage error: {0}")]
    Stage(#[from] StageError),

    /// Stage definitions that mix settings of different kinds
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    /// Generic error wrapper
    #[error("{0}")]
    Other(String),
}

/// Errors raised while translating, compiling or evaluating an expression
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExpressionError {
    /// Malformed surface or normalized text
    #[error("syntax error at position {position}: {message}")]
    Syntax { position: usize, message: String },

    /// Call to a function outside the built-in registry
    #[error("unknown function '{name}'")]
    UnknownFunction { name: String },

    /// A referenced path is absent from the event
    #[error("field '{path}' not found")]
    FieldNotFound { path: String },

    /// Operator applied to operands it does not support
    #[error("type mismatch: {message}")]
    TypeMismatch { message: String },
}

impl ExpressionError {
    pub fn syntax(position: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            position,
            message: message.into(),
        }
    }

    pub fn unknown_function(name: impl Into<String>) -> Self {
        Self::UnknownFunction { name: name.into() }
    }

    pub fn field_not_found(path: impl Into<String>) -> Self {
        Self::FieldNotFound { path: path.into() }
    }

    pub fn type_mismatch(message: impl Into<String>) -> Self {
        Self::TypeMismatch {
            message: message.into(),
        }
    }

    /// True for errors that mean the expression can never succeed
    pub fn is_compile_time(&self) -> bool {
        matches!(self, Self::Syntax { .. } | Self::UnknownFunction { .. })
    }
}

/// Field map access errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FieldError {
    #[error("path '{path}' not found")]
    PathNotFound { path: String },
}

/// Stage configuration errors
#[derive(Debug, Error)]
pub enum StageError {
    /// A `when` stage without any branch
    #[error("branch table is empty")]
    EmptyBranchTable,

    /// Branch indices must run 0, 1, 2, ... without gaps
    #[error("branch indices are not contiguous: expected {expected}, found {found}")]
    NonContiguousBranches { expected: usize, found: usize },

    /// A branch expression failed to compile
    #[error("branch {index} is invalid: {source}")]
    InvalidBranch {
        index: usize,
        #[source]
        source: ExpressionError,
    },

    /// Unknown stage kind in a definition file
    #[error("unknown stage kind: {0}")]
    UnknownKind(String),
}

impl PipelineError {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create from a generic error
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_time_classification() {
        assert!(ExpressionError::syntax(3, "unexpected ')'").is_compile_time());
        assert!(ExpressionError::unknown_function("nope").is_compile_time());
        assert!(!ExpressionError::field_not_found("a.b").is_compile_time());
        assert!(!ExpressionError::type_mismatch("x").is_compile_time());
    }

    #[test]
    fn test_error_messages() {
        let err = ExpressionError::syntax(7, "unterminated string");
        assert_eq!(err.to_string(), "syntax error at position 7: unterminated string");

        let err: PipelineError = ExpressionError::field_not_found("location.city").into();
        assert_eq!(
            err.to_string(),
            "Expression error: field 'location.city' not found"
        );

        let err = PipelineError::config("route stage 'r' takes a single `condition`");
        assert_eq!(
            err.to_string(),
            "Configuration error: route stage 'r' takes a single `condition`"
        );
    }
}
