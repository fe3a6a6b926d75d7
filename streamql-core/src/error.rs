//! Error types for streamql-core.
//!
//! Minimal error types without runtime dependencies (no tokio, no operators).

use thiserror::Error;

/// A lexer or parser failure, carrying the byte position it was raised at.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message} (at position {position})")]
pub struct SyntaxError {
    pub message: String,
    pub position: usize,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, position: usize) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}

/// Query-language error type shared by the lexer, parser and transpiler.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    #[error("Parse error: {0}")]
    ParseError(#[from] SyntaxError),

    #[error("Invalid spec: {0}")]
    InvalidSpec(String),

    #[error("Unknown operator: {0}")]
    UnknownOperator(String),

    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error("Invalid duration: {0}")]
    InvalidDuration(String),
}

pub type QueryResult<T> = Result<T, QueryError>;

impl serde::Serialize for QueryError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}
