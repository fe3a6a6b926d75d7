//! Engine-wide error type, mirroring the taxonomy in the external interface
//! contract: parse errors, bind errors, runtime operator errors, subscriber
//! errors, and invariant violations.

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum EngineError {
    #[error("Parse error: {0}")]
    ParseError(#[from] streamql_core::QueryError),

    #[error("Unknown stream: {0}")]
    UnknownStream(String),

    #[error("Stream already exists: {0}")]
    StreamAlreadyExists(String),

    #[error("Duplicate flow: {0}")]
    DuplicateFlow(String),

    #[error("Unknown flow: {0}")]
    UnknownFlow(String),

    #[error("Invalid spec: {0}")]
    InvalidSpec(String),

    #[error("Execution error: {0}")]
    ExecutionError(String),

    #[error("Flush error: {0}")]
    FlushError(String),

    #[error("Command failed: {0}")]
    CommandFailed(String),
}

impl EngineError {
    /// The stable error code surfaced in `{success,type,result?,message,error?}`
    /// responses.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::ParseError(_) => "PARSE_ERROR",
            EngineError::UnknownStream(_) => "UNKNOWN_STREAM",
            EngineError::StreamAlreadyExists(_) => "UNKNOWN_STREAM",
            EngineError::DuplicateFlow(_) => "DUPLICATE_FLOW",
            EngineError::UnknownFlow(_) => "UNKNOWN_STREAM",
            EngineError::InvalidSpec(_) => "INVALID_SPEC",
            EngineError::ExecutionError(_) => "EXECUTION_ERROR",
            EngineError::FlushError(_) => "FLUSH_ERROR",
            EngineError::CommandFailed(_) => "COMMAND_FAILED",
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

impl serde::Serialize for EngineError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(EngineError::UnknownStream("s".into()).code(), "UNKNOWN_STREAM");
        assert_eq!(EngineError::DuplicateFlow("f".into()).code(), "DUPLICATE_FLOW");
    }
}
