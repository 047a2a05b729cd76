//! Error types for the agent core.
//!
//! `AgentError` enumerates the error kinds named in the tool and session
//! design: failures that cross a tool boundary are always captured as
//! `FAILED` envelopes (see `tools::types::ToolResponse`) rather than
//! propagated as `Err` out of a turn. `AgentError` is reserved for
//! orchestrator-level and CLI-level failures.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("bad argument: {0}")]
    BadArgument(String),

    #[error("path escapes working root: {0}")]
    PathEscape(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("denied: {0}")]
    Denied(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("integrity mismatch: {0}")]
    IntegrityMismatch(String),

    #[error("tool approvals are set to readonly")]
    Readonly,

    #[error("shell command exited non-zero: {0}")]
    ShellNonZero(i32),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("cancelled")]
    Cancelled,

    #[error("corrupt session data: {0}")]
    Corrupt(String),

    #[error("ambiguous name: {0}")]
    NameAmbiguous(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, AgentError>;

impl AgentError {
    /// The error kind name, matching the vocabulary used in tool envelopes
    /// and log fields (not the `Display` message).
    pub fn kind(&self) -> &'static str {
        match self {
            AgentError::BadArgument(_) => "BadArgument",
            AgentError::PathEscape(_) => "OutOfRoot",
            AgentError::NotFound(_) => "NotFound",
            AgentError::Denied(_) => "Denied",
            AgentError::Io(_) => "IO",
            AgentError::Conflict(_) => "Conflict",
            AgentError::IntegrityMismatch(_) => "IntegrityMismatch",
            AgentError::Readonly => "Readonly",
            AgentError::ShellNonZero(_) => "ShellNonZero",
            AgentError::Transport(_) => "Transport",
            AgentError::Cancelled => "Cancelled",
            AgentError::Corrupt(_) => "Corrupt",
            AgentError::NameAmbiguous(_) => "NameAmbiguous",
            AgentError::Json(_) => "Corrupt",
            AgentError::Http(_) => "Transport",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_match_spec_vocabulary() {
        assert_eq!(AgentError::Readonly.kind(), "Readonly");
        assert_eq!(AgentError::PathEscape("x".into()).kind(), "OutOfRoot");
        assert_eq!(AgentError::ShellNonZero(2).kind(), "ShellNonZero");
    }

    #[test]
    fn io_error_converts_via_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: AgentError = io_err.into();
        assert_eq!(err.kind(), "IO");
    }

    #[test]
    fn json_error_converts_via_from() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: AgentError = json_err.into();
        assert_eq!(err.kind(), "Corrupt");
    }
}
