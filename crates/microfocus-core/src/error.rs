use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Failure modes of engine operations
#[derive(Debug, Error)]
pub enum EngineError {
    /// Referenced task, template or context does not exist
    #[error("{0} not found")]
    NotFound(String),
    /// Timer operation without an active session
    #[error("no active focus session; start a task first")]
    NoActiveSession,
    /// Gate decision that cannot be attributed to a context
    #[error("missing context id for gate decision")]
    MissingContext,
    /// Store read or write failed
    #[error("persistence failure: {0:#}")]
    PersistenceFailure(#[source] anyhow::Error),
}

impl EngineError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::NoActiveSession => ErrorKind::NoActiveSession,
            Self::MissingContext => ErrorKind::MissingContext,
            Self::PersistenceFailure(_) => ErrorKind::PersistenceFailure,
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Stable error classification surfaced to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    NoActiveSession,
    MissingContext,
    PersistenceFailure,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::NoActiveSession => "no_active_session",
            Self::MissingContext => "missing_context",
            Self::PersistenceFailure => "persistence_failure",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured failure handed to UI surfaces
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&EngineError> for Failure {
    fn from(err: &EngineError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}
