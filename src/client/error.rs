//! Error types surfaced by query clients

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Status for failures with no structured backend response
pub const STATUS_UNCLASSIFIED: i32 = -1;
/// Status for rejected credentials or an expired session
pub const STATUS_UNAUTHORIZED: i32 = 401;
/// Status for execution failures reported by the HTTP layer
pub const STATUS_EXECUTION: i32 = 500;

/// Errors that can occur while opening a client or running a query
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    /// Backend rejected the credentials, or there is no connection to use
    #[error("{0}")]
    Authentication(String),

    /// Query failed in the backend; `status` is the backend code when it
    /// supplied one
    #[error("{msg}")]
    Execution { status: i32, msg: String },

    /// Submission did not settle within the configured window
    #[error("request timeout")]
    Timeout,

    /// Connection-level failure without a backend response
    #[error("{0}")]
    Transport(String),
}

impl QueryError {
    /// Execution failure carrying the default HTTP-level status
    pub fn execution(msg: impl Into<String>) -> Self {
        QueryError::Execution {
            status: STATUS_EXECUTION,
            msg: msg.into(),
        }
    }

    /// Numeric status reported to callers
    pub fn status(&self) -> i32 {
        match self {
            QueryError::Authentication(_) => STATUS_UNAUTHORIZED,
            QueryError::Execution { status, .. } => *status,
            QueryError::Timeout | QueryError::Transport(_) => STATUS_UNCLASSIFIED,
        }
    }

    /// Structured failure value handed to the UI
    pub fn to_failure(&self) -> Failure {
        Failure {
            status: self.status(),
            msg: self.to_string(),
        }
    }
}

/// Wire form of a failed query: `{status, msg}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Failure {
    pub status: i32,
    pub msg: String,
}

impl From<QueryError> for Failure {
    fn from(err: QueryError) -> Self {
        err.to_failure()
    }
}

pub type ClientResult<T> = Result<T, QueryError>;
