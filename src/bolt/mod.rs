//! Bolt protocol adapter (Cypher dialect)
//!
//! A session-per-run client for Bolt 4.x servers:
//! - `packstream`: value encoding, graph structures, path hydration
//! - `message`: HELLO / RUN / PULL / GOODBYE and server summaries
//! - `connection`: handshake and chunked framing over any async stream
//! - `convert`: record values into the normalized graph and rows
//! - `client`: the [`CypherClient`] query client

pub mod client;
pub mod connection;
pub mod convert;
pub mod message;
pub mod packstream;

use crate::client::QueryError;
use thiserror::Error;

pub use client::CypherClient;
pub use connection::{BoltConnection, BoltVersion};
pub use convert::RecordConverter;
pub use message::{BoltRequest, BoltResponse};
pub use packstream::{PackStreamError, PackStreamValue};

/// Default Bolt port
pub const DEFAULT_PORT: u16 = 7687;

/// Bolt client errors
#[derive(Error, Debug)]
pub enum BoltError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PackStream error: {0}")]
    PackStream(#[from] PackStreamError),

    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// HELLO rejected with a security error
    #[error("{message}")]
    Authentication { code: String, message: String },

    /// Server FAILURE summary
    #[error("{message}")]
    Failure { code: String, message: String },

    /// Unexpected message for the current state
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

pub type BoltResult<T> = Result<T, BoltError>;

impl From<BoltError> for QueryError {
    fn from(err: BoltError) -> Self {
        match err {
            BoltError::Authentication { message, .. } => QueryError::Authentication(message),
            BoltError::Io(e) => QueryError::Transport(e.to_string()),
            other @ (BoltError::InvalidEndpoint(_) | BoltError::Handshake(_)) => {
                QueryError::Transport(other.to_string())
            }
            other => QueryError::Execution {
                status: crate::client::error::STATUS_UNCLASSIFIED,
                msg: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let auth: QueryError = BoltError::Authentication {
            code: "Neo.ClientError.Security.Unauthorized".into(),
            message: "The client is unauthorized".into(),
        }
        .into();
        assert_eq!(auth.status(), 401);

        let failure: QueryError = BoltError::Failure {
            code: "Neo.ClientError.Statement.SyntaxError".into(),
            message: "Invalid input 'X'".into(),
        }
        .into();
        assert_eq!(failure.to_failure().status, -1);
        assert_eq!(failure.to_failure().msg, "Invalid input 'X'");

        let io: QueryError =
            BoltError::Io(std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused")).into();
        assert_eq!(io, QueryError::Transport("refused".to_string()));
    }
}
