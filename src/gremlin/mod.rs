//! Gremlin Server adapter (traversal dialect)
//!
//! Scripts are submitted over one persistent WebSocket connection using
//! GraphSON 3.0. Results are normalized by [`convert::ResultConverter`] and
//! every submission races a configurable timeout.

pub mod client;
pub mod connection;
pub mod convert;
pub mod graphson;
pub mod protocol;

use crate::client::error::STATUS_UNCLASSIFIED;
use crate::client::QueryError;
use thiserror::Error;

pub use client::GremlinClient;
pub use connection::{GremlinTransport, WsTransport};
pub use convert::ResultConverter;
pub use graphson::{GraphSon, GraphSonError};

/// Gremlin client errors
#[derive(Error, Debug)]
pub enum GremlinError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Invalid response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("GraphSON error: {0}")]
    GraphSon(#[from] GraphSonError),

    /// Error status from the server
    #[error("Server error: {message} ({code})")]
    Server {
        code: u16,
        message: String,
        stack_trace: Option<String>,
    },

    /// Server asked for credentials and none are configured
    #[error("Authentication required but no credentials configured")]
    CredentialsRequired,

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Protocol error: {0}")]
    Protocol(String),
}

pub type GremlinResult<T> = Result<T, GremlinError>;

impl From<GremlinError> for QueryError {
    fn from(err: GremlinError) -> Self {
        match err {
            GremlinError::Server { code: 401, message, .. } => QueryError::Authentication(message),
            GremlinError::Server {
                code,
                stack_trace: Some(trace),
                ..
            } => QueryError::Execution {
                status: i32::from(code),
                msg: trace,
            },
            GremlinError::Server {
                code,
                message,
                stack_trace: None,
            } => QueryError::Execution {
                status: i32::from(code),
                msg: format!("Server error: {} ({})", message, code),
            },
            err @ GremlinError::CredentialsRequired => QueryError::Authentication(err.to_string()),
            err @ (GremlinError::WebSocket(_) | GremlinError::ConnectionClosed) => {
                QueryError::Transport(err.to_string())
            }
            other => QueryError::Execution {
                status: STATUS_UNCLASSIFIED,
                msg: other.to_string(),
            },
        }
    }
}
