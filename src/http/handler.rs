//! HTTP handlers for the query API

use crate::client::{connect_client, Bindings, ConnectionInfo, Dialect, Failure, QueryClient, QueryError};
use crate::config::StudioConfig;
use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Shared server state
///
/// Holds the connection the UI last validated; the server keeps one
/// connection for all callers.
#[derive(Debug, Default)]
pub struct AppState {
    pub connection: RwLock<Option<ConnectionInfo>>,
    pub config: StudioConfig,
}

impl AppState {
    pub fn new(config: StudioConfig) -> Self {
        Self {
            connection: RwLock::new(None),
            config,
        }
    }
}

pub type SharedState = Arc<AppState>;

/// Request for executing a query
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    /// `cypher` or `gremlin`; detected from the query text when absent
    #[serde(rename = "type", default)]
    pub dialect: Option<Dialect>,
    pub dsl: String,
    #[serde(default)]
    pub bindings: Option<Bindings>,
}

/// Connect body: `{"conn": {...}}`, a bare connection object, or `{}`
/// to re-check the stored connection
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectRequest {
    Wrapped { conn: ConnectionInfo },
    Direct(ConnectionInfo),
    Stored,
}

impl<'de> Deserialize<'de> for ConnectRequest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let mut body = serde_json::Map::deserialize(deserializer)?;
        if body.is_empty() {
            return Ok(ConnectRequest::Stored);
        }
        let request = match body.remove("conn") {
            Some(conn) if body.is_empty() => ConnectRequest::Wrapped {
                conn: serde_json::from_value(conn).map_err(serde::de::Error::custom)?,
            },
            Some(_) => return Err(serde::de::Error::custom("unexpected fields next to `conn`")),
            None => ConnectRequest::Direct(
                serde_json::from_value(serde_json::Value::Object(body)).map_err(serde::de::Error::custom)?,
            ),
        };
        Ok(request)
    }
}

fn failure(status: StatusCode, failure: Failure) -> Response {
    (status, Json(failure)).into_response()
}

fn not_connected() -> Response {
    failure(
        StatusCode::UNAUTHORIZED,
        Failure {
            status: StatusCode::UNAUTHORIZED.as_u16() as i32,
            msg: "not connected".to_string(),
        },
    )
}

/// Handler for query execution
pub async fn query_handler(
    State(state): State<SharedState>,
    Json(payload): Json<QueryRequest>,
) -> Response {
    let info = match state.connection.read().await.clone() {
        Some(info) => info,
        None => return not_connected(),
    };

    let dialect = payload.dialect.unwrap_or_else(|| Dialect::detect(&payload.dsl));
    let bindings = payload.bindings.unwrap_or_default();

    let mut client = match connect_client(dialect, &info, &state.config) {
        Ok(client) => client,
        Err(e) => return failure(StatusCode::INTERNAL_SERVER_ERROR, e.into()),
    };
    let outcome = run_once(client.as_mut(), &payload.dsl, &bindings).await;
    client.close().await;

    match outcome {
        Ok(result) => Json(result).into_response(),
        Err(e) => {
            warn!("{} query failed with status {}: {}", dialect, e.status(), e);
            failure(StatusCode::INTERNAL_SERVER_ERROR, e.into())
        }
    }
}

async fn run_once(
    client: &mut dyn QueryClient,
    query: &str,
    bindings: &Bindings,
) -> Result<crate::client::QueryResult, QueryError> {
    client.open().await?;
    client.run(query, bindings).await
}

/// Handler for validating and storing a connection
pub async fn connect_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ConnectRequest>,
) -> Response {
    let info = match payload {
        ConnectRequest::Wrapped { conn } | ConnectRequest::Direct(conn) => conn,
        ConnectRequest::Stored => match state.connection.read().await.clone() {
            Some(info) => info,
            None => return not_connected(),
        },
    };

    match info.check().await {
        Ok(()) => {
            info!("Connected to {}:{}", info.host, info.port);
            *state.connection.write().await = Some(info);
            StatusCode::OK.into_response()
        }
        Err(e @ QueryError::Authentication(_)) => {
            warn!("Authentication against {}:{} failed", info.host, info.port);
            *state.connection.write().await = None;
            failure(StatusCode::UNAUTHORIZED, e.into())
        }
        Err(e) => {
            warn!("Connection check against {}:{} failed: {}", info.host, info.port, e);
            failure(StatusCode::INTERNAL_SERVER_ERROR, e.into())
        }
    }
}

/// Handler for system status
pub async fn status_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let connected = state.connection.read().await.is_some();
    Json(json!({
        "status": "healthy",
        "version": crate::VERSION,
        "connected": connected,
    }))
}
