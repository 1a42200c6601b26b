//! HTTP server for the query API

use super::handler::{connect_handler, query_handler, status_handler, AppState, SharedState};
use crate::config::{HttpConfig, StudioConfig};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

/// Build the API router over shared state
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/api/v2/query", post(query_handler))
        .route("/api/v2/connect", post(connect_handler))
        .route("/api/v1/connect", post(connect_handler))
        .route("/api/status", get(status_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// HTTP server managing the query API
pub struct HttpServer {
    state: SharedState,
    http: HttpConfig,
}

impl HttpServer {
    /// Create a new HTTP server
    pub fn new(config: StudioConfig) -> Self {
        let http = config.http.clone();
        Self {
            state: Arc::new(AppState::new(config)),
            http,
        }
    }

    pub fn state(&self) -> SharedState {
        Arc::clone(&self.state)
    }

    /// Start the HTTP server
    pub async fn start(&self) -> std::io::Result<()> {
        let app = router(self.state());

        let addr = self.http.bind_address();
        let listener = tokio::net::TcpListener::bind(&addr).await?;

        info!("Graph Studio API listening on http://{}", listener.local_addr()?);

        axum::serve(listener, app).await
    }
}
