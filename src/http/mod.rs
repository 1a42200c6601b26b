//! JSON API consumed by the graph viewer
//!
//! - `POST /api/v2/connect`: validate and remember a connection
//! - `POST /api/v2/query`: run a query with the remembered connection
//! - `GET /api/status`: liveness and connection state

pub mod handler;
pub mod server;

pub use handler::{AppState, SharedState};
pub use server::{router, HttpServer};
