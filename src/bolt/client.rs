//! Cypher query client over Bolt
//!
//! Opens a fresh session for every run and always closes it again.

use super::connection::BoltConnection;
use super::convert::{bindings_to_parameters, RecordConverter};
use super::{BoltError, BoltResult, DEFAULT_PORT};
use crate::client::{Bindings, ClientResult, Dialect, QueryClient, QueryResult};
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

/// Session-per-run Bolt client
pub struct CypherClient {
    address: String,
    username: String,
    password: String,
    user_agent: String,
}

impl std::fmt::Debug for CypherClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CypherClient")
            .field("address", &self.address)
            .field("username", &self.username)
            .finish()
    }
}

impl CypherClient {
    /// Create a client for a `bolt://host[:port]` endpoint
    pub fn new(endpoint: &str, username: &str, password: &str) -> BoltResult<Self> {
        Ok(Self {
            address: parse_endpoint(endpoint)?,
            username: username.to_string(),
            password: password.to_string(),
            user_agent: format!("graph-studio/{}", crate::VERSION),
        })
    }

    pub fn with_user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = user_agent.to_string();
        self
    }

    /// `host:port` the client connects to
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Run one query on an already connected stream, then close it.
    ///
    /// Closing happens on every exit path. A close failure is logged and
    /// otherwise ignored.
    pub async fn run_on<S>(
        &self,
        mut conn: BoltConnection<S>,
        query: &str,
        bindings: &Bindings,
    ) -> BoltResult<QueryResult>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let outcome = self.execute(&mut conn, query, bindings).await;
        if let Err(e) = conn.close().await {
            debug!("Ignoring Bolt session close failure: {}", e);
        }
        outcome
    }

    async fn execute<S>(
        &self,
        conn: &mut BoltConnection<S>,
        query: &str,
        bindings: &Bindings,
    ) -> BoltResult<QueryResult>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        conn.handshake().await?;
        conn.hello(&self.user_agent, &self.username, &self.password)
            .await?;

        let mut converter = RecordConverter::new();
        conn.run(query, bindings_to_parameters(bindings), |fields, values| {
            converter.on_record(fields, values)
        })
        .await?;
        Ok(converter.finish())
    }
}

#[async_trait]
impl QueryClient for CypherClient {
    async fn run(&mut self, query: &str, bindings: &Bindings) -> ClientResult<QueryResult> {
        debug!("Cypher run against {}: {}", self.address, query);
        let conn = BoltConnection::connect(&self.address).await.map_err(|e| {
            warn!("Bolt connection to {} failed: {}", self.address, e);
            e
        })?;

        match self.run_on(conn, query, bindings).await {
            Ok(result) => {
                info!(
                    rows = result.len(),
                    nodes = result.graph.node_count(),
                    edges = result.graph.edge_count(),
                    "Cypher query completed"
                );
                Ok(result)
            }
            Err(e) => {
                warn!("Cypher query failed: {}", e);
                Err(e.into())
            }
        }
    }

    async fn close(&mut self) {}

    fn dialect(&self) -> Dialect {
        Dialect::Cypher
    }
}

/// Reduce a `bolt://host[:port][/...]` endpoint to `host:port`
fn parse_endpoint(endpoint: &str) -> BoltResult<String> {
    let rest = endpoint
        .strip_prefix("bolt://")
        .or_else(|| endpoint.strip_prefix("neo4j://"))
        .unwrap_or(endpoint);
    let authority = rest.split('/').next().unwrap_or_default();
    if authority.is_empty() {
        return Err(BoltError::InvalidEndpoint(endpoint.to_string()));
    }

    // Bracketed IPv6 literal
    if authority.starts_with('[') {
        return match authority.rfind("]:") {
            Some(_) => Ok(authority.to_string()),
            None if authority.ends_with(']') => Ok(format!("{}:{}", authority, DEFAULT_PORT)),
            None => Err(BoltError::InvalidEndpoint(endpoint.to_string())),
        };
    }

    match authority.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
            Ok(authority.to_string())
        }
        Some(_) => Err(BoltError::InvalidEndpoint(endpoint.to_string())),
        None => Ok(format!("{}:{}", authority, DEFAULT_PORT)),
    }
}
