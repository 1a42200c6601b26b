//! Gremlin query client

use super::connection::{GremlinTransport, WsTransport};
use super::convert::ResultConverter;
use crate::client::{Bindings, ClientResult, Dialect, QueryClient, QueryError, QueryResult};
use crate::graph::MultiValuePolicy;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default submission timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Client over one persistent Gremlin Server connection
///
/// The connection is opened by [`QueryClient::open`], or lazily by the first
/// `run`, and released by `close`.
pub struct GremlinClient {
    endpoint: String,
    username: String,
    password: String,
    timeout: Duration,
    multi_value: MultiValuePolicy,
    transport: Option<Box<dyn GremlinTransport>>,
}

impl std::fmt::Debug for GremlinClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GremlinClient")
            .field("endpoint", &self.endpoint)
            .field("username", &self.username)
            .field("timeout", &self.timeout)
            .field("multi_value", &self.multi_value)
            .field("connected", &self.transport.is_some())
            .finish()
    }
}

impl GremlinClient {
    pub fn new(endpoint: String, username: String, password: String) -> Self {
        Self {
            endpoint,
            username,
            password,
            timeout: DEFAULT_TIMEOUT,
            multi_value: MultiValuePolicy::default(),
            transport: None,
        }
    }

    /// Client over an already established transport
    pub fn with_transport(transport: Box<dyn GremlinTransport>) -> Self {
        Self {
            transport: Some(transport),
            ..Self::new(String::new(), String::new(), String::new())
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_multi_value(mut self, policy: MultiValuePolicy) -> Self {
        self.multi_value = policy;
        self
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_some()
    }
}

#[async_trait]
impl QueryClient for GremlinClient {
    async fn open(&mut self) -> ClientResult<()> {
        if self.transport.is_some() {
            return Ok(());
        }
        // The submission timeout also bounds the socket connect and upgrade
        let connect = WsTransport::connect(&self.endpoint, &self.username, &self.password);
        let transport = match tokio::time::timeout(self.timeout, connect).await {
            Ok(outcome) => outcome.map_err(|e| {
                warn!("Gremlin connection to {} failed: {}", self.endpoint, e);
                QueryError::from(e)
            })?,
            Err(_) => {
                warn!("Gremlin connection to {} timed out after {:?}", self.endpoint, self.timeout);
                return Err(QueryError::Timeout);
            }
        };
        self.transport = Some(Box::new(transport));
        Ok(())
    }

    async fn run(&mut self, query: &str, bindings: &Bindings) -> ClientResult<QueryResult> {
        self.open().await?;
        let timeout = self.timeout;
        let transport = self
            .transport
            .as_mut()
            .ok_or_else(|| QueryError::Transport("connection not open".to_string()))?;

        debug!("Gremlin submit: {}", query);
        // First to settle wins; a late submission is dropped with its future
        let elements = tokio::select! {
            outcome = transport.submit(query, bindings) => outcome.map_err(|e| {
                warn!("Gremlin query failed: {}", e);
                QueryError::from(e)
            })?,
            _ = tokio::time::sleep(timeout) => {
                warn!("Gremlin query timed out after {:?}", timeout);
                return Err(QueryError::Timeout);
            }
        };

        let mut converter = ResultConverter::new(self.multi_value);
        for element in elements {
            converter.push(element);
        }
        let result = converter.finish();
        info!(
            rows = result.len(),
            nodes = result.graph.node_count(),
            edges = result.graph.edge_count(),
            "Gremlin query completed"
        );
        Ok(result)
    }

    async fn close(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            if let Err(e) = transport.close().await {
                debug!("Gremlin close failed: {}", e);
            }
        }
    }

    fn dialect(&self) -> Dialect {
        Dialect::Gremlin
    }
}
