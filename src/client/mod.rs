//! Query client facade
//!
//! [`QueryClient`] is the one contract both protocol adapters implement:
//! `open`, `run`, `close`. Callers pick the adapter with [`Dialect::detect`]
//! and build it from a [`ConnectionInfo`] via [`connect_client`].

pub mod error;
pub mod result;

use crate::bolt::CypherClient;
use crate::config::StudioConfig;
use crate::gremlin::GremlinClient;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

pub use error::{ClientResult, Failure, QueryError};
pub use result::{Bindings, QueryResult};

/// Uniform interface over both backend protocols.
///
/// `&mut self` receivers allow one outstanding `run` per client.
#[async_trait]
pub trait QueryClient: Send {
    /// Establish any persistent connection. A no-op by default.
    async fn open(&mut self) -> ClientResult<()> {
        Ok(())
    }

    /// Execute one query and normalize its result
    async fn run(&mut self, query: &str, bindings: &Bindings) -> ClientResult<QueryResult>;

    /// Release resources. Safe to call more than once.
    async fn close(&mut self);

    /// Dialect this client speaks
    fn dialect(&self) -> Dialect;
}

/// Query language / wire protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// Bolt protocol
    Cypher,
    /// Gremlin Server protocol
    Gremlin,
}

impl Dialect {
    /// A query starting with `g.` is a traversal; anything else is Cypher
    pub fn detect(query: &str) -> Self {
        if query.trim_start().starts_with("g.") {
            Dialect::Gremlin
        } else {
            Dialect::Cypher
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Cypher => write!(f, "cypher"),
            Dialect::Gremlin => write!(f, "gremlin"),
        }
    }
}

/// Where and as whom to connect
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dbname: Option<String>,
}

impl fmt::Debug for ConnectionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionInfo")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"***")
            .field("dbname", &self.dbname)
            .finish()
    }
}

impl ConnectionInfo {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            username: String::new(),
            password: String::new(),
            dbname: None,
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    pub fn with_dbname(mut self, dbname: impl Into<String>) -> Self {
        self.dbname = Some(dbname.into());
        self
    }

    fn gremlin_path(&self) -> String {
        match self.dbname.as_deref().filter(|d| !d.is_empty()) {
            Some(db) => format!("/gremlin/{}", db),
            None => "/gremlin".to_string(),
        }
    }

    pub fn bolt_endpoint(&self) -> String {
        format!("bolt://{}:{}", self.host, self.port)
    }

    pub fn gremlin_endpoint(&self) -> String {
        format!("ws://{}:{}{}", self.host, self.port, self.gremlin_path())
    }

    /// HTTP endpoint used by [`ConnectionInfo::check`]
    pub fn check_endpoint(&self) -> String {
        format!("http://{}:{}{}", self.host, self.port, self.gremlin_path())
    }

    /// Check reachability and credentials with a trivial HTTP traversal.
    ///
    /// 401 maps to an authentication failure, any other error status is
    /// carried through, and no response at all is a transport failure.
    pub async fn check(&self) -> ClientResult<()> {
        let url = self.check_endpoint();
        debug!("Checking {}", url);

        let response = reqwest::Client::new()
            .post(&url)
            .basic_auth(&self.username, Some(&self.password))
            .json(&serde_json::json!({ "gremlin": "g.V().count()" }))
            .send()
            .await
            .map_err(|e| {
                warn!("Connection check of {} failed: {}", url, e);
                QueryError::Transport(e.to_string())
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        let msg = if body.is_empty() {
            status.to_string()
        } else {
            body
        };
        if status == reqwest::StatusCode::UNAUTHORIZED {
            Err(QueryError::Authentication(msg))
        } else {
            Err(QueryError::Execution {
                status: i32::from(status.as_u16()),
                msg,
            })
        }
    }
}

/// Build the client for `dialect` against `info`
pub fn connect_client(
    dialect: Dialect,
    info: &ConnectionInfo,
    config: &StudioConfig,
) -> ClientResult<Box<dyn QueryClient>> {
    match dialect {
        Dialect::Cypher => {
            let client = CypherClient::new(&info.bolt_endpoint(), &info.username, &info.password)
                .map_err(QueryError::from)?
                .with_user_agent(&config.bolt.user_agent);
            Ok(Box::new(client))
        }
        Dialect::Gremlin => {
            let client = GremlinClient::new(
                info.gremlin_endpoint(),
                info.username.clone(),
                info.password.clone(),
            )
            .with_timeout(config.gremlin.timeout())
            .with_multi_value(config.gremlin.multi_value);
            Ok(Box::new(client))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_detection() {
        assert_eq!(Dialect::detect("g.V().limit(10)"), Dialect::Gremlin);
        assert_eq!(Dialect::detect("  g.E()"), Dialect::Gremlin);
        assert_eq!(Dialect::detect("MATCH (n) RETURN n"), Dialect::Cypher);
        assert_eq!(Dialect::detect("graph.V()"), Dialect::Cypher);
    }

    #[test]
    fn test_endpoints() {
        let info = ConnectionInfo::new("db.local", 8182);
        assert_eq!(info.bolt_endpoint(), "bolt://db.local:8182");
        assert_eq!(info.gremlin_endpoint(), "ws://db.local:8182/gremlin");

        let info = info.with_dbname("social");
        assert_eq!(info.gremlin_endpoint(), "ws://db.local:8182/gremlin/social");
        assert_eq!(info.check_endpoint(), "http://db.local:8182/gremlin/social");
    }

    #[test]
    fn test_debug_hides_password() {
        let info = ConnectionInfo::new("h", 1).with_credentials("u", "hunter2");
        assert!(!format!("{:?}", info).contains("hunter2"));
    }

    #[test]
    fn test_connect_client_dispatch() {
        let info = ConnectionInfo::new("localhost", 7687).with_credentials("neo4j", "pw");
        let config = StudioConfig::default();
        let cypher = connect_client(Dialect::Cypher, &info, &config).unwrap();
        assert_eq!(cypher.dialect(), Dialect::Cypher);
        let gremlin = connect_client(Dialect::Gremlin, &info, &config).unwrap();
        assert_eq!(gremlin.dialect(), Dialect::Gremlin);
    }

    #[tokio::test]
    async fn test_check_unreachable_is_transport() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = ConnectionInfo::new("127.0.0.1", port).check().await.unwrap_err();
        assert!(matches!(err, QueryError::Transport(_)));
        assert_eq!(err.status(), -1);
    }
}
