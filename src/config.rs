//! Configuration for the server and query clients
//!
//! Loaded from an optional YAML file; every field has a default, so an
//! empty file (or none at all) yields a working configuration.
//!
//! ```yaml
//! http:
//!   address: 0.0.0.0
//!   port: 8080
//! gremlin:
//!   timeout_ms: 10000
//!   multi_value: first   # or: all
//! bolt:
//!   user_agent: graph-studio/0.3
//! ```

use crate::graph::MultiValuePolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Environment variable naming the configuration file
pub const CONFIG_ENV: &str = "GRAPH_STUDIO_CONFIG";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudioConfig {
    pub http: HttpConfig,
    pub bolt: BoltConfig,
    pub gremlin: GremlinConfig,
}

/// HTTP API bind settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub address: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl HttpConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

/// Bolt (Cypher) client settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoltConfig {
    /// Sent in HELLO
    pub user_agent: String,
}

impl Default for BoltConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("graph-studio/{}", crate::VERSION),
        }
    }
}

/// Gremlin client settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GremlinConfig {
    /// Submission timeout in milliseconds
    pub timeout_ms: u64,
    pub multi_value: MultiValuePolicy,
}

impl Default for GremlinConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            multi_value: MultiValuePolicy::First,
        }
    }
}

impl GremlinConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl StudioConfig {
    /// Parse configuration from YAML text
    pub fn from_yaml_str(text: &str) -> ConfigResult<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    /// Load configuration from a YAML file
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Load from the file named by `GRAPH_STUDIO_CONFIG`, or defaults
    pub fn from_env() -> ConfigResult<Self> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}
