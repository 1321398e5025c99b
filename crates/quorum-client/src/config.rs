//! Node list configuration.
//!
//! ```toml
//! [connection]
//! connect_timeout_ms = 5000
//! handshake_timeout_ms = 30000
//! request_timeout_ms = 30000
//!
//! [[node]]
//! host = "127.0.0.1"
//! port = 11000
//! ```

use crate::error::ConfigError;
use quorum_core::Codec;
use quorum_core::codec::DEFAULT_MAX_ENVELOPE_LEN;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Where a node listens.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeEndpoint {
    pub host: String,
    pub port: u16,
}

impl NodeEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for NodeEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl From<SocketAddr> for NodeEndpoint {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip().to_string(), addr.port())
    }
}

/// Timeouts and limits applied to every node connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    pub connect_timeout_ms: u64,
    pub handshake_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub max_envelope_len: u64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 5_000,
            handshake_timeout_ms: 30_000,
            request_timeout_ms: 30_000,
            max_envelope_len: DEFAULT_MAX_ENVELOPE_LEN,
        }
    }
}

impl ConnectionSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn codec(&self) -> Codec {
        Codec::new(self.max_envelope_len)
    }

    /// Use one timeout for every blocking point.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self.connect_timeout_ms = ms;
        self.handshake_timeout_ms = ms;
        self.request_timeout_ms = ms;
        self
    }
}

/// Parsed client configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub connection: ConnectionSettings,
    #[serde(default, rename = "node")]
    pub nodes: Vec<NodeEndpoint>,
}

impl ClientConfig {
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }
}

/// A configured endpoint together with the outcome of resolving it.
///
/// An entry that failed to resolve stays in the list so positions keep
/// matching the configuration, but it is never dialed.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    endpoint: NodeEndpoint,
    address: Result<SocketAddr, String>,
}

impl NodeConfig {
    /// Resolve `endpoint` to one address, preferring IPv4 when the lookup
    /// returns both families.
    pub async fn resolve(endpoint: NodeEndpoint) -> Self {
        let address = match tokio::net::lookup_host((endpoint.host.as_str(), endpoint.port)).await {
            Ok(addrs) => pick_address(addrs).ok_or_else(|| "no addresses returned".to_string()),
            Err(e) => Err(e.to_string()),
        };
        if let Err(reason) = &address {
            tracing::warn!("Cannot resolve {}: {}", endpoint, reason);
        }
        Self { endpoint, address }
    }

    pub fn resolved(endpoint: NodeEndpoint, address: SocketAddr) -> Self {
        Self {
            endpoint,
            address: Ok(address),
        }
    }

    pub fn unresolved(endpoint: NodeEndpoint, reason: impl Into<String>) -> Self {
        Self {
            endpoint,
            address: Err(reason.into()),
        }
    }

    pub fn endpoint(&self) -> &NodeEndpoint {
        &self.endpoint
    }

    pub fn address(&self) -> Result<SocketAddr, ConfigError> {
        self.address.clone().map_err(|reason| ConfigError::Resolve {
            endpoint: self.endpoint.to_string(),
            reason,
        })
    }

    pub fn is_resolved(&self) -> bool {
        self.address.is_ok()
    }
}

impl From<SocketAddr> for NodeConfig {
    fn from(addr: SocketAddr) -> Self {
        Self::resolved(addr.into(), addr)
    }
}

/// Pick the address to dial from a lookup result: the first IPv4 address if
/// there is one, otherwise the first address.
fn pick_address(addrs: impl IntoIterator<Item = SocketAddr>) -> Option<SocketAddr> {
    let mut first = None;
    for addr in addrs {
        if addr.is_ipv4() {
            return Some(addr);
        }
        first.get_or_insert(addr);
    }
    first
}

/// Resolve every endpoint, preserving order.
pub async fn resolve_all(endpoints: &[NodeEndpoint]) -> Vec<NodeConfig> {
    let mut nodes = Vec::with_capacity(endpoints.len());
    for endpoint in endpoints {
        nodes.push(NodeConfig::resolve(endpoint.clone()).await);
    }
    nodes
}
