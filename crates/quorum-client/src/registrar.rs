//! Builds registries and façades from one node list.

use crate::config::{ClientConfig, ConnectionSettings, NodeConfig, resolve_all};
use crate::error::Result;
use crate::registry::{AdminServicesConnection, ServicesConnection};
use crate::select::{FirstCandidate, RandomStart, SelectionPolicy};
use crate::services::{BoardAdmin, KeyGenerationClient, SigningClient, UploadClient};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Hands out connected façades for a fixed set of nodes.
///
/// Every call dials afresh; façades never share a connection.
#[derive(Clone)]
pub struct Registrar {
    nodes: Vec<NodeConfig>,
    settings: ConnectionSettings,
    policy: Arc<dyn SelectionPolicy>,
}

impl Registrar {
    pub fn new(nodes: Vec<NodeConfig>, settings: ConnectionSettings) -> Self {
        Self {
            nodes,
            settings,
            policy: Arc::new(RandomStart),
        }
    }

    /// Resolve every configured endpoint. Entries that fail to resolve are
    /// kept and skipped when dialing.
    pub async fn from_config(config: &ClientConfig) -> Self {
        let nodes = resolve_all(&config.nodes).await;
        Self::new(nodes, config.connection)
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let config = ClientConfig::load(path)?;
        Ok(Self::from_config(&config).await)
    }

    /// Replace the single-node selection policy (random start by default).
    pub fn with_policy(mut self, policy: impl SelectionPolicy + 'static) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    pub fn nodes(&self) -> &[NodeConfig] {
        &self.nodes
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    pub async fn services_connection(&self) -> ServicesConnection {
        ServicesConnection::connect(&self.nodes, self.policy.as_ref(), &self.settings).await
    }

    pub async fn admin_connection(&self) -> AdminServicesConnection {
        AdminServicesConnection::connect(&self.nodes, &self.settings).await
    }

    pub async fn upload_client(&self) -> UploadClient {
        UploadClient::new(self.services_connection().await)
    }

    pub async fn key_generation_client(&self) -> KeyGenerationClient {
        KeyGenerationClient::new(self.services_connection().await)
    }

    pub async fn signing_client(&self) -> SigningClient {
        SigningClient::new(self.services_connection().await)
    }

    pub async fn board_admin(&self) -> BoardAdmin {
        BoardAdmin::new(self.admin_connection().await)
    }

    /// One single-node registry per configured endpoint, keyed by its
    /// `host:port` label.
    pub async fn connect_each(&self) -> BTreeMap<String, ServicesConnection> {
        let mut map = BTreeMap::new();
        for node in &self.nodes {
            let connection = ServicesConnection::connect(
                std::slice::from_ref(node),
                &FirstCandidate,
                &self.settings,
            )
            .await;
            map.insert(node.endpoint().to_string(), connection);
        }
        map
    }
}

impl std::fmt::Debug for Registrar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registrar")
            .field("nodes", &self.nodes)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
