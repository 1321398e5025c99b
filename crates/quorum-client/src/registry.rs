//! Connection registries.
//!
//! [`ServicesConnection`] serves requests any one node can answer: it keeps a
//! single connection to the first reachable candidate. [`AdminServicesConnection`]
//! connects to every configured node and addresses them by name, one at a
//! time or all at once.
//!
//! Neither registry checks quorum sizes. Threshold sends are wired exactly
//! like plain sends; the operation's option builder has already verified that
//! enough nodes are involved.

use crate::config::{ConnectionSettings, NodeConfig, NodeEndpoint};
use crate::connection::{Intent, NodeConnection};
use crate::error::{ConnectionError, Error, Result};
use crate::select::{SelectionPolicy, scan_order};
use futures_util::future::join_all;
use quorum_core::{
    Capability, CapabilityKind, MessageReply, MessageType, NodeInfo, Payload, union_capabilities,
};
use std::collections::BTreeMap;
use std::collections::BTreeSet;

/// Single-node dispatch.
///
/// The active connection is picked once, at construction, and never
/// replaced. If no candidate answered, or the chosen node later fails, every
/// send fails.
#[derive(Debug)]
pub struct ServicesConnection {
    connection: Option<NodeConnection>,
}

impl ServicesConnection {
    /// Try candidates starting where `policy` says, wrapping around the list
    /// once, and keep the first node that completes the handshake.
    pub async fn connect(
        nodes: &[NodeConfig],
        policy: &dyn SelectionPolicy,
        settings: &ConnectionSettings,
    ) -> Self {
        if nodes.is_empty() {
            tracing::warn!("No nodes configured");
            return Self { connection: None };
        }

        let start = policy.start(nodes.len()) % nodes.len();
        for index in scan_order(start, nodes.len()) {
            let node = &nodes[index];
            let address = match node.address() {
                Ok(address) => address,
                Err(e) => {
                    tracing::debug!("Skipping node {}: {}", node.endpoint(), e);
                    continue;
                }
            };

            match NodeConnection::connect(address, settings).await {
                Ok(connection) => {
                    tracing::info!("Using node {} ({})", connection.name(), node.endpoint());
                    return Self {
                        connection: Some(connection),
                    };
                }
                Err(e) => tracing::warn!("Node {} unavailable: {}", node.endpoint(), e),
            }
        }

        tracing::warn!("None of {} configured nodes is reachable", nodes.len());
        Self { connection: None }
    }

    /// Wrap an already established connection.
    pub fn from_connection(connection: NodeConnection) -> Self {
        Self {
            connection: Some(connection),
        }
    }

    /// Whether a node was reached and its connection is still open.
    pub fn is_connected(&self) -> bool {
        self.connection.as_ref().is_some_and(|c| !c.is_closed())
    }

    pub fn node(&self) -> Option<&NodeInfo> {
        self.connection.as_ref().map(NodeConnection::info)
    }

    pub fn capabilities(&self) -> BTreeSet<Capability> {
        self.node().map(NodeInfo::capability_set).unwrap_or_default()
    }

    pub async fn send(
        &mut self,
        op: impl Into<MessageType>,
        payload: Payload,
    ) -> Result<MessageReply, ConnectionError> {
        self.active()?.send(op, payload).await
    }

    pub async fn send_threshold(
        &mut self,
        op: impl Into<MessageType>,
        payload: Payload,
    ) -> Result<MessageReply, ConnectionError> {
        self.active()?.send_threshold(op, payload).await
    }

    pub async fn shutdown(&mut self) {
        if let Some(connection) = self.connection.as_mut() {
            connection.shutdown().await;
        }
    }

    fn active(&mut self) -> Result<&mut NodeConnection, ConnectionError> {
        self.connection.as_mut().ok_or(ConnectionError::NoConnection)
    }
}

/// Name-addressed dispatch to every configured node.
#[derive(Debug)]
pub struct AdminServicesConnection {
    connections: BTreeMap<String, NodeConnection>,
    capabilities: BTreeSet<Capability>,
    failures: Vec<(NodeEndpoint, Error)>,
}

impl AdminServicesConnection {
    /// Connect to every node. Attempts run concurrently and are independent:
    /// a node that cannot be resolved, dialed or identified is recorded in
    /// [`failures`](Self::failures) and the rest are still registered.
    pub async fn connect(nodes: &[NodeConfig], settings: &ConnectionSettings) -> Self {
        let attempts = nodes.iter().map(|node| async move {
            let outcome = match node.address() {
                Ok(address) => NodeConnection::connect(address, settings)
                    .await
                    .map_err(Error::from),
                Err(e) => Err(Error::from(e)),
            };
            (node.endpoint().clone(), outcome)
        });

        let mut registry = Self {
            connections: BTreeMap::new(),
            capabilities: BTreeSet::new(),
            failures: Vec::new(),
        };
        for (endpoint, outcome) in join_all(attempts).await {
            match outcome {
                Ok(connection) => registry.register(endpoint, connection),
                Err(e) => {
                    tracing::warn!("Node {} unavailable: {}", endpoint, e);
                    registry.failures.push((endpoint, e));
                }
            }
        }
        registry.capabilities =
            union_capabilities(registry.connections.values().map(NodeConnection::info));

        tracing::info!(
            "Admin registry ready: {} connected, {} failed",
            registry.connections.len(),
            registry.failures.len()
        );
        registry
    }

    fn register(&mut self, endpoint: NodeEndpoint, connection: NodeConnection) {
        let name = connection.name().to_string();
        if self.connections.contains_key(&name) {
            let e = ConnectionError::DuplicateName {
                name,
                address: connection.address(),
            };
            tracing::warn!("{}", e);
            self.failures.push((endpoint, e.into()));
            return;
        }
        self.connections.insert(name, connection);
    }

    /// Names of the registered nodes, sorted.
    pub fn node_names(&self) -> impl Iterator<Item = &str> {
        self.connections.keys().map(String::as_str)
    }

    pub fn node(&self, name: &str) -> Option<&NodeInfo> {
        self.connections.get(name).map(NodeConnection::info)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Union of every registered node's capabilities.
    pub fn capabilities(&self) -> &BTreeSet<Capability> {
        &self.capabilities
    }

    /// Registered nodes declaring `kind`.
    pub fn nodes_declaring(&self, kind: CapabilityKind) -> Vec<&str> {
        self.connections
            .iter()
            .filter(|(_, c)| c.declares(kind))
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Nodes that could not be registered, in configuration order.
    pub fn failures(&self) -> &[(NodeEndpoint, Error)] {
        &self.failures
    }

    pub async fn send_to(
        &mut self,
        node: &str,
        op: impl Into<MessageType>,
        payload: Payload,
    ) -> Result<MessageReply> {
        Ok(self.named(node)?.send(op, payload).await?)
    }

    pub async fn send_threshold_to(
        &mut self,
        node: &str,
        op: impl Into<MessageType>,
        payload: Payload,
    ) -> Result<MessageReply> {
        Ok(self.named(node)?.send_threshold(op, payload).await?)
    }

    /// Send the same request to every registered node.
    pub async fn send_to_all(
        &mut self,
        op: impl Into<MessageType>,
        payload: Payload,
    ) -> BroadcastReplies {
        self.fan_out(Intent::Single, op.into(), payload).await
    }

    /// Send the same quorum request to every registered node.
    pub async fn send_threshold_to_all(
        &mut self,
        op: impl Into<MessageType>,
        payload: Payload,
    ) -> BroadcastReplies {
        self.fan_out(Intent::Quorum, op.into(), payload).await
    }

    pub async fn shutdown(&mut self) {
        for connection in self.connections.values_mut() {
            connection.shutdown().await;
        }
    }

    fn named(&mut self, node: &str) -> Result<&mut NodeConnection> {
        self.connections
            .get_mut(node)
            .ok_or_else(|| Error::NotFound(node.to_string()))
    }

    async fn fan_out(&mut self, intent: Intent, op: MessageType, payload: Payload) -> BroadcastReplies {
        let sends = self.connections.iter_mut().map(|(name, connection)| {
            let payload = payload.clone();
            async move { (name.clone(), connection.dispatch(intent, op, payload).await) }
        });
        BroadcastReplies {
            replies: join_all(sends).await.into_iter().collect(),
        }
    }
}

/// Per-node outcome of a broadcast.
///
/// Partial failure is normal: callers decide how many accepted replies they
/// need, for instance with [`meets_threshold`](Self::meets_threshold).
#[derive(Debug, Default)]
pub struct BroadcastReplies {
    replies: BTreeMap<String, Result<MessageReply, ConnectionError>>,
}

impl BroadcastReplies {
    pub fn get(&self, node: &str) -> Option<&Result<MessageReply, ConnectionError>> {
        self.replies.get(node)
    }

    pub fn len(&self) -> usize {
        self.replies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replies.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Result<MessageReply, ConnectionError>)> {
        self.replies.iter().map(|(name, r)| (name.as_str(), r))
    }

    /// Nodes that answered with an `Ok` reply.
    pub fn accepted(&self) -> impl Iterator<Item = (&str, &MessageReply)> {
        self.iter().filter_map(|(name, r)| match r {
            Ok(reply) if reply.is_ok() => Some((name, reply)),
            _ => None,
        })
    }

    /// Nodes that answered with an `Error` reply.
    pub fn refused(&self) -> impl Iterator<Item = (&str, &MessageReply)> {
        self.iter().filter_map(|(name, r)| match r {
            Ok(reply) if !reply.is_ok() => Some((name, reply)),
            _ => None,
        })
    }

    /// Nodes whose exchange failed at the transport level.
    pub fn failed(&self) -> impl Iterator<Item = (&str, &ConnectionError)> {
        self.iter()
            .filter_map(|(name, r)| r.as_ref().err().map(|e| (name, e)))
    }

    pub fn accepted_count(&self) -> usize {
        self.accepted().count()
    }

    /// Whether at least `threshold` nodes accepted the request.
    pub fn meets_threshold(&self, threshold: usize) -> bool {
        self.accepted_count() >= threshold
    }

    pub fn into_inner(self) -> BTreeMap<String, Result<MessageReply, ConnectionError>> {
        self.replies
    }
}

impl IntoIterator for BroadcastReplies {
    type Item = (String, Result<MessageReply, ConnectionError>);
    type IntoIter = std::collections::btree_map::IntoIter<String, Result<MessageReply, ConnectionError>>;

    fn into_iter(self) -> Self::IntoIter {
        self.replies.into_iter()
    }
}

impl FromIterator<(String, Result<MessageReply, ConnectionError>)> for BroadcastReplies {
    fn from_iter<I: IntoIterator<Item = (String, Result<MessageReply, ConnectionError>)>>(iter: I) -> Self {
        Self {
            replies: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn replies() -> BroadcastReplies {
        [
            ("a".to_string(), Ok(MessageReply::ok(Payload::empty()))),
            ("b".to_string(), Ok(MessageReply::error("suspended"))),
            (
                "c".to_string(),
                Err(ConnectionError::Closed { node: "c".into() }),
            ),
            ("d".to_string(), Ok(MessageReply::ok(Payload::empty()))),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn broadcast_partitions_outcomes() {
        let replies = replies();
        assert_eq!(replies.len(), 4);
        assert_eq!(
            replies.accepted().map(|(n, _)| n).collect::<Vec<_>>(),
            vec!["a", "d"]
        );
        assert_eq!(replies.refused().map(|(n, _)| n).collect::<Vec<_>>(), vec!["b"]);
        assert_eq!(replies.failed().map(|(n, _)| n).collect::<Vec<_>>(), vec!["c"]);
    }

    #[test]
    fn threshold_counts_accepted_replies_only() {
        let replies = replies();
        assert!(replies.meets_threshold(2));
        assert!(!replies.meets_threshold(3));
        assert!(BroadcastReplies::default().meets_threshold(0));
    }

    #[tokio::test]
    async fn no_candidates_means_no_connection() {
        let mut registry = ServicesConnection::connect(
            &[],
            &crate::select::FirstCandidate,
            &ConnectionSettings::default(),
        )
        .await;
        assert!(!registry.is_connected());
        assert!(registry.capabilities().is_empty());
        let err = registry
            .send(quorum_core::ClientOp::UploadToBoard, Payload::empty())
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectionError::NoConnection));
    }

    #[tokio::test]
    async fn unresolved_nodes_are_skipped_and_recorded() {
        let nodes = vec![
            NodeConfig::unresolved(NodeEndpoint::new("bad-a", 1), "no such host"),
            NodeConfig::unresolved(NodeEndpoint::new("bad-b", 2), "no such host"),
        ];
        let settings = ConnectionSettings::default();

        let single =
            ServicesConnection::connect(&nodes, &crate::select::FirstCandidate, &settings).await;
        assert!(!single.is_connected());

        let admin = AdminServicesConnection::connect(&nodes, &settings).await;
        assert!(admin.is_empty());
        assert_eq!(admin.failures().len(), 2);
        assert!(matches!(admin.failures()[0].1, Error::Config(_)));
        assert_eq!(admin.failures()[1].0, NodeEndpoint::new("bad-b", 2));
    }
}
