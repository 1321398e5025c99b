#![allow(dead_code)]

use quorum_client::{ConnectionSettings, NodeConfig};
use quorum_node::NodeHandle;
use quorum_node::services::{BoardStore, KeyStore, reference_node, reference_node_with};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;

pub fn settings() -> ConnectionSettings {
    ConnectionSettings::default().with_timeout(Duration::from_secs(2))
}

pub async fn start(name: &str) -> NodeHandle {
    reference_node(name).spawn("127.0.0.1:0").await.unwrap()
}

/// Nodes sharing one key store, so keys generated anywhere are usable
/// everywhere.
pub async fn start_cluster(names: &[&str]) -> Vec<NodeHandle> {
    let keys = KeyStore::new();
    let mut handles = Vec::new();
    for name in names {
        let node = reference_node_with(*name, BoardStore::new(), keys.clone());
        handles.push(node.spawn("127.0.0.1:0").await.unwrap());
    }
    handles
}

/// A localhost port nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

pub fn configs(handles: &[NodeHandle]) -> Vec<NodeConfig> {
    handles.iter().map(|h| NodeConfig::from(h.address())).collect()
}
