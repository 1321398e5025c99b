//! Local cluster demo.
//!
//! Starts a few nodes in-process on free localhost ports, plus one address
//! nothing listens on, then drives every client façade against them:
//! - single-node upload, skipping the dead address
//! - admin board commands, one node and broadcast
//! - threshold key generation and signing
//!
//!   cargo run -p quorum-demo-local-cluster
//!   cargo run -p quorum-demo-local-cluster -- 5

use quorum_client::{
    ConnectionSettings, KeyGenerationOptions, NodeConfig, Registrar, RoundRobin,
    SignatureGenerationOptions,
};
use quorum_core::Algorithm;
use quorum_node::services::{BoardStore, KeyStore, reference_node_with};
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("quorum_demo_local_cluster=info".parse()?)
                .add_directive("quorum_client=info".parse()?),
        )
        .init();

    let size: usize = std::env::args()
        .nth(1)
        .map(|n| n.parse::<usize>())
        .transpose()?
        .unwrap_or(4);
    anyhow::ensure!(size >= 2, "need at least 2 nodes");

    let keys = KeyStore::new();
    let mut handles = Vec::new();
    for i in 1..=size {
        let node = reference_node_with(format!("node{i}"), BoardStore::new(), keys.clone());
        handles.push(node.spawn("127.0.0.1:0").await?);
    }

    // listed first so single-node dispatch has to skip it
    let dead = TcpListener::bind("127.0.0.1:0").await?.local_addr()?;
    let mut nodes = vec![NodeConfig::from(dead)];
    nodes.extend(handles.iter().map(|h| NodeConfig::from(h.address())));
    let names: Vec<String> = handles.iter().map(|h| h.name().to_string()).collect();

    let settings = ConnectionSettings::default().with_timeout(Duration::from_secs(2));
    let registrar = Registrar::new(nodes, settings).with_policy(RoundRobin::default());

    let mut uploads = registrar.upload_client().await;
    for ballot in ["yes", "no", "yes"] {
        uploads.upload("referendum", ballot.as_bytes().to_vec()).await?;
    }
    let upload_node = uploads
        .connection()
        .node()
        .map(|info| info.name().to_string())
        .unwrap_or_default();
    tracing::info!("Uploaded 3 ballots through {}", upload_node);

    let mut admin = registrar.board_admin().await;
    let kinds: Vec<_> = admin
        .list_capabilities()
        .iter()
        .map(|c| c.kind().as_str())
        .collect();
    tracing::info!("Cluster capabilities: {}", kinds.join(", "));
    for (endpoint, error) in admin.admin().failures() {
        tracing::info!("Not registered: {} ({})", endpoint, error);
    }

    admin.suspend(&upload_node, "referendum").await?;
    if let Err(e) = uploads.upload("referendum", b"late".to_vec()).await {
        tracing::info!("Late ballot rejected: {}", e);
    }
    let transit: Vec<_> = names.iter().filter(|n| **n != upload_node).cloned().collect();
    admin
        .shuffle_and_move(&upload_node, "referendum", transit.iter().cloned())
        .await?;
    tracing::info!("Shuffled referendum through {}", transit.join(", "));

    let replies = admin.activate_everywhere("results").await?;
    tracing::info!(
        "Activated results on {}/{} nodes",
        replies.accepted_count(),
        replies.len()
    );

    let threshold = size / 2;
    let key_options = KeyGenerationOptions::builder(Algorithm::Ecdsa)
        .parameters(["secp256r1"])
        .threshold(threshold)
        .nodes(names.iter().cloned())
        .build()?;
    let mut key_client = registrar.key_generation_client().await;
    let key = key_client.generate_key("tally", &key_options).await?;
    tracing::info!(
        "Generated {} key {} at threshold {}",
        key.algorithm,
        key.key_id,
        key.threshold
    );

    let short = SignatureGenerationOptions::builder(Algorithm::Ecdsa)
        .threshold(threshold + 1)
        .nodes(names.iter().cloned())
        .build();
    if let Err(e) = short {
        tracing::info!("Refused before dispatch: {}", e);
    }

    let sign_options = SignatureGenerationOptions::builder(Algorithm::Ecdsa)
        .threshold(threshold)
        .nodes(names.iter().cloned())
        .build()?;
    let mut signer = registrar.signing_client().await;
    let receipt = signer.sign("tally", &sign_options, b"yes: 2, no: 1").await?;
    tracing::info!(
        "{} coordinated a signature over {} nodes ({} bytes)",
        receipt.coordinator,
        receipt.nodes.len(),
        receipt.signature.len()
    );

    uploads.shutdown().await;
    admin.shutdown().await;
    key_client.shutdown().await;
    signer.shutdown().await;
    for handle in handles {
        handle.shutdown().await;
    }
    Ok(())
}
