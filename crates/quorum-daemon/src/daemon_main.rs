//! quorum-node: serve the reference services on one address.
//!
//!   quorum-node --name node1 --listen 127.0.0.1:11000
//!   quorum-node --name node2 --listen 127.0.0.1:11001 --services upload,boards

use clap::{Parser, ValueEnum};
use quorum_node::Node;
use quorum_node::services::{
    BoardCommandService, BoardStore, KeyGenerationService, KeyStore, SigningService, UploadService,
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ServiceKind {
    Upload,
    Boards,
    Keys,
    Signing,
}

#[derive(Parser)]
#[command(name = "quorum-node", about = "Run a quorum node")]
struct Args {
    /// Name announced to connecting clients
    #[arg(long, env = "QUORUM_NODE_NAME")]
    name: String,

    #[arg(long, env = "QUORUM_NODE_LISTEN", default_value = "127.0.0.1:11000")]
    listen: SocketAddr,

    /// Services to host
    #[arg(
        long,
        value_enum,
        value_delimiter = ',',
        default_value = "upload,boards,keys,signing"
    )]
    services: Vec<ServiceKind>,
}

fn build_node(args: &Args) -> Node {
    let boards = BoardStore::new();
    let keys = KeyStore::new();
    let mut node = Node::new(args.name.clone());
    for kind in &args.services {
        node = match kind {
            ServiceKind::Upload => node.with_service(UploadService::new(boards.clone())),
            ServiceKind::Boards => node.with_service(BoardCommandService::new(boards.clone())),
            ServiceKind::Keys => node.with_service(KeyGenerationService::new(keys.clone())),
            ServiceKind::Signing => {
                node.with_service(SigningService::new(args.name.clone(), keys.clone()))
            }
        };
    }
    node
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("quorum_node=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let node = build_node(&args);
    let capabilities: Vec<_> = node
        .info()
        .capabilities()
        .iter()
        .map(|c| c.kind().as_str())
        .collect();
    tracing::info!("Starting {} with {}", node.name(), capabilities.join(", "));

    let listener = TcpListener::bind(args.listen).await?;
    tokio::select! {
        result = node.serve(listener) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down");
            Ok(())
        }
    }
}
