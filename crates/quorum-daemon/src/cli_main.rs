//! quorum: administer a set of nodes from a TOML node list.

use anyhow::Context;
use clap::{Parser, Subcommand};
use quorum_client::{BroadcastReplies, FirstCandidate, Registrar};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "quorum", about = "Administer quorum nodes")]
struct Cli {
    /// Node list
    #[arg(long, env = "QUORUM_CONFIG", default_value = "quorum.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show every node's capabilities
    Capabilities,

    /// Post a message to a board
    Upload {
        #[arg(long)]
        board: String,
        /// Message text
        message: String,
    },

    /// Activate a board on one node, or on every node
    Activate {
        #[arg(long)]
        board: String,
        #[arg(long)]
        node: Option<String>,
    },

    /// Suspend a board on one node, or on every node
    Suspend {
        #[arg(long)]
        board: String,
        #[arg(long)]
        node: Option<String>,
    },

    /// Shuffle a suspended board and move it through other nodes
    Shuffle {
        #[arg(long)]
        board: String,
        #[arg(long)]
        node: String,
        /// Nodes to pass the board through, in order
        #[arg(long, value_delimiter = ',', required = true)]
        through: Vec<String>,
    },
}

fn report(action: &str, board: &str, replies: BroadcastReplies) {
    for (node, outcome) in replies {
        match outcome {
            Ok(reply) => match reply.into_result() {
                Ok(_) => println!("{node}: {action} {board}"),
                Err(e) => println!("{node}: refused: {}", e.reason),
            },
            Err(e) => println!("{node}: failed: {e}"),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("quorum_client=warn".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let registrar = Registrar::load(&cli.config)
        .await
        .with_context(|| format!("loading {}", cli.config.display()))?;

    match cli.command {
        Command::Capabilities => {
            let admin = registrar.admin_connection().await;
            for name in admin.node_names() {
                if let Some(info) = admin.node(name) {
                    let kinds: Vec<_> =
                        info.capabilities().iter().map(|c| c.kind().as_str()).collect();
                    println!("{name}: {}", kinds.join(", "));
                }
            }
            for (endpoint, error) in admin.failures() {
                println!("{endpoint}: unavailable: {error}");
            }
            let all: Vec<_> = admin
                .capabilities()
                .iter()
                .map(|c| c.kind().as_str())
                .collect();
            println!("all: {}", all.join(", "));
        }
        Command::Upload { board, message } => {
            let mut uploads = registrar.with_policy(FirstCandidate).upload_client().await;
            uploads.upload(&board, message.into_bytes()).await?;
            println!("uploaded to {board}");
        }
        Command::Activate { board, node } => {
            let mut admin = registrar.board_admin().await;
            match node {
                Some(node) => {
                    admin.activate(&node, &board).await?;
                    println!("{node}: activated {board}");
                }
                None => report("activated", &board, admin.activate_everywhere(&board).await?),
            }
        }
        Command::Suspend { board, node } => {
            let mut admin = registrar.board_admin().await;
            match node {
                Some(node) => {
                    admin.suspend(&node, &board).await?;
                    println!("{node}: suspended {board}");
                }
                None => report("suspended", &board, admin.suspend_everywhere(&board).await?),
            }
        }
        Command::Shuffle {
            board,
            node,
            through,
        } => {
            let mut admin = registrar.board_admin().await;
            admin.shuffle_and_move(&node, &board, through.iter().cloned()).await?;
            println!("{node}: shuffled {board} through {}", through.join(", "));
        }
    }

    Ok(())
}
