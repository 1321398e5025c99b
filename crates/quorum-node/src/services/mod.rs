//! In-memory reference services.

mod boards;
mod keys;

pub use boards::{Board, BoardCommandService, BoardState, BoardStore, UploadService};
pub use keys::{KeyGenerationService, KeyRecord, KeyStore, SigningService};

use crate::Node;
use std::sync::Arc;

/// A node hosting every reference service over fresh stores.
pub fn reference_node(name: impl Into<String>) -> Node {
    reference_node_with(name, BoardStore::new(), KeyStore::new())
}

/// A node hosting every reference service over the given stores.
///
/// Nodes of one local cluster can share a [`KeyStore`] so that a key
/// generated through one node can be used through any other.
pub fn reference_node_with(
    name: impl Into<String>,
    boards: Arc<BoardStore>,
    keys: Arc<KeyStore>,
) -> Node {
    let name = name.into();
    Node::new(name.clone())
        .with_service(UploadService::new(boards.clone()))
        .with_service(BoardCommandService::new(boards))
        .with_service(KeyGenerationService::new(keys.clone()))
        .with_service(SigningService::new(name, keys))
}
