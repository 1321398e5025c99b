//! Client side of quorum.
//!
//! A client holds a list of nodes and reaches them in one of three ways:
//!
//! - **single**: [`ServicesConnection`] talks to the first reachable node and
//!   sticks with it.
//! - **admin/broadcast**: [`AdminServicesConnection`] connects to every node
//!   and addresses them by the name each announced.
//! - **threshold**: the `send_threshold*` variants of both. On the wire these
//!   are ordinary requests; the quorum itself is checked by
//!   [`SignatureGenerationOptions`] and [`KeyGenerationOptions`] before
//!   anything is sent.
//!
//! Failed connections are never reopened. The [`Registrar`] builds fresh
//! registries and the façades in [`services`] from a [`ClientConfig`].

pub mod config;
mod connection;
mod error;
pub mod options;
mod registrar;
mod registry;
pub mod select;
pub mod services;

pub use config::{ClientConfig, ConnectionSettings, NodeConfig, NodeEndpoint};
pub use connection::NodeConnection;
pub use error::{ConfigError, ConnectionError, Error, Phase, Result};
pub use options::{KeyGenerationOptions, SignatureGenerationOptions, ValidationError};
pub use registrar::Registrar;
pub use registry::{AdminServicesConnection, BroadcastReplies, ServicesConnection};
pub use select::{FirstCandidate, RandomStart, RoundRobin, SelectionPolicy};
