//! Client error types.

use crate::options::ValidationError;
use quorum_core::{CodecError, ServiceError};
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio_tungstenite::tungstenite;

/// Where a connection was when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Connect,
    Handshake,
    Send,
    Receive,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Connect => "connect",
            Phase::Handshake => "handshake",
            Phase::Send => "send",
            Phase::Receive => "receive",
        })
    }
}

/// Failure to reach a node or to complete an exchange with it.
///
/// Apart from `Encode`, every variant raised by a ready connection leaves it
/// closed. Nothing in this crate retries.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("failed to connect to {address}: {source}")]
    Connect {
        address: SocketAddr,
        #[source]
        source: Box<tungstenite::Error>,
    },
    #[error("{target}: timed out during {phase}")]
    Timeout { target: String, phase: Phase },
    #[error("{target}: transport error: {source}")]
    Transport {
        target: String,
        #[source]
        source: Box<tungstenite::Error>,
    },
    #[error("{target}: connection closed by peer")]
    Disconnected { target: String },
    #[error("{target}: unexpected non-binary frame")]
    UnexpectedFrame { target: String },
    #[error("{target}: {source}")]
    Decode {
        target: String,
        #[source]
        source: CodecError,
    },
    #[error("{node}: request not encodable: {source}")]
    Encode {
        node: String,
        #[source]
        source: CodecError,
    },
    #[error("{node}: connection is closed")]
    Closed { node: String },
    #[error("no connection available")]
    NoConnection,
    #[error("node name {name} is already registered, rejecting {address}")]
    DuplicateName { name: String, address: SocketAddr },
}

/// Problem with the node list or a single entry in it.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid node configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("cannot resolve {endpoint}: {reason}")]
    Resolve { endpoint: String, reason: String },
}

/// Any error a façade or registry call can return.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    #[error("no node named {0}")]
    NotFound(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error("unexpected reply payload: {0}")]
    Payload(#[from] CodecError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
