//! Core types and traits for quorum.
//!
//! This crate provides the protocol primitives shared by clients and nodes:
//! request and reply envelopes, the identity a node announces when a client
//! connects, and the contract node-side services implement. Operation payloads
//! are opaque here; the typed payloads in [`payload`] are conventions the
//! bundled services agree on.

mod capability;
pub mod codec;
mod message;
pub mod payload;
mod service;

pub use capability::{Capability, CapabilityKind, Detail, NodeInfo, union_capabilities};
pub use codec::{Codec, CodecError};
pub use message::{
    ClientMessage, ClientOp, CommandMessage, CommandOp, Message, MessageReply, MessageType,
    ReplyStatus, ServiceError, UnknownDiscriminant,
};
pub use payload::{Algorithm, Payload, UnknownAlgorithm};
pub use service::Service;

/// Lifecycle of a client's link to one node.
///
/// `Closed` is terminal: a closed connection is never brought back to `Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Dialing the node and waiting for its identity announcement.
    Connecting,
    /// Identity known; requests may be sent.
    Ready,
    /// Transport failed or was shut down.
    Closed,
}
