//! Contract between a node and the services it hosts.

use crate::{Capability, Message, MessageReply, MessageType};

/// A node-side service.
///
/// The node announces every hosted service's [`capability`](Service::capability)
/// in its handshake, and hands each request to the first service that
/// [`accepts`](Service::accepts) its operation type. Failures a service
/// understands are reported as [`MessageReply::error`], never as transport
/// errors.
pub trait Service: Send + Sync {
    fn capability(&self) -> Capability;

    fn accepts(&self, op: MessageType) -> bool;

    fn handle(&self, message: &Message) -> MessageReply;
}
