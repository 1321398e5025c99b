//! Node side of quorum.
//!
//! A [`Node`] announces its identity to every client that connects, then
//! answers one reply per request by routing each request to the first hosted
//! [`Service`](quorum_core::Service) that accepts it. The services in
//! [`services`] keep their state in memory and do bookkeeping only.

mod node;
pub mod services;

pub use node::{Node, NodeHandle};
