//! Typed façades over the registries.
//!
//! Each façade turns one family of operations into plain method calls: it
//! encodes the typed payload, picks the dispatch mode the operation needs and
//! turns error replies into [`Error::Service`](crate::Error::Service).

mod board;
mod keys;
mod upload;

pub use board::BoardAdmin;
pub use keys::{KeyGenerationClient, SigningClient};
pub use upload::UploadClient;

use crate::error::Result;
use quorum_core::MessageReply;
use serde::de::DeserializeOwned;

/// Unwrap an `Ok` reply and decode its payload.
fn decode_reply<T: DeserializeOwned>(reply: MessageReply) -> Result<T> {
    Ok(reply.into_result()?.decode()?)
}
