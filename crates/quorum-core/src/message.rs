//! Protocol envelopes.
//!
//! A request is either a client message or a command (administrative)
//! message. Both carry an operation type and an opaque payload; nodes answer
//! each request with exactly one [`MessageReply`].
//!
//! Operation types travel as their ordinal value. New operations are appended
//! with the next unused value and existing values never change, otherwise
//! nodes and clients built from different revisions disagree on what a frame
//! means. The same holds for the variant order of [`Message`] and
//! [`ReplyStatus`].

use crate::payload::Payload;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Operations a client may ask a node to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
#[repr(u32)]
pub enum ClientOp {
    UploadToBoard = 0,
    GenerateKeyPair = 1,
    FetchPublicKey = 2,
    CreateSignature = 3,
}

impl ClientOp {
    /// Every client operation, in wire order.
    pub const ALL: [ClientOp; 4] = [
        ClientOp::UploadToBoard,
        ClientOp::GenerateKeyPair,
        ClientOp::FetchPublicKey,
        ClientOp::CreateSignature,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ClientOp::UploadToBoard => "upload_to_board",
            ClientOp::GenerateKeyPair => "generate_key_pair",
            ClientOp::FetchPublicKey => "fetch_public_key",
            ClientOp::CreateSignature => "create_signature",
        }
    }
}

impl From<ClientOp> for u32 {
    fn from(op: ClientOp) -> Self {
        op as u32
    }
}

impl TryFrom<u32> for ClientOp {
    type Error = UnknownDiscriminant;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        ClientOp::ALL
            .into_iter()
            .find(|op| *op as u32 == value)
            .ok_or(UnknownDiscriminant {
                kind: "client operation",
                value,
            })
    }
}

/// Administrative operations, addressed to specific nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
#[repr(u32)]
pub enum CommandOp {
    ActivateBoard = 0,
    SuspendBoard = 1,
    ShuffleAndMoveBoard = 2,
}

impl CommandOp {
    /// Every command operation, in wire order.
    pub const ALL: [CommandOp; 3] = [
        CommandOp::ActivateBoard,
        CommandOp::SuspendBoard,
        CommandOp::ShuffleAndMoveBoard,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CommandOp::ActivateBoard => "activate_board",
            CommandOp::SuspendBoard => "suspend_board",
            CommandOp::ShuffleAndMoveBoard => "shuffle_and_move_board",
        }
    }
}

impl From<CommandOp> for u32 {
    fn from(op: CommandOp) -> Self {
        op as u32
    }
}

impl TryFrom<u32> for CommandOp {
    type Error = UnknownDiscriminant;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        CommandOp::ALL
            .into_iter()
            .find(|op| *op as u32 == value)
            .ok_or(UnknownDiscriminant {
                kind: "command operation",
                value,
            })
    }
}

/// A discriminant on the wire that this build does not know about.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} discriminant: {value}")]
pub struct UnknownDiscriminant {
    pub kind: &'static str,
    pub value: u32,
}

/// An operation type of either category.
///
/// The category decides which envelope a request is wrapped in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Client(ClientOp),
    Command(CommandOp),
}

impl From<ClientOp> for MessageType {
    fn from(op: ClientOp) -> Self {
        MessageType::Client(op)
    }
}

impl From<CommandOp> for MessageType {
    fn from(op: CommandOp) -> Self {
        MessageType::Command(op)
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageType::Client(op) => write!(f, "client:{}", op.as_str()),
            MessageType::Command(op) => write!(f, "command:{}", op.as_str()),
        }
    }
}

/// A client request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientMessage {
    op: ClientOp,
    payload: Payload,
}

impl ClientMessage {
    pub fn new(op: ClientOp, payload: Payload) -> Self {
        Self { op, payload }
    }

    pub fn op(&self) -> ClientOp {
        self.op
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }
}

/// An administrative request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandMessage {
    op: CommandOp,
    payload: Payload,
}

impl CommandMessage {
    pub fn new(op: CommandOp, payload: Payload) -> Self {
        Self { op, payload }
    }

    pub fn op(&self) -> CommandOp {
        self.op
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }
}

/// Request envelope sent from client to node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    Client(ClientMessage),
    Command(CommandMessage),
}

impl Message {
    /// Wrap a payload in the envelope matching the operation's category.
    pub fn new(op: impl Into<MessageType>, payload: Payload) -> Self {
        match op.into() {
            MessageType::Client(op) => Message::Client(ClientMessage::new(op, payload)),
            MessageType::Command(op) => Message::Command(CommandMessage::new(op, payload)),
        }
    }

    pub fn message_type(&self) -> MessageType {
        match self {
            Message::Client(m) => MessageType::Client(m.op),
            Message::Command(m) => MessageType::Command(m.op),
        }
    }

    pub fn payload(&self) -> &Payload {
        match self {
            Message::Client(m) => &m.payload,
            Message::Command(m) => &m.payload,
        }
    }
}

/// Outcome reported by a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplyStatus {
    Ok,
    Error,
}

/// Reply envelope sent from node to client.
///
/// An `Error` reply means the node understood the request but could not
/// satisfy it. Its payload is the UTF-8 reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageReply {
    status: ReplyStatus,
    payload: Payload,
}

impl MessageReply {
    pub fn ok(payload: Payload) -> Self {
        Self {
            status: ReplyStatus::Ok,
            payload,
        }
    }

    pub fn error(reason: impl Into<String>) -> Self {
        Self {
            status: ReplyStatus::Error,
            payload: Payload::new(reason.into().into_bytes()),
        }
    }

    pub fn status(&self) -> ReplyStatus {
        self.status
    }

    pub fn is_ok(&self) -> bool {
        self.status == ReplyStatus::Ok
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Split the reply into its payload or the node's stated failure.
    pub fn into_result(self) -> Result<Payload, ServiceError> {
        match self.status {
            ReplyStatus::Ok => Ok(self.payload),
            ReplyStatus::Error => Err(ServiceError {
                reason: String::from_utf8_lossy(self.payload.as_bytes()).into_owned(),
            }),
        }
    }
}

/// A node's refusal, carried inside a well-formed reply.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("node refused request: {reason}")]
pub struct ServiceError {
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode, encode};

    #[test]
    fn operation_discriminants_are_pinned() {
        // Appending is fine; renumbering breaks every deployed node.
        let client: Vec<u32> = ClientOp::ALL.iter().map(|op| u32::from(*op)).collect();
        assert_eq!(client, vec![0, 1, 2, 3]);
        let command: Vec<u32> = CommandOp::ALL.iter().map(|op| u32::from(*op)).collect();
        assert_eq!(command, vec![0, 1, 2]);
    }

    #[test]
    fn operation_encodes_as_ordinal() {
        assert_eq!(encode(&ClientOp::UploadToBoard).unwrap(), vec![0]);
        assert_eq!(encode(&ClientOp::CreateSignature).unwrap(), vec![3]);
        assert_eq!(encode(&CommandOp::ShuffleAndMoveBoard).unwrap(), vec![2]);
    }

    #[test]
    fn envelope_layout() {
        let msg = Message::new(CommandOp::SuspendBoard, Payload::new(vec![0xAA, 0xBB]));
        // variant, operation, payload length, payload bytes
        assert_eq!(encode(&msg).unwrap(), vec![1, 1, 2, 0xAA, 0xBB]);
    }

    #[test]
    fn category_follows_operation_type() {
        let msg = Message::new(ClientOp::FetchPublicKey, Payload::empty());
        assert!(matches!(msg, Message::Client(ref m) if m.op() == ClientOp::FetchPublicKey));

        let msg = Message::new(CommandOp::ActivateBoard, Payload::empty());
        assert!(matches!(msg, Message::Command(ref m) if m.op() == CommandOp::ActivateBoard));
        assert_eq!(
            msg.message_type(),
            MessageType::Command(CommandOp::ActivateBoard)
        );
    }

    #[test]
    fn unknown_operation_is_rejected() {
        assert_eq!(
            ClientOp::try_from(4),
            Err(UnknownDiscriminant {
                kind: "client operation",
                value: 4
            })
        );
        let err = decode::<Message>(&[0, 9, 0]).unwrap_err();
        assert!(err.to_string().contains("unknown client operation discriminant: 9"));
    }

    #[test]
    fn error_reply_carries_reason() {
        let reply = MessageReply::error("board is suspended");
        assert!(!reply.is_ok());
        let err = reply.into_result().unwrap_err();
        assert_eq!(err.reason, "board is suspended");
    }

    #[test]
    fn display_names_category() {
        assert_eq!(
            MessageType::from(ClientOp::UploadToBoard).to_string(),
            "client:upload_to_board"
        );
        assert_eq!(
            MessageType::from(CommandOp::ActivateBoard).to_string(),
            "command:activate_board"
        );
    }
}
