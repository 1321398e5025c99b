//! Bulletin boards: upload, suspension and shuffle bookkeeping.

use parking_lot::Mutex;
use quorum_core::payload::{BoardRequest, ShuffleRequest, UploadRequest};
use quorum_core::{
    Capability, CapabilityKind, ClientOp, CommandOp, Detail, Message, MessageReply, MessageType,
    Payload, Service,
};
use rand::seq::SliceRandom;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardState {
    Active,
    Suspended,
}

/// Snapshot of one board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    pub state: BoardState,
    pub messages: Vec<Vec<u8>>,
    /// Nodes the board was last sent through, in order.
    pub transit: Vec<String>,
}

impl Board {
    fn new() -> Self {
        Self {
            state: BoardState::Active,
            messages: Vec::new(),
            transit: Vec::new(),
        }
    }
}

/// Boards held by one node, shared by the upload and command services.
#[derive(Debug, Default)]
pub struct BoardStore {
    boards: Mutex<BTreeMap<String, Board>>,
}

impl BoardStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn board(&self, name: &str) -> Option<Board> {
        self.boards.lock().get(name).cloned()
    }

    pub fn board_names(&self) -> Vec<String> {
        self.boards.lock().keys().cloned().collect()
    }

    /// Append to `board`, creating it on first use. Suspended boards refuse
    /// uploads.
    pub fn upload(&self, board: &str, data: Vec<u8>) -> Result<usize, String> {
        let mut boards = self.boards.lock();
        let entry = boards.entry(board.to_string()).or_insert_with(Board::new);
        if entry.state == BoardState::Suspended {
            return Err(format!("board {board} is suspended"));
        }
        entry.messages.push(data);
        Ok(entry.messages.len())
    }

    pub fn activate(&self, board: &str) {
        let mut boards = self.boards.lock();
        boards
            .entry(board.to_string())
            .or_insert_with(Board::new)
            .state = BoardState::Active;
    }

    pub fn suspend(&self, board: &str) -> Result<(), String> {
        let mut boards = self.boards.lock();
        let entry = boards
            .get_mut(board)
            .ok_or_else(|| format!("unknown board {board}"))?;
        entry.state = BoardState::Suspended;
        Ok(())
    }

    /// Shuffle a suspended board's messages and record the nodes it moves
    /// through.
    pub fn shuffle_and_move(&self, board: &str, nodes: Vec<String>) -> Result<(), String> {
        if nodes.is_empty() {
            return Err("no nodes to move the board through".to_string());
        }
        let mut boards = self.boards.lock();
        let entry = boards
            .get_mut(board)
            .ok_or_else(|| format!("unknown board {board}"))?;
        if entry.state != BoardState::Suspended {
            return Err(format!("board {board} must be suspended before shuffling"));
        }
        entry.messages.shuffle(&mut rand::thread_rng());
        entry.transit = nodes;
        Ok(())
    }
}

/// Accepts `UploadToBoard`.
#[derive(Debug, Clone)]
pub struct UploadService {
    store: Arc<BoardStore>,
}

impl UploadService {
    pub fn new(store: Arc<BoardStore>) -> Self {
        Self { store }
    }
}

impl Service for UploadService {
    fn capability(&self) -> Capability {
        Capability::new(CapabilityKind::Upload)
    }

    fn accepts(&self, op: MessageType) -> bool {
        op == MessageType::Client(ClientOp::UploadToBoard)
    }

    fn handle(&self, message: &Message) -> MessageReply {
        let request: UploadRequest = match message.payload().decode() {
            Ok(request) => request,
            Err(e) => return MessageReply::error(format!("bad upload request: {e}")),
        };
        match self.store.upload(&request.board, request.data) {
            Ok(count) => {
                tracing::debug!("Board {} now holds {} messages", request.board, count);
                MessageReply::ok(Payload::empty())
            }
            Err(reason) => MessageReply::error(reason),
        }
    }
}

/// Accepts the board commands.
#[derive(Debug, Clone)]
pub struct BoardCommandService {
    store: Arc<BoardStore>,
}

impl BoardCommandService {
    pub fn new(store: Arc<BoardStore>) -> Self {
        Self { store }
    }
}

impl Service for BoardCommandService {
    fn capability(&self) -> Capability {
        Capability::with_details(
            CapabilityKind::BoardManagement,
            CommandOp::ALL
                .iter()
                .map(|op| Detail::Text(op.as_str().to_string()))
                .collect(),
        )
    }

    fn accepts(&self, op: MessageType) -> bool {
        matches!(op, MessageType::Command(_))
    }

    fn handle(&self, message: &Message) -> MessageReply {
        let MessageType::Command(op) = message.message_type() else {
            return MessageReply::error("not a board command");
        };
        let outcome = match op {
            CommandOp::ActivateBoard => message
                .payload()
                .decode::<BoardRequest>()
                .map_err(|e| e.to_string())
                .map(|r| self.store.activate(&r.board)),
            CommandOp::SuspendBoard => message
                .payload()
                .decode::<BoardRequest>()
                .map_err(|e| e.to_string())
                .and_then(|r| self.store.suspend(&r.board)),
            CommandOp::ShuffleAndMoveBoard => message
                .payload()
                .decode::<ShuffleRequest>()
                .map_err(|e| e.to_string())
                .and_then(|r| self.store.shuffle_and_move(&r.board, r.nodes)),
        };
        match outcome {
            Ok(()) => MessageReply::ok(Payload::empty()),
            Err(reason) => {
                tracing::debug!("{} refused: {}", op.as_str(), reason);
                MessageReply::error(reason)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request<T: serde::Serialize>(op: impl Into<MessageType>, body: &T) -> Message {
        Message::new(op, Payload::encode(body).unwrap())
    }

    fn board(name: &str) -> BoardRequest {
        BoardRequest {
            board: name.to_string(),
        }
    }

    #[test]
    fn suspended_board_refuses_uploads() {
        let store = BoardStore::new();
        let uploads = UploadService::new(store.clone());
        let commands = BoardCommandService::new(store.clone());

        let upload = request(
            ClientOp::UploadToBoard,
            &UploadRequest {
                board: "votes".into(),
                data: b"ballot".to_vec(),
            },
        );
        assert!(uploads.handle(&upload).is_ok());
        assert!(commands.handle(&request(CommandOp::SuspendBoard, &board("votes"))).is_ok());

        let reply = uploads.handle(&upload);
        assert_eq!(reply.into_result().unwrap_err().reason, "board votes is suspended");

        assert!(commands.handle(&request(CommandOp::ActivateBoard, &board("votes"))).is_ok());
        assert!(uploads.handle(&upload).is_ok());
        assert_eq!(store.board("votes").unwrap().messages.len(), 2);
    }

    #[test]
    fn suspending_unknown_board_fails() {
        let commands = BoardCommandService::new(BoardStore::new());
        let reply = commands.handle(&request(CommandOp::SuspendBoard, &board("nope")));
        assert_eq!(reply.into_result().unwrap_err().reason, "unknown board nope");
    }

    #[test]
    fn shuffle_keeps_messages_and_records_transit() {
        let store = BoardStore::new();
        for i in 0..10u8 {
            store.upload("votes", vec![i]).unwrap();
        }
        let shuffle = ShuffleRequest {
            board: "votes".into(),
            nodes: vec!["b".into(), "c".into()],
        };
        let commands = BoardCommandService::new(store.clone());

        // must be suspended first
        assert!(!commands.handle(&request(CommandOp::ShuffleAndMoveBoard, &shuffle)).is_ok());

        store.suspend("votes").unwrap();
        assert!(commands.handle(&request(CommandOp::ShuffleAndMoveBoard, &shuffle)).is_ok());

        let board = store.board("votes").unwrap();
        let mut messages = board.messages.clone();
        messages.sort();
        assert_eq!(messages, (0..10u8).map(|i| vec![i]).collect::<Vec<_>>());
        assert_eq!(board.transit, vec!["b", "c"]);
    }

    #[test]
    fn malformed_payload_is_an_error_reply() {
        let uploads = UploadService::new(BoardStore::new());
        let reply = uploads.handle(&Message::new(ClientOp::UploadToBoard, Payload::new(vec![0xFF])));
        assert!(!reply.is_ok());
    }

    #[test]
    fn command_capability_lists_operations() {
        let capability = BoardCommandService::new(BoardStore::new()).capability();
        assert_eq!(capability.kind(), CapabilityKind::BoardManagement);
        assert_eq!(capability.details().len(), CommandOp::ALL.len());
    }
}
