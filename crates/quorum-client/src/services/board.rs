use crate::error::Result;
use crate::registry::{AdminServicesConnection, BroadcastReplies};
use quorum_core::payload::{BoardRequest, ShuffleRequest};
use quorum_core::{Capability, CommandOp, MessageReply, Payload};
use std::collections::BTreeSet;

/// Board administration across every configured node.
#[derive(Debug)]
pub struct BoardAdmin {
    admin: AdminServicesConnection,
}

impl BoardAdmin {
    pub fn new(admin: AdminServicesConnection) -> Self {
        Self { admin }
    }

    /// Every capability any registered node declared.
    pub fn list_capabilities(&self) -> &BTreeSet<Capability> {
        self.admin.capabilities()
    }

    /// Send a raw command to one node. Error replies are returned as-is.
    pub async fn send_command(
        &mut self,
        node: &str,
        command: CommandOp,
        payload: Payload,
    ) -> Result<MessageReply> {
        self.admin.send_to(node, command, payload).await
    }

    pub async fn activate(&mut self, node: &str, board: &str) -> Result<()> {
        self.board_command(node, CommandOp::ActivateBoard, board)
            .await
    }

    pub async fn suspend(&mut self, node: &str, board: &str) -> Result<()> {
        self.board_command(node, CommandOp::SuspendBoard, board)
            .await
    }

    /// Shuffle `board` on `node` and move it through `nodes` in order.
    pub async fn shuffle_and_move<I, S>(&mut self, node: &str, board: &str, nodes: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let request = ShuffleRequest {
            board: board.to_string(),
            nodes: nodes.into_iter().map(Into::into).collect(),
        };
        let reply = self
            .admin
            .send_threshold_to(node, CommandOp::ShuffleAndMoveBoard, Payload::encode(&request)?)
            .await?;
        reply.into_result()?;
        Ok(())
    }

    /// Activate `board` on every registered node.
    pub async fn activate_everywhere(&mut self, board: &str) -> Result<BroadcastReplies> {
        let payload = board_payload(board)?;
        Ok(self.admin.send_to_all(CommandOp::ActivateBoard, payload).await)
    }

    /// Suspend `board` on every registered node.
    pub async fn suspend_everywhere(&mut self, board: &str) -> Result<BroadcastReplies> {
        let payload = board_payload(board)?;
        Ok(self.admin.send_to_all(CommandOp::SuspendBoard, payload).await)
    }

    pub fn admin(&self) -> &AdminServicesConnection {
        &self.admin
    }

    pub async fn shutdown(&mut self) {
        self.admin.shutdown().await;
    }

    async fn board_command(&mut self, node: &str, op: CommandOp, board: &str) -> Result<()> {
        let reply = self.admin.send_to(node, op, board_payload(board)?).await?;
        reply.into_result()?;
        tracing::info!("{} {} on {}", op.as_str(), board, node);
        Ok(())
    }
}

fn board_payload(board: &str) -> Result<Payload> {
    Ok(Payload::encode(&BoardRequest {
        board: board.to_string(),
    })?)
}
