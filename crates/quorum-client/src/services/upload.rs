use crate::error::Result;
use crate::registry::ServicesConnection;
use quorum_core::payload::UploadRequest;
use quorum_core::{ClientOp, Payload};

/// Posts messages to boards through a single node.
#[derive(Debug)]
pub struct UploadClient {
    connection: ServicesConnection,
}

impl UploadClient {
    pub fn new(connection: ServicesConnection) -> Self {
        Self { connection }
    }

    /// Append `data` to `board`.
    pub async fn upload(&mut self, board: &str, data: impl Into<Vec<u8>>) -> Result<()> {
        let request = UploadRequest {
            board: board.to_string(),
            data: data.into(),
        };
        let reply = self
            .connection
            .send(ClientOp::UploadToBoard, Payload::encode(&request)?)
            .await?;
        reply.into_result()?;
        tracing::debug!("Uploaded to board {}", board);
        Ok(())
    }

    pub fn connection(&self) -> &ServicesConnection {
        &self.connection
    }

    pub async fn shutdown(&mut self) {
        self.connection.shutdown().await;
    }
}
