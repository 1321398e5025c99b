use super::decode_reply;
use crate::error::Result;
use crate::options::{KeyGenerationOptions, SignatureGenerationOptions};
use crate::registry::ServicesConnection;
use quorum_core::payload::{PublicKeyReply, PublicKeyRequest, SigningReceipt};
use quorum_core::{ClientOp, Payload};

/// Generates threshold keys and looks up their public halves.
#[derive(Debug)]
pub struct KeyGenerationClient {
    connection: ServicesConnection,
}

impl KeyGenerationClient {
    pub fn new(connection: ServicesConnection) -> Self {
        Self { connection }
    }

    /// Ask the nodes named in `options` to generate a key under `key_id`.
    pub async fn generate_key(
        &mut self,
        key_id: &str,
        options: &KeyGenerationOptions,
    ) -> Result<PublicKeyReply> {
        let payload = Payload::encode(&options.request(key_id))?;
        let reply = self
            .connection
            .send_threshold(ClientOp::GenerateKeyPair, payload)
            .await?;
        let key: PublicKeyReply = decode_reply(reply)?;
        tracing::info!(
            "Generated {} key {} across {} nodes",
            key.algorithm,
            key.key_id,
            options.nodes().len()
        );
        Ok(key)
    }

    pub async fn fetch_public_key(&mut self, key_id: &str) -> Result<PublicKeyReply> {
        let request = PublicKeyRequest {
            key_id: key_id.to_string(),
        };
        let reply = self
            .connection
            .send(ClientOp::FetchPublicKey, Payload::encode(&request)?)
            .await?;
        decode_reply(reply)
    }

    pub async fn shutdown(&mut self) {
        self.connection.shutdown().await;
    }
}

/// Requests threshold signatures.
#[derive(Debug)]
pub struct SigningClient {
    connection: ServicesConnection,
}

impl SigningClient {
    pub fn new(connection: ServicesConnection) -> Self {
        Self { connection }
    }

    /// Sign `message` with the key `key_id` using the quorum in `options`.
    pub async fn sign(
        &mut self,
        key_id: &str,
        options: &SignatureGenerationOptions,
        message: &[u8],
    ) -> Result<SigningReceipt> {
        let payload = Payload::encode(&options.request(key_id, message))?;
        let reply = self
            .connection
            .send_threshold(ClientOp::CreateSignature, payload)
            .await?;
        decode_reply(reply)
    }

    pub async fn shutdown(&mut self) {
        self.connection.shutdown().await;
    }
}
