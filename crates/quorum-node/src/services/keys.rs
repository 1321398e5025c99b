//! Key registry and signing bookkeeping.
//!
//! No threshold cryptography happens here. Public keys and signatures are
//! SHA-256 digests standing in for the real values, so clients can exercise
//! the full request flow against a local cluster.

use parking_lot::RwLock;
use quorum_core::payload::{
    KeyGenerationRequest, PublicKeyReply, PublicKeyRequest, SignatureRequest, SigningReceipt,
};
use quorum_core::{
    Algorithm, Capability, CapabilityKind, ClientOp, Detail, Message, MessageReply, MessageType,
    Payload, Service,
};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A generated key as the registry remembers it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRecord {
    pub algorithm: Algorithm,
    pub threshold: u32,
    pub nodes: Vec<String>,
    pub public_key: Vec<u8>,
}

/// Keys known to a node. Several nodes of one cluster may share a store.
#[derive(Debug, Default)]
pub struct KeyStore {
    keys: RwLock<BTreeMap<String, KeyRecord>>,
}

impl KeyStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn get(&self, key_id: &str) -> Option<KeyRecord> {
        self.keys.read().get(key_id).cloned()
    }

    pub fn generate(&self, request: &KeyGenerationRequest) -> Result<KeyRecord, String> {
        let threshold = request.threshold as usize;
        if request.nodes.len() < threshold {
            return Err(format!(
                "threshold {} needs at least {} nodes, {} supplied",
                threshold,
                threshold,
                request.nodes.len()
            ));
        }

        let mut keys = self.keys.write();
        if keys.contains_key(&request.key_id) {
            return Err(format!("key {} already exists", request.key_id));
        }

        let mut hasher = Sha256::new();
        hasher.update(b"quorum-public-key");
        hasher.update(request.key_id.as_bytes());
        hasher.update(u32::from(request.algorithm).to_le_bytes());
        for node in &request.nodes {
            hasher.update(node.as_bytes());
        }

        let record = KeyRecord {
            algorithm: request.algorithm,
            threshold: request.threshold,
            nodes: request.nodes.clone(),
            public_key: hasher.finalize().to_vec(),
        };
        keys.insert(request.key_id.clone(), record.clone());
        Ok(record)
    }
}

fn algorithm_details() -> Vec<Detail> {
    Algorithm::ALL
        .iter()
        .map(|alg| Detail::Text(alg.as_str().to_string()))
        .collect()
}

fn public_key_reply(key_id: &str, record: &KeyRecord) -> MessageReply {
    let reply = PublicKeyReply {
        key_id: key_id.to_string(),
        algorithm: record.algorithm,
        threshold: record.threshold,
        public_key: record.public_key.clone(),
    };
    match Payload::encode(&reply) {
        Ok(payload) => MessageReply::ok(payload),
        Err(e) => MessageReply::error(e.to_string()),
    }
}

/// Accepts `GenerateKeyPair` and `FetchPublicKey`.
#[derive(Debug, Clone)]
pub struct KeyGenerationService {
    store: Arc<KeyStore>,
}

impl KeyGenerationService {
    pub fn new(store: Arc<KeyStore>) -> Self {
        Self { store }
    }

    fn generate(&self, message: &Message) -> MessageReply {
        let request: KeyGenerationRequest = match message.payload().decode() {
            Ok(request) => request,
            Err(e) => return MessageReply::error(format!("bad key generation request: {e}")),
        };
        match self.store.generate(&request) {
            Ok(record) => {
                tracing::info!(
                    "Generated {} key {} at threshold {}",
                    record.algorithm,
                    request.key_id,
                    record.threshold
                );
                public_key_reply(&request.key_id, &record)
            }
            Err(reason) => MessageReply::error(reason),
        }
    }

    fn fetch(&self, message: &Message) -> MessageReply {
        let request: PublicKeyRequest = match message.payload().decode() {
            Ok(request) => request,
            Err(e) => return MessageReply::error(format!("bad public key request: {e}")),
        };
        match self.store.get(&request.key_id) {
            Some(record) => public_key_reply(&request.key_id, &record),
            None => MessageReply::error(format!("unknown key {}", request.key_id)),
        }
    }
}

impl Service for KeyGenerationService {
    fn capability(&self) -> Capability {
        Capability::with_details(CapabilityKind::KeyGeneration, algorithm_details())
    }

    fn accepts(&self, op: MessageType) -> bool {
        matches!(
            op,
            MessageType::Client(ClientOp::GenerateKeyPair | ClientOp::FetchPublicKey)
        )
    }

    fn handle(&self, message: &Message) -> MessageReply {
        match message.message_type() {
            MessageType::Client(ClientOp::GenerateKeyPair) => self.generate(message),
            MessageType::Client(ClientOp::FetchPublicKey) => self.fetch(message),
            other => MessageReply::error(format!("no handler for {other}")),
        }
    }
}

/// Accepts `CreateSignature`, acting as coordinator for the request.
#[derive(Debug, Clone)]
pub struct SigningService {
    node: String,
    store: Arc<KeyStore>,
}

impl SigningService {
    pub fn new(node: impl Into<String>, store: Arc<KeyStore>) -> Self {
        Self {
            node: node.into(),
            store,
        }
    }

    fn sign(&self, request: SignatureRequest) -> Result<SigningReceipt, String> {
        let record = self
            .store
            .get(&request.key_id)
            .ok_or_else(|| format!("unknown key {}", request.key_id))?;
        if record.algorithm != request.algorithm {
            return Err(format!(
                "key {} is {}, not {}",
                request.key_id, record.algorithm, request.algorithm
            ));
        }
        let required = record.algorithm.min_nodes(record.threshold as usize);
        if request.nodes.len() < required {
            return Err(format!(
                "signing with key {} needs at least {} nodes, {} supplied",
                request.key_id,
                required,
                request.nodes.len()
            ));
        }

        let mut hasher = Sha256::new();
        hasher.update(&record.public_key);
        hasher.update(&request.message);

        Ok(SigningReceipt {
            key_id: request.key_id,
            coordinator: self.node.clone(),
            nodes: request.nodes,
            signature: hasher.finalize().to_vec(),
        })
    }
}

impl Service for SigningService {
    fn capability(&self) -> Capability {
        Capability::with_details(CapabilityKind::Signing, algorithm_details())
    }

    fn accepts(&self, op: MessageType) -> bool {
        op == MessageType::Client(ClientOp::CreateSignature)
    }

    fn handle(&self, message: &Message) -> MessageReply {
        let request: SignatureRequest = match message.payload().decode() {
            Ok(request) => request,
            Err(e) => return MessageReply::error(format!("bad signature request: {e}")),
        };
        let receipt = match self.sign(request) {
            Ok(receipt) => receipt,
            Err(reason) => return MessageReply::error(reason),
        };
        tracing::info!(
            "{} coordinated signature with key {} over {} nodes",
            self.node,
            receipt.key_id,
            receipt.nodes.len()
        );
        match Payload::encode(&receipt) {
            Ok(payload) => MessageReply::ok(payload),
            Err(e) => MessageReply::error(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generation(key_id: &str, algorithm: Algorithm, threshold: u32, nodes: usize) -> Message {
        let request = KeyGenerationRequest {
            key_id: key_id.to_string(),
            algorithm,
            parameters: vec!["secp256r1".into()],
            threshold,
            nodes: (1..=nodes).map(|i| format!("node{i}")).collect(),
        };
        Message::new(ClientOp::GenerateKeyPair, Payload::encode(&request).unwrap())
    }

    fn signature(key_id: &str, algorithm: Algorithm, nodes: usize) -> Message {
        let request = SignatureRequest {
            key_id: key_id.to_string(),
            algorithm,
            parameters: Vec::new(),
            threshold: 0,
            nodes: (1..=nodes).map(|i| format!("node{i}")).collect(),
            message: b"tally".to_vec(),
        };
        Message::new(ClientOp::CreateSignature, Payload::encode(&request).unwrap())
    }

    #[test]
    fn generate_then_fetch() {
        let keys = KeyGenerationService::new(KeyStore::new());
        let generated: PublicKeyReply = keys
            .handle(&generation("k1", Algorithm::Bls, 2, 3))
            .into_result()
            .unwrap()
            .decode()
            .unwrap();
        assert_eq!(generated.public_key.len(), 32);

        let fetch = Message::new(
            ClientOp::FetchPublicKey,
            Payload::encode(&PublicKeyRequest {
                key_id: "k1".into(),
            })
            .unwrap(),
        );
        let fetched: PublicKeyReply = keys.handle(&fetch).into_result().unwrap().decode().unwrap();
        assert_eq!(fetched, generated);
    }

    #[test]
    fn duplicate_key_is_refused() {
        let keys = KeyGenerationService::new(KeyStore::new());
        assert!(keys.handle(&generation("k1", Algorithm::Bls, 2, 3)).is_ok());
        let reply = keys.handle(&generation("k1", Algorithm::Bls, 2, 3));
        assert_eq!(reply.into_result().unwrap_err().reason, "key k1 already exists");
    }

    #[test]
    fn unknown_key_cannot_be_fetched_or_used() {
        let store = KeyStore::new();
        let keys = KeyGenerationService::new(store.clone());
        let fetch = Message::new(
            ClientOp::FetchPublicKey,
            Payload::encode(&PublicKeyRequest {
                key_id: "missing".into(),
            })
            .unwrap(),
        );
        assert!(!keys.handle(&fetch).is_ok());

        let signing = SigningService::new("node1", store);
        assert!(!signing.handle(&signature("missing", Algorithm::Bls, 3)).is_ok());
    }

    #[test]
    fn ecdsa_signing_checks_doubled_quorum() {
        let store = KeyStore::new();
        let keys = KeyGenerationService::new(store.clone());
        let signing = SigningService::new("node1", store);
        assert!(keys.handle(&generation("k1", Algorithm::Ecdsa, 3, 6)).is_ok());

        let reply = signing.handle(&signature("k1", Algorithm::Ecdsa, 5));
        assert_eq!(
            reply.into_result().unwrap_err().reason,
            "signing with key k1 needs at least 6 nodes, 5 supplied"
        );

        let receipt: SigningReceipt = signing
            .handle(&signature("k1", Algorithm::Ecdsa, 6))
            .into_result()
            .unwrap()
            .decode()
            .unwrap();
        assert_eq!(receipt.coordinator, "node1");
        assert_eq!(receipt.nodes.len(), 6);
        assert_eq!(receipt.signature.len(), 32);
    }

    #[test]
    fn algorithm_must_match_the_key() {
        let store = KeyStore::new();
        KeyGenerationService::new(store.clone()).handle(&generation("k1", Algorithm::Bls, 1, 1));
        let reply = SigningService::new("node1", store).handle(&signature("k1", Algorithm::Ecdsa, 4));
        assert_eq!(
            reply.into_result().unwrap_err().reason,
            "key k1 is bls, not ecdsa"
        );
    }

    #[test]
    fn signatures_are_deterministic_per_key_and_message() {
        let store = KeyStore::new();
        KeyGenerationService::new(store.clone()).handle(&generation("k1", Algorithm::Bls, 1, 1));
        let a = SigningService::new("node1", store.clone());
        let b = SigningService::new("node2", store);
        let sig = |s: &SigningService| -> Vec<u8> {
            s.handle(&signature("k1", Algorithm::Bls, 1))
                .into_result()
                .unwrap()
                .decode::<SigningReceipt>()
                .unwrap()
                .signature
        };
        assert_eq!(sig(&a), sig(&b));
    }
}
