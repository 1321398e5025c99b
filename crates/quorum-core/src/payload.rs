//! Operation payloads.
//!
//! The envelope treats its payload as opaque bytes. The structs here are the
//! payload conventions shared by the bundled client façades and node services.

use crate::codec::{self, CodecError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Opaque encoded operation payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Payload(Vec<u8>);

impl Payload {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Encode a typed value as a payload.
    pub fn encode<T: Serialize>(value: &T) -> Result<Self, CodecError> {
        codec::encode(value).map(Self)
    }

    /// Decode the payload as a typed value.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, CodecError> {
        codec::decode(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

/// Key and signature algorithms nodes may run.
///
/// Travels as its ordinal; append only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
#[repr(u32)]
pub enum Algorithm {
    EcElGamal = 0,
    Ecdsa = 1,
    Bls = 2,
}

impl Algorithm {
    pub const ALL: [Algorithm; 3] = [Algorithm::EcElGamal, Algorithm::Ecdsa, Algorithm::Bls];

    /// Whether signing needs a secret multiplication, which doubles the
    /// number of nodes required to meet a threshold.
    pub fn requires_secret_multiplication(&self) -> bool {
        matches!(self, Algorithm::Ecdsa)
    }

    /// Smallest node set able to run the algorithm at `threshold`.
    pub fn min_nodes(&self, threshold: usize) -> usize {
        if self.requires_secret_multiplication() {
            threshold.saturating_mul(2)
        } else {
            threshold
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::EcElGamal => "ec-elgamal",
            Algorithm::Ecdsa => "ecdsa",
            Algorithm::Bls => "bls",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = UnknownAlgorithm;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Algorithm::ALL
            .into_iter()
            .find(|alg| alg.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownAlgorithm(s.to_string()))
    }
}

/// Error parsing an algorithm name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown algorithm: {0}")]
pub struct UnknownAlgorithm(pub String);

impl From<Algorithm> for u32 {
    fn from(alg: Algorithm) -> Self {
        alg as u32
    }
}

impl TryFrom<u32> for Algorithm {
    type Error = crate::UnknownDiscriminant;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Algorithm::ALL
            .into_iter()
            .find(|alg| *alg as u32 == value)
            .ok_or(crate::UnknownDiscriminant {
                kind: "algorithm",
                value,
            })
    }
}

/// Post a message to a board (`UploadToBoard`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRequest {
    pub board: String,
    pub data: Vec<u8>,
}

/// Address a board by name (`ActivateBoard`, `SuspendBoard`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardRequest {
    pub board: String,
}

/// Shuffle a board's contents and hand them to the listed nodes in order
/// (`ShuffleAndMoveBoard`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShuffleRequest {
    pub board: String,
    pub nodes: Vec<String>,
}

/// Ask the nodes in `nodes` to jointly generate a key (`GenerateKeyPair`).
///
/// Thresholds are `u32` on the wire so nodes with different pointer widths
/// agree on the encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyGenerationRequest {
    pub key_id: String,
    pub algorithm: Algorithm,
    pub parameters: Vec<String>,
    pub threshold: u32,
    pub nodes: Vec<String>,
}

/// Look up a previously generated key (`FetchPublicKey`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyRequest {
    pub key_id: String,
}

/// Public half of a generated key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyReply {
    pub key_id: String,
    pub algorithm: Algorithm,
    pub threshold: u32,
    pub public_key: Vec<u8>,
}

/// Ask a quorum to sign `message` under `key_id` (`CreateSignature`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureRequest {
    pub key_id: String,
    pub algorithm: Algorithm,
    pub parameters: Vec<String>,
    pub threshold: u32,
    pub nodes: Vec<String>,
    pub message: Vec<u8>,
}

/// What the coordinating node reports back for a signing request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningReceipt {
    pub key_id: String,
    pub coordinator: String,
    pub nodes: Vec<String>,
    pub signature: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ecdsa_doubles_the_quorum() {
        assert_eq!(Algorithm::Ecdsa.min_nodes(3), 6);
        assert_eq!(Algorithm::Bls.min_nodes(3), 3);
        assert_eq!(Algorithm::EcElGamal.min_nodes(0), 0);
        assert_eq!(Algorithm::Ecdsa.min_nodes(usize::MAX), usize::MAX);
    }

    #[test]
    fn parse_algorithm() {
        assert_eq!("ECDSA".parse::<Algorithm>().unwrap(), Algorithm::Ecdsa);
        assert_eq!("ec-elgamal".parse::<Algorithm>().unwrap(), Algorithm::EcElGamal);
        assert!("rsa".parse::<Algorithm>().is_err());
    }

    #[test]
    fn typed_payload_roundtrip() {
        let req = ShuffleRequest {
            board: "ballots".into(),
            nodes: vec!["a".into(), "b".into()],
        };
        let payload = Payload::encode(&req).unwrap();
        assert_eq!(payload.decode::<ShuffleRequest>().unwrap(), req);
    }

    #[test]
    fn payload_of_wrong_shape_is_rejected() {
        let payload = Payload::encode(&BoardRequest {
            board: "ballots".into(),
        })
        .unwrap();
        assert!(payload.decode::<SignatureRequest>().is_err());
    }
}
