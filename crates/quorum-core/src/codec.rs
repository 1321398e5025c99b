//! Binary encoding of envelopes.
//!
//! Envelopes are encoded with bincode's varint format. Enum discriminants are
//! written as their ordinal and every variable-length field is length
//! prefixed, so an encoding is never a prefix of another one: cutting bytes off
//! the end of a valid frame always fails to decode.

use bincode::Options;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Largest envelope accepted by default.
pub const DEFAULT_MAX_ENVELOPE_LEN: u64 = 1024 * 1024;

/// Error encoding or decoding an envelope.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("envelope truncated")]
    Truncated,
    #[error("envelope exceeds {limit} bytes")]
    TooLarge { limit: u64 },
    #[error("malformed envelope: {0}")]
    Malformed(String),
}

/// Envelope codec with a size limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Codec {
    limit: u64,
}

impl Default for Codec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENVELOPE_LEN)
    }
}

impl Codec {
    pub fn new(limit: u64) -> Self {
        Self { limit }
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        self.options()
            .serialize(value)
            .map_err(|e| self.classify(e))
    }

    pub fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        if bytes.len() as u64 > self.limit {
            return Err(CodecError::TooLarge { limit: self.limit });
        }
        self.options()
            .deserialize(bytes)
            .map_err(|e| self.classify(e))
    }

    fn options(&self) -> impl Options {
        bincode::DefaultOptions::new()
            .with_varint_encoding()
            .with_limit(self.limit)
            .reject_trailing_bytes()
    }

    fn classify(&self, err: bincode::Error) -> CodecError {
        match *err {
            bincode::ErrorKind::Io(io) if io.kind() == std::io::ErrorKind::UnexpectedEof => {
                CodecError::Truncated
            }
            bincode::ErrorKind::SizeLimit => CodecError::TooLarge { limit: self.limit },
            other => CodecError::Malformed(other.to_string()),
        }
    }
}

/// Encode with the default limit.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CodecError> {
    Codec::default().encode(value)
}

/// Decode with the default limit.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    Codec::default().decode(bytes)
}
