//! Error types for protocol operations.
//!
//! Frame parsing deliberately does not use these: a malformed or corrupted
//! frame is dropped, not diagnosed, so [`crate::codec::parse`] returns
//! `Option`. Errors here cover the structured payloads layered above frames.

use thiserror::Error;

/// Errors that can occur while building or decoding protocol payloads.
#[derive(Error, Debug)]
pub enum ProtoError {
    /// A JSON payload failed to encode or decode.
    #[error("Payload serialization error: {0}")]
    Payload(#[from] serde_json::Error),

    /// A base64 field failed to decode.
    #[error("Base64 error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// A packet carried the wrong type for the requested conversion.
    #[error("Unexpected packet type: expected {expected}, got {actual}")]
    UnexpectedType {
        /// The packet type the caller asked for.
        expected: &'static str,
        /// The type actually found.
        actual: String,
    },

    /// A chunk was malformed or inconsistent with its message.
    #[error("Chunk error: {0}")]
    Chunk(String),

    /// The configured MTU cannot fit a chunk header plus data.
    #[error("MTU too small: {0} bytes")]
    MtuTooSmall(usize),
}

/// Result type for protocol operations.
pub type Result<T> = std::result::Result<T, ProtoError>;
