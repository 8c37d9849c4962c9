//! Error types for mesh operations.

use thiserror::Error;

/// Errors surfaced to callers of mesh operations.
///
/// Relay-path conditions (duplicates, expired TTL, loops) are silent drops,
/// not errors; only user-initiated operations produce these.
#[derive(Error, Debug)]
pub enum MeshError {
    /// Wrong password for a protected channel.
    #[error("Unauthorized: wrong password for {0}")]
    Unauthorized(String),

    /// Operation requires channel membership.
    #[error("Not joined to channel {0}")]
    NotJoined(String),

    /// A payload failed to encode or decode.
    #[error("Protocol error: {0}")]
    Proto(#[from] meshit_proto::ProtoError),
}

/// Result type for mesh operations.
pub type Result<T> = std::result::Result<T, MeshError>;
