//! Error types for session management.

use thiserror::Error;

/// Errors that can occur during session operations.
#[derive(Error, Debug)]
pub enum SessionError {
    /// No established session exists for the peer.
    ///
    /// Callers typically react by queueing the payload via
    /// store-and-forward and initiating a handshake.
    #[error("No established session with peer {0}")]
    NoSession(String),

    /// A handshake message arrived with no matching pending state.
    #[error("No pending handshake with peer {0}")]
    NoPendingHandshake(String),

    /// The underlying cryptographic operation failed.
    #[error("Cryptographic error: {0}")]
    Crypto(#[from] meshit_crypto::CryptoError),
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;
