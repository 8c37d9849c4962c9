//! Error types for identity operations.

use thiserror::Error;

/// Errors that can occur during identity operations.
#[derive(Error, Debug)]
pub enum IdentityError {
    /// The protected storage backend failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Cryptographic error.
    #[error("Cryptographic error: {0}")]
    Crypto(#[from] meshit_crypto::CryptoError),

    /// Stored identity material did not parse or verify.
    #[error("Corrupt identity: {0}")]
    CorruptIdentity(String),

    /// A verification URI did not parse.
    #[error("Invalid verification URI: {0}")]
    InvalidUri(String),
}

/// Result type for identity operations.
pub type Result<T> = std::result::Result<T, IdentityError>;
