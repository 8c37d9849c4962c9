//! Error types for persisted-state operations.

use thiserror::Error;

/// Errors that can occur while reading or writing persisted state.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Filesystem failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A persisted record failed to encode or decode.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The OS credential store refused us.
    #[error("Keyring error: {0}")]
    Keyring(String),
}

/// Result type for persisted-state operations.
pub type Result<T> = std::result::Result<T, StoreError>;
