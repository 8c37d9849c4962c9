//! Error types for cryptographic operations.

use thiserror::Error;

/// Errors that can occur during cryptographic operations.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// A key had the wrong length.
    #[error("Invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Expected length in bytes.
        expected: usize,
        /// Actual length in bytes.
        actual: usize,
    },

    /// A nonce had the wrong length.
    #[error("Invalid nonce length: expected {expected}, got {actual}")]
    InvalidNonceLength {
        /// Expected length in bytes.
        expected: usize,
        /// Actual length in bytes.
        actual: usize,
    },

    /// Encryption failed.
    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// Decryption failed (wrong key, tampered ciphertext, or bad format).
    #[error("Decryption failed")]
    Decryption,

    /// Diffie-Hellman produced a degenerate (all-zero) shared secret.
    #[error("Key exchange produced a degenerate shared secret")]
    KeyExchange,

    /// Key derivation failed.
    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    /// Signature parsing or verification input was malformed.
    #[error("Invalid signature material: {0}")]
    Signature(String),

    /// The handshake could not be completed; pending state is discarded.
    #[error("Handshake failed: {0}")]
    HandshakeFailed(&'static str),

    /// LZ4 compression or decompression failed.
    #[error("Compression error: {0}")]
    Compression(String),
}

/// Result type for cryptographic operations.
pub type Result<T> = std::result::Result<T, CryptoError>;
