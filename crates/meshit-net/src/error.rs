//! Error types for networking operations.

use thiserror::Error;

/// Errors that can occur during networking operations.
#[derive(Error, Debug)]
pub enum NetError {
    /// Connection failed after all retry attempts.
    #[error("Connection to {address} failed after {attempts} attempts: {last_error}")]
    ConnectFailed {
        /// The dialed address.
        address: String,
        /// How many dial attempts were made.
        attempts: u32,
        /// The error from the final attempt.
        last_error: String,
    },

    /// No live link exists for the peer address.
    #[error("Not connected to {0}")]
    NotConnected(String),

    /// A frame length violated the framing contract.
    #[error("Frame length {0} out of range")]
    FrameOutOfRange(usize),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for networking operations.
pub type Result<T> = std::result::Result<T, NetError>;
