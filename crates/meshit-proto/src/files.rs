//! File transfer payload models.
//!
//! A transfer is one `file-metadata` packet followed by `file-chunk`
//! packets in index order. Receivers acknowledge every
//! [`ACK_WINDOW`](crate::limits::ACK_WINDOW)-th chunk so senders can gauge
//! progress without per-chunk round trips.

use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};

use crate::limits::ACK_WINDOW;
use crate::Result;

/// Describes a file about to be transferred.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    /// Original file name (no path).
    pub name: String,
    /// Total size in bytes.
    pub size: u64,
    /// Lowercase hex SHA-256 of the full content.
    pub sha256: String,
    /// Number of chunks that will follow.
    pub chunk_count: u32,
}

impl FileMetadata {
    /// Encode as a packet payload.
    pub fn to_payload(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode from a packet payload.
    pub fn from_payload(payload: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(payload)?)
    }
}

/// One chunk of file content.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileChunk {
    /// Zero-based chunk index.
    pub index: u32,
    /// Base64 chunk content.
    data: String,
}

impl FileChunk {
    /// Wrap raw chunk bytes.
    pub fn new(index: u32, data: &[u8]) -> Self {
        Self {
            index,
            data: general_purpose::STANDARD.encode(data),
        }
    }

    /// The chunk content.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored base64 is malformed.
    pub fn data(&self) -> Result<Vec<u8>> {
        Ok(general_purpose::STANDARD.decode(&self.data)?)
    }

    /// Whether this chunk index should trigger an acknowledgement.
    pub fn wants_ack(&self) -> bool {
        (self.index + 1) % ACK_WINDOW == 0
    }

    /// Encode as a packet payload.
    pub fn to_payload(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode from a packet payload.
    pub fn from_payload(payload: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(payload)?)
    }
}

/// Acknowledgement of received chunks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAck {
    /// Highest contiguous chunk index received.
    pub index: u32,
}

impl FileAck {
    /// Encode as a packet payload.
    pub fn to_payload(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode from a packet payload.
    pub fn from_payload(payload: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(payload)?)
    }
}
