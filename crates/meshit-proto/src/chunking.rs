//! MTU chunking for packet-oriented links.
//!
//! Stream links (RFCOMM-like) carry whole length-prefixed frames, but a
//! GATT-style characteristic write is capped at the link MTU. Frames that
//! do not fit are split into chunks with an 8-byte header:
//!
//! ```text
//! msg_id(4 BE) | index(2 BE) | total(2 BE) | data
//! ```
//!
//! and reassembled on the receive side keyed by `msg_id`. Partial messages
//! that never complete are evicted by age.

use rand::Rng;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::{ProtoError, Result};

/// Size of the chunk header in bytes.
pub const CHUNK_HEADER_LEN: usize = 8;

/// Split a frame into MTU-sized chunks.
///
/// A frame that already fits in one chunk still gets a header, so the
/// receive side never has to guess.
///
/// # Errors
///
/// Returns `MtuTooSmall` when `mtu` cannot fit the header plus one byte,
/// and `Chunk` when the frame needs more than `u16::MAX` chunks.
pub fn split_frame(frame: &[u8], mtu: usize) -> Result<Vec<Vec<u8>>> {
    if mtu <= CHUNK_HEADER_LEN {
        return Err(ProtoError::MtuTooSmall(mtu));
    }
    let data_per_chunk = mtu - CHUNK_HEADER_LEN;
    let total = frame.len().div_ceil(data_per_chunk).max(1);
    if total > u16::MAX as usize {
        return Err(ProtoError::Chunk(format!(
            "frame of {} bytes needs {} chunks",
            frame.len(),
            total
        )));
    }

    let msg_id: u32 = rand::thread_rng().gen();
    let mut chunks = Vec::with_capacity(total);
    let mut pieces: Vec<&[u8]> = frame.chunks(data_per_chunk).collect();
    if pieces.is_empty() {
        pieces.push(&[]);
    }
    for (index, data) in pieces.into_iter().enumerate() {
        let mut chunk = Vec::with_capacity(CHUNK_HEADER_LEN + data.len());
        chunk.extend_from_slice(&msg_id.to_be_bytes());
        chunk.extend_from_slice(&(index as u16).to_be_bytes());
        chunk.extend_from_slice(&(total as u16).to_be_bytes());
        chunk.extend_from_slice(data);
        chunks.push(chunk);
    }
    Ok(chunks)
}

struct PartialMessage {
    total: u16,
    parts: HashMap<u16, Vec<u8>>,
    started: Instant,
}

/// Reassembles chunked frames on the receive side.
pub struct Reassembler {
    pending: HashMap<u32, PartialMessage>,
    max_age: Duration,
}

impl Reassembler {
    /// Create a reassembler that drops partial messages older than `max_age`.
    pub fn new(max_age: Duration) -> Self {
        Self {
            pending: HashMap::new(),
            max_age,
        }
    }

    /// Feed one received chunk.
    ///
    /// Returns the complete frame once every index has arrived; order does
    /// not matter and duplicates are ignored.
    ///
    /// # Errors
    ///
    /// Returns `Chunk` for a malformed header or a total that disagrees with
    /// earlier chunks of the same message.
    pub fn add_chunk(&mut self, chunk: &[u8]) -> Result<Option<Vec<u8>>> {
        if chunk.len() < CHUNK_HEADER_LEN {
            return Err(ProtoError::Chunk("chunk shorter than header".into()));
        }
        let msg_id = u32::from_be_bytes(chunk[0..4].try_into().expect("sliced four bytes"));
        let index = u16::from_be_bytes(chunk[4..6].try_into().expect("sliced two bytes"));
        let total = u16::from_be_bytes(chunk[6..8].try_into().expect("sliced two bytes"));
        if total == 0 || index >= total {
            return Err(ProtoError::Chunk(format!(
                "chunk index {index} out of range for total {total}"
            )));
        }

        let partial = self.pending.entry(msg_id).or_insert_with(|| PartialMessage {
            total,
            parts: HashMap::new(),
            started: Instant::now(),
        });
        if partial.total != total {
            return Err(ProtoError::Chunk(format!(
                "total changed from {} to {total} for message {msg_id}",
                partial.total
            )));
        }
        partial
            .parts
            .entry(index)
            .or_insert_with(|| chunk[CHUNK_HEADER_LEN..].to_vec());

        if partial.parts.len() == usize::from(partial.total) {
            let partial = self.pending.remove(&msg_id).expect("entry just inserted");
            let mut frame = Vec::new();
            for i in 0..partial.total {
                frame.extend_from_slice(&partial.parts[&i]);
            }
            return Ok(Some(frame));
        }
        Ok(None)
    }

    /// Drop partial messages older than the configured age.
    ///
    /// Returns how many were evicted.
    pub fn evict_stale(&mut self) -> usize {
        let max_age = self.max_age;
        let before = self.pending.len();
        self.pending.retain(|_, p| p.started.elapsed() < max_age);
        before - self.pending.len()
    }

    /// Number of messages currently awaiting chunks.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
