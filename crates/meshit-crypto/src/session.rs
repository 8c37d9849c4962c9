//! Per-peer transport session derived from a completed handshake.
//!
//! Outgoing frames are `counter(8 LE) || ciphertext`, where the counter is
//! taken from a monotonic sequence starting at 1 and the AEAD nonce is the
//! counter placed in the low 8 bytes of a zeroed 12-byte nonce. Incoming
//! frames must carry a counter strictly greater than the highest accepted so
//! far; replays and reordered frames are both dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use crate::aead::{self, AeadKey, NONCE_SIZE, TAG_SIZE};
use crate::handshake::TransportKeys;
use crate::x25519::X25519PublicKey;
use crate::Result;

/// Length of the counter prefix on every transport frame.
pub const COUNTER_LEN: usize = 8;

/// An established session with one remote peer.
///
/// Sessions are keyed by peer identity, not radio address; at most one exists
/// per peer at a time.
pub struct NoiseSession {
    peer_id: String,
    send_key: AeadKey,
    recv_key: AeadKey,
    remote_static: X25519PublicKey,
    send_nonce: AtomicU64,
    last_received: AtomicU64,
    established_at: SystemTime,
}

impl NoiseSession {
    /// Build a session from freshly derived transport keys.
    pub fn new(peer_id: impl Into<String>, keys: TransportKeys) -> Self {
        Self {
            peer_id: peer_id.into(),
            send_key: keys.send,
            recv_key: keys.recv,
            remote_static: keys.remote_static,
            send_nonce: AtomicU64::new(0),
            last_received: AtomicU64::new(0),
            established_at: SystemTime::now(),
        }
    }

    /// The peer this session is bound to.
    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    /// The authenticated static public key of the remote peer.
    pub fn remote_static(&self) -> &X25519PublicKey {
        &self.remote_static
    }

    /// When the handshake completed.
    pub fn established_at(&self) -> SystemTime {
        self.established_at
    }

    /// How long the session has existed.
    pub fn age(&self) -> Duration {
        self.established_at.elapsed().unwrap_or_default()
    }

    /// Encrypt a payload into a transport frame.
    ///
    /// The counter is incremented before use, so the first frame carries 1.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let counter = self.send_nonce.fetch_add(1, Ordering::SeqCst) + 1;
        let nonce = nonce_from_counter(counter);
        let ciphertext = aead::seal(&self.send_key, &nonce, &[], plaintext)?;

        let mut frame = Vec::with_capacity(COUNTER_LEN + ciphertext.len());
        frame.extend_from_slice(&counter.to_le_bytes());
        frame.extend_from_slice(&ciphertext);
        Ok(frame)
    }

    /// Decrypt a transport frame.
    ///
    /// Returns `None` on a short frame, a replayed or reordered counter, or
    /// an authentication failure. A successful decrypt advances the replay
    /// window to the frame's counter.
    pub fn decrypt(&self, frame: &[u8]) -> Option<Vec<u8>> {
        if frame.len() < COUNTER_LEN + TAG_SIZE {
            return None;
        }
        let mut counter_bytes = [0u8; COUNTER_LEN];
        counter_bytes.copy_from_slice(&frame[..COUNTER_LEN]);
        let counter = u64::from_le_bytes(counter_bytes);

        if counter <= self.last_received.load(Ordering::SeqCst) {
            return None;
        }

        let nonce = nonce_from_counter(counter);
        let plaintext = aead::open(&self.recv_key, &nonce, &[], &frame[COUNTER_LEN..]).ok()?;

        // Advance the window only after authentication; lose the race to a
        // higher counter and this frame is treated as a replay.
        let previous = self.last_received.fetch_max(counter, Ordering::SeqCst);
        if previous >= counter {
            return None;
        }
        Some(plaintext)
    }
}

impl std::fmt::Debug for NoiseSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoiseSession")
            .field("peer_id", &self.peer_id)
            .field("remote_static", &self.remote_static)
            .field("send_nonce", &self.send_nonce.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

fn nonce_from_counter(counter: u64) -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    nonce[4..].copy_from_slice(&counter.to_le_bytes());
    nonce
}
