//! The per-peer session table and handshake driver.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use meshit_crypto::handshake::{Initiator, Responder};
use meshit_crypto::x25519::{X25519PrivateKey, X25519PublicKey};
use meshit_crypto::NoiseSession;

use crate::{Result, SessionError};

/// Owns all handshake and session state, keyed by peer fingerprint.
///
/// At most one established session exists per peer; completing a handshake
/// replaces any previous session with that peer. A failed handshake message
/// discards the pending state and nothing else.
pub struct SessionManager {
    local_static: X25519PrivateKey,
    sessions: RwLock<HashMap<String, Arc<NoiseSession>>>,
    pending_initiations: Mutex<HashMap<String, Initiator>>,
    pending_responses: Mutex<HashMap<String, Responder>>,
    disconnected_at: Mutex<HashMap<String, Instant>>,
}

impl SessionManager {
    /// Create a manager around a copy of the local static private key.
    pub fn new(local_static: &X25519PrivateKey) -> Self {
        let local_static = X25519PrivateKey::from_bytes(local_static.as_bytes())
            .expect("static key bytes have fixed width");
        Self {
            local_static,
            sessions: RwLock::new(HashMap::new()),
            pending_initiations: Mutex::new(HashMap::new()),
            pending_responses: Mutex::new(HashMap::new()),
            disconnected_at: Mutex::new(HashMap::new()),
        }
    }

    /// Begin a handshake with a peer, producing message one.
    ///
    /// Any earlier pending initiation with this peer is replaced.
    pub fn initiate(&self, peer_id: &str) -> Vec<u8> {
        let initiator = Initiator::new(&self.local_static);
        let message = initiator.message_one().to_vec();
        self.pending_initiations
            .lock()
            .expect("handshake mutex poisoned")
            .insert(peer_id.to_string(), initiator);
        debug!(peer = peer_id, "handshake initiated");
        message
    }

    /// Respond to an incoming message one, producing message two.
    pub fn handle_message_one(&self, peer_id: &str, message: &[u8]) -> Result<Vec<u8>> {
        let mut responder = Responder::new(&self.local_static);
        let reply = responder.read_message_one(message)?;
        self.pending_responses
            .lock()
            .expect("handshake mutex poisoned")
            .insert(peer_id.to_string(), responder);
        debug!(peer = peer_id, "handshake message one accepted");
        Ok(reply.to_vec())
    }

    /// Consume an incoming message two, producing message three and
    /// establishing the session on our side.
    pub fn handle_message_two(&self, peer_id: &str, message: &[u8]) -> Result<Vec<u8>> {
        let initiator = self
            .pending_initiations
            .lock()
            .expect("handshake mutex poisoned")
            .remove(peer_id)
            .ok_or_else(|| SessionError::NoPendingHandshake(peer_id.to_string()))?;

        let (reply, keys) = initiator.read_message_two(message).map_err(|e| {
            warn!(peer = peer_id, error = %e, "handshake aborted at message two");
            e
        })?;
        self.install(peer_id, NoiseSession::new(peer_id, keys));
        Ok(reply.to_vec())
    }

    /// Consume an incoming message three, establishing the session on the
    /// responder side.
    pub fn handle_message_three(&self, peer_id: &str, message: &[u8]) -> Result<()> {
        let responder = self
            .pending_responses
            .lock()
            .expect("handshake mutex poisoned")
            .remove(peer_id)
            .ok_or_else(|| SessionError::NoPendingHandshake(peer_id.to_string()))?;

        let keys = responder.read_message_three(message).map_err(|e| {
            warn!(peer = peer_id, error = %e, "handshake aborted at message three");
            e
        })?;
        self.install(peer_id, NoiseSession::new(peer_id, keys));
        Ok(())
    }

    fn install(&self, peer_id: &str, session: NoiseSession) {
        let replaced = self
            .sessions
            .write()
            .expect("session table poisoned")
            .insert(peer_id.to_string(), Arc::new(session))
            .is_some();
        self.disconnected_at
            .lock()
            .expect("disconnect table poisoned")
            .remove(peer_id);
        info!(peer = peer_id, replaced, "session established");
    }

    /// Encrypt a payload for a peer over its established session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NoSession`] when no handshake has completed
    /// with this peer; the caller decides whether to queue and initiate.
    pub fn encrypt_for(&self, peer_id: &str, plaintext: &[u8]) -> Result<Vec<u8>> {
        let session = self
            .session(peer_id)
            .ok_or_else(|| SessionError::NoSession(peer_id.to_string()))?;
        Ok(session.encrypt(plaintext)?)
    }

    /// Decrypt a transport frame from a peer.
    ///
    /// Returns `None` with no session, on replay, or on a bad tag; transport
    /// decryption failures are drops, never errors.
    pub fn decrypt_from(&self, peer_id: &str, frame: &[u8]) -> Option<Vec<u8>> {
        self.session(peer_id)?.decrypt(frame)
    }

    /// The established session with a peer, if any.
    pub fn session(&self, peer_id: &str) -> Option<Arc<NoiseSession>> {
        self.sessions
            .read()
            .expect("session table poisoned")
            .get(peer_id)
            .cloned()
    }

    /// Whether an established session exists with the peer.
    pub fn has_session(&self, peer_id: &str) -> bool {
        self.sessions
            .read()
            .expect("session table poisoned")
            .contains_key(peer_id)
    }

    /// The authenticated static key of a peer, if a session exists.
    pub fn remote_static(&self, peer_id: &str) -> Option<X25519PublicKey> {
        self.session(peer_id).map(|s| s.remote_static().clone())
    }

    /// Number of established sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.read().expect("session table poisoned").len()
    }

    /// Record that the peer's link dropped; the session survives until the
    /// lifetime window elapses without a reconnect.
    pub fn mark_disconnected(&self, peer_id: &str) {
        if self.has_session(peer_id) {
            self.disconnected_at
                .lock()
                .expect("disconnect table poisoned")
                .insert(peer_id.to_string(), Instant::now());
        }
    }

    /// Record that the peer is back; cancels any pending expiry.
    pub fn mark_connected(&self, peer_id: &str) {
        self.disconnected_at
            .lock()
            .expect("disconnect table poisoned")
            .remove(peer_id);
    }

    /// Drop the session with a peer immediately (user wipe, re-key).
    pub fn remove_session(&self, peer_id: &str) {
        self.sessions
            .write()
            .expect("session table poisoned")
            .remove(peer_id);
        self.disconnected_at
            .lock()
            .expect("disconnect table poisoned")
            .remove(peer_id);
        self.pending_initiations
            .lock()
            .expect("handshake mutex poisoned")
            .remove(peer_id);
        self.pending_responses
            .lock()
            .expect("handshake mutex poisoned")
            .remove(peer_id);
    }

    /// Destroy sessions whose peers have been disconnected longer than
    /// `lifetime`. Returns how many were destroyed.
    pub fn sweep_disconnected(&self, lifetime: Duration) -> usize {
        let expired: Vec<String> = {
            let table = self
                .disconnected_at
                .lock()
                .expect("disconnect table poisoned");
            table
                .iter()
                .filter(|(_, at)| at.elapsed() >= lifetime)
                .map(|(peer, _)| peer.clone())
                .collect()
        };
        for peer in &expired {
            debug!(peer = peer.as_str(), "session expired after disconnect");
            self.remove_session(peer);
        }
        expired.len()
    }

    /// Drop everything: sessions, pending handshakes, disconnect marks.
    pub fn wipe(&self) {
        self.sessions.write().expect("session table poisoned").clear();
        self.pending_initiations
            .lock()
            .expect("handshake mutex poisoned")
            .clear();
        self.pending_responses
            .lock()
            .expect("handshake mutex poisoned")
            .clear();
        self.disconnected_at
            .lock()
            .expect("disconnect table poisoned")
            .clear();
    }
}
