//! Three-message mutually authenticating handshake (XX pattern).
//!
//! ```text
//! initiator                                   responder
//!     ──────────────  e  ───────────────────────►
//!     ◄───────  e || AEAD(ee; s_resp)  ──────────
//!     ─────  AEAD(combine(ee, se); s_init)  ─────►
//! ```
//!
//! `ee` and `se` are raw X25519 agreements; `combine(a, b)` is an HKDF
//! expansion of `a || b`. Handshake AEADs use single-use keys with an
//! all-zero nonce and empty associated data. After message three both sides
//! derive the transport key pair from the static-static agreement, so the
//! session is bound to the long-term identities, not the ephemerals.
//!
//! Any failure consumes the in-progress state; the peer stays reachable for
//! a fresh attempt.

use zeroize::Zeroizing;

use crate::aead::{self, AeadKey, NONCE_SIZE, TAG_SIZE};
use crate::kdf::hkdf_expand_32;
use crate::x25519::{X25519PrivateKey, X25519PublicKey, PUBLIC_KEY_SIZE};
use crate::{CryptoError, Result};

/// HKDF info label combining the two handshake agreements.
pub const INFO_COMBINE: &[u8] = b"meshIt-combine";

/// HKDF info label for the initiator-to-responder transport key.
pub const INFO_KEY_1: &[u8] = b"meshIt-key-1";

/// HKDF info label for the responder-to-initiator transport key.
pub const INFO_KEY_2: &[u8] = b"meshIt-key-2";

/// Length of handshake message one (the bare ephemeral).
pub const MESSAGE_ONE_LEN: usize = PUBLIC_KEY_SIZE;

/// Length of handshake message two.
pub const MESSAGE_TWO_LEN: usize = PUBLIC_KEY_SIZE + PUBLIC_KEY_SIZE + TAG_SIZE;

/// Length of handshake message three.
pub const MESSAGE_THREE_LEN: usize = PUBLIC_KEY_SIZE + TAG_SIZE;

const ZERO_NONCE: [u8; NONCE_SIZE] = [0u8; NONCE_SIZE];

/// Transport key material produced by a completed handshake.
pub struct TransportKeys {
    /// Key for frames we send.
    pub send: AeadKey,
    /// Key for frames we receive.
    pub recv: AeadKey,
    /// The authenticated static public key of the remote peer.
    pub remote_static: X25519PublicKey,
}

impl std::fmt::Debug for TransportKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportKeys")
            .field("remote_static", &self.remote_static)
            .finish_non_exhaustive()
    }
}

fn combine(a: &[u8; 32], b: &[u8; 32]) -> Result<AeadKey> {
    let mut ikm = Zeroizing::new([0u8; 64]);
    ikm[..32].copy_from_slice(a);
    ikm[32..].copy_from_slice(b);
    let key = Zeroizing::new(hkdf_expand_32(ikm.as_slice(), INFO_COMBINE)?);
    AeadKey::from_bytes(key.as_slice())
}

fn derive_transport_keys(
    local_static: &X25519PrivateKey,
    remote_static: &X25519PublicKey,
    initiator: bool,
) -> Result<TransportKeys> {
    let ss = local_static.diffie_hellman(remote_static)?;
    let k1 = Zeroizing::new(hkdf_expand_32(ss.as_bytes(), INFO_KEY_1)?);
    let k2 = Zeroizing::new(hkdf_expand_32(ss.as_bytes(), INFO_KEY_2)?);
    let (send, recv) = if initiator {
        (
            AeadKey::from_bytes(k1.as_slice())?,
            AeadKey::from_bytes(k2.as_slice())?,
        )
    } else {
        (
            AeadKey::from_bytes(k2.as_slice())?,
            AeadKey::from_bytes(k1.as_slice())?,
        )
    };
    Ok(TransportKeys {
        send,
        recv,
        remote_static: remote_static.clone(),
    })
}

/// Initiator side of the handshake.
pub struct Initiator {
    local_static: X25519PrivateKey,
    local_static_public: X25519PublicKey,
    ephemeral: X25519PrivateKey,
}

impl Initiator {
    /// Start a handshake with a copy of the local static private key.
    pub fn new(local_static: &X25519PrivateKey) -> Self {
        let local_static = X25519PrivateKey::from_bytes(local_static.as_bytes())
            .expect("static key bytes have fixed width");
        let local_static_public = local_static.public_key();
        Self {
            local_static,
            local_static_public,
            ephemeral: X25519PrivateKey::generate(),
        }
    }

    /// Produce message one: the bare ephemeral public key.
    pub fn message_one(&self) -> [u8; MESSAGE_ONE_LEN] {
        self.ephemeral.public_key().to_bytes()
    }

    /// Consume message two, producing message three and the transport keys.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::HandshakeFailed` on any malformed input, AEAD
    /// failure, or degenerate agreement. The handshake state is consumed
    /// either way.
    pub fn read_message_two(
        self,
        message: &[u8],
    ) -> Result<([u8; MESSAGE_THREE_LEN], TransportKeys)> {
        if message.len() != MESSAGE_TWO_LEN {
            return Err(CryptoError::HandshakeFailed("bad message-two length"));
        }
        let remote_ephemeral = X25519PublicKey::from_bytes(&message[..PUBLIC_KEY_SIZE])
            .map_err(|_| CryptoError::HandshakeFailed("bad responder ephemeral"))?;

        let ee = self
            .ephemeral
            .diffie_hellman(&remote_ephemeral)
            .map_err(|_| CryptoError::HandshakeFailed("degenerate ee agreement"))?;
        let ee_key = AeadKey::from_bytes(ee.as_bytes())
            .map_err(|_| CryptoError::HandshakeFailed("ee key derivation"))?;

        let static_plain = aead::open(&ee_key, &ZERO_NONCE, &[], &message[PUBLIC_KEY_SIZE..])
            .map_err(|_| CryptoError::HandshakeFailed("responder static did not decrypt"))?;
        let remote_static = X25519PublicKey::from_bytes(&static_plain)
            .map_err(|_| CryptoError::HandshakeFailed("bad responder static"))?;

        let se = self
            .ephemeral
            .diffie_hellman(&remote_static)
            .map_err(|_| CryptoError::HandshakeFailed("degenerate se agreement"))?;
        let msg3_key = combine(ee.as_bytes(), se.as_bytes())
            .map_err(|_| CryptoError::HandshakeFailed("message-three key derivation"))?;

        let ciphertext = aead::seal(
            &msg3_key,
            &ZERO_NONCE,
            &[],
            self.local_static_public.as_bytes(),
        )
        .map_err(|_| CryptoError::HandshakeFailed("message-three encryption"))?;
        let mut message_three = [0u8; MESSAGE_THREE_LEN];
        message_three.copy_from_slice(&ciphertext);

        let keys = derive_transport_keys(&self.local_static, &remote_static, true)?;
        Ok((message_three, keys))
    }
}

impl std::fmt::Debug for Initiator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Initiator([REDACTED])")
    }
}

/// Responder side of the handshake.
pub struct Responder {
    local_static: X25519PrivateKey,
    local_static_public: X25519PublicKey,
    ephemeral: X25519PrivateKey,
    remote_ephemeral: Option<X25519PublicKey>,
    ee: Option<crate::x25519::SharedSecret>,
}

impl Responder {
    /// Start a responder with a copy of the local static private key.
    pub fn new(local_static: &X25519PrivateKey) -> Self {
        let local_static = X25519PrivateKey::from_bytes(local_static.as_bytes())
            .expect("static key bytes have fixed width");
        let local_static_public = local_static.public_key();
        Self {
            local_static,
            local_static_public,
            ephemeral: X25519PrivateKey::generate(),
            remote_ephemeral: None,
            ee: None,
        }
    }

    /// Consume message one and produce message two.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::HandshakeFailed` on malformed input or a
    /// degenerate agreement.
    pub fn read_message_one(&mut self, message: &[u8]) -> Result<[u8; MESSAGE_TWO_LEN]> {
        if message.len() != MESSAGE_ONE_LEN {
            return Err(CryptoError::HandshakeFailed("bad message-one length"));
        }
        let remote_ephemeral = X25519PublicKey::from_bytes(message)
            .map_err(|_| CryptoError::HandshakeFailed("bad initiator ephemeral"))?;

        let ee = self
            .ephemeral
            .diffie_hellman(&remote_ephemeral)
            .map_err(|_| CryptoError::HandshakeFailed("degenerate ee agreement"))?;
        let ee_key = AeadKey::from_bytes(ee.as_bytes())
            .map_err(|_| CryptoError::HandshakeFailed("ee key derivation"))?;

        let ciphertext = aead::seal(
            &ee_key,
            &ZERO_NONCE,
            &[],
            self.local_static_public.as_bytes(),
        )
        .map_err(|_| CryptoError::HandshakeFailed("message-two encryption"))?;

        let mut message_two = [0u8; MESSAGE_TWO_LEN];
        message_two[..PUBLIC_KEY_SIZE].copy_from_slice(self.ephemeral.public_key().as_bytes());
        message_two[PUBLIC_KEY_SIZE..].copy_from_slice(&ciphertext);

        self.remote_ephemeral = Some(remote_ephemeral);
        self.ee = Some(ee);
        Ok(message_two)
    }

    /// Consume message three and derive the transport keys.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::HandshakeFailed` if message one was never
    /// processed, the input is malformed, or the AEAD does not open. The
    /// handshake state is consumed either way.
    pub fn read_message_three(self, message: &[u8]) -> Result<TransportKeys> {
        if message.len() != MESSAGE_THREE_LEN {
            return Err(CryptoError::HandshakeFailed("bad message-three length"));
        }
        let remote_ephemeral = self
            .remote_ephemeral
            .as_ref()
            .ok_or(CryptoError::HandshakeFailed("message one not processed"))?;
        let ee = self
            .ee
            .as_ref()
            .ok_or(CryptoError::HandshakeFailed("message one not processed"))?;

        let se = self
            .local_static
            .diffie_hellman(remote_ephemeral)
            .map_err(|_| CryptoError::HandshakeFailed("degenerate se agreement"))?;
        let msg3_key = combine(ee.as_bytes(), se.as_bytes())
            .map_err(|_| CryptoError::HandshakeFailed("message-three key derivation"))?;

        let static_plain = aead::open(&msg3_key, &ZERO_NONCE, &[], message)
            .map_err(|_| CryptoError::HandshakeFailed("initiator static did not decrypt"))?;
        let remote_static = X25519PublicKey::from_bytes(&static_plain)
            .map_err(|_| CryptoError::HandshakeFailed("bad initiator static"))?;

        derive_transport_keys(&self.local_static, &remote_static, false)
    }
}

impl std::fmt::Debug for Responder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Responder([REDACTED])")
    }
}
