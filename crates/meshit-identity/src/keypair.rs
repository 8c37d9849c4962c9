//! The dual-keypair node identity.

use meshit_crypto::ed25519::{self, SigningKey, VerifyingKey};
use meshit_crypto::hash::{fingerprint, short_fingerprint};
use meshit_crypto::x25519::{X25519PrivateKey, X25519PublicKey};

use crate::{IdentityError, Result};

/// A node's long-term identity.
///
/// Holds the X25519 static pair used by the handshake and the Ed25519 pair
/// used for signatures, plus the user-visible nickname. The fingerprint is
/// cached at construction since it never changes for a given identity.
pub struct NodeIdentity {
    noise_private: X25519PrivateKey,
    noise_public: X25519PublicKey,
    signing_key: SigningKey,
    fingerprint: String,
    nickname: String,
}

impl NodeIdentity {
    /// Generate a fresh identity with the given nickname.
    pub fn generate(nickname: impl Into<String>) -> Self {
        let noise_private = X25519PrivateKey::generate();
        let noise_public = noise_private.public_key();
        let fingerprint = fingerprint(noise_public.as_bytes());
        Self {
            noise_private,
            noise_public,
            signing_key: ed25519::generate_signing_key(),
            fingerprint,
            nickname: nickname.into(),
        }
    }

    /// Reassemble an identity from stored private key material.
    ///
    /// # Errors
    ///
    /// Returns `CorruptIdentity` if either key has the wrong width.
    pub fn from_parts(
        noise_private: &[u8],
        signing_private: &[u8],
        nickname: impl Into<String>,
    ) -> Result<Self> {
        let noise_private = X25519PrivateKey::from_bytes(noise_private)
            .map_err(|e| IdentityError::CorruptIdentity(format!("noise key: {e}")))?;
        let signing_bytes: [u8; 32] = signing_private
            .try_into()
            .map_err(|_| IdentityError::CorruptIdentity("signing key width".into()))?;
        let noise_public = noise_private.public_key();
        let fingerprint = fingerprint(noise_public.as_bytes());
        Ok(Self {
            noise_private,
            noise_public,
            signing_key: SigningKey::from_bytes(&signing_bytes),
            fingerprint,
            nickname: nickname.into(),
        })
    }

    /// The X25519 static private key.
    pub fn noise_private(&self) -> &X25519PrivateKey {
        &self.noise_private
    }

    /// The X25519 static public key.
    pub fn noise_public(&self) -> &X25519PublicKey {
        &self.noise_public
    }

    /// The Ed25519 signing key.
    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    /// The Ed25519 verification key.
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// The full 64-character fingerprint.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// The 8-character short fingerprint.
    pub fn short_fingerprint(&self) -> String {
        short_fingerprint(&self.fingerprint)
    }

    /// The user-visible nickname.
    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    /// Replace the nickname (e.g. from a settings overlay).
    pub fn set_nickname(&mut self, nickname: impl Into<String>) {
        self.nickname = nickname.into();
    }
}

impl std::fmt::Debug for NodeIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeIdentity")
            .field("fingerprint", &self.short_fingerprint())
            .field("nickname", &self.nickname)
            .finish_non_exhaustive()
    }
}
