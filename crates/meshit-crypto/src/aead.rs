//! ChaCha20-Poly1305 authenticated encryption.
//!
//! The mesh wire format fixes nonces at 96 bits: handshake messages use an
//! all-zero nonce under single-use keys, and transport frames build the nonce
//! from a monotonic counter (see [`crate::session`]). Nonces are therefore
//! caller-supplied here, never random.
//!
//! ## Security Notes
//!
//! - Keys are zeroized on drop
//! - Never reuse a (key, nonce) pair
//! - Associated data is authenticated but not encrypted

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Nonce,
};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{CryptoError, Result};

/// Size of an AEAD key in bytes (256 bits).
pub const KEY_SIZE: usize = 32;

/// Size of a nonce in bytes (96 bits).
pub const NONCE_SIZE: usize = 12;

/// Size of the authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

/// A 256-bit key for ChaCha20-Poly1305.
///
/// The key is automatically zeroized when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct AeadKey {
    bytes: [u8; KEY_SIZE],
}

impl AeadKey {
    /// Generate a new random key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Create a key from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not exactly 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength {
                expected: KEY_SIZE,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; KEY_SIZE];
        arr.copy_from_slice(bytes);
        Ok(Self { bytes: arr })
    }

    /// Get the key as a byte slice.
    ///
    /// # Security
    ///
    /// Avoid logging or persisting the returned bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for AeadKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AeadKey([REDACTED])")
    }
}

/// Encrypt `plaintext` under `key` with the given nonce and associated data.
///
/// Returns `ciphertext || tag` (16 bytes longer than the plaintext).
///
/// # Errors
///
/// Returns `CryptoError::Encryption` if the cipher rejects the input.
pub fn seal(
    key: &AeadKey,
    nonce: &[u8; NONCE_SIZE],
    aad: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new(key.as_bytes().into());
    cipher
        .encrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|_| CryptoError::Encryption("ChaCha20-Poly1305 encryption failed".into()))
}

/// Decrypt `ciphertext || tag` produced by [`seal`].
///
/// # Errors
///
/// Returns `CryptoError::Decryption` if the tag does not verify, the wrong
/// key or AAD is used, or the input is shorter than a tag.
pub fn open(
    key: &AeadKey,
    nonce: &[u8; NONCE_SIZE],
    aad: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<u8>> {
    if ciphertext.len() < TAG_SIZE {
        return Err(CryptoError::Decryption);
    }
    let cipher = ChaCha20Poly1305::new(key.as_bytes().into());
    cipher
        .decrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(|_| CryptoError::Decryption)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NONCE: [u8; NONCE_SIZE] = [0u8; NONCE_SIZE];

    #[test]
    fn test_seal_open_roundtrip() {
        let key = AeadKey::generate();
        let plaintext = b"over the mesh";

        let sealed = seal(&key, &NONCE, &[], plaintext).unwrap();
        let opened = open(&key, &NONCE, &[], &sealed).unwrap();

        assert_eq!(plaintext.as_slice(), opened.as_slice());
        assert_eq!(sealed.len(), plaintext.len() + TAG_SIZE);
    }

    #[test]
    fn test_open_fails_with_wrong_key() {
        let key1 = AeadKey::generate();
        let key2 = AeadKey::generate();

        let sealed = seal(&key1, &NONCE, &[], b"secret").unwrap();
        let result = open(&key2, &NONCE, &[], &sealed);

        assert!(matches!(result, Err(CryptoError::Decryption)));
    }

    #[test]
    fn test_open_fails_with_tampered_ciphertext() {
        let key = AeadKey::generate();
        let mut sealed = seal(&key, &NONCE, &[], b"secret").unwrap();
        sealed[0] ^= 0xff;

        assert!(matches!(
            open(&key, &NONCE, &[], &sealed),
            Err(CryptoError::Decryption)
        ));
    }

    #[test]
    fn test_open_fails_with_wrong_nonce() {
        let key = AeadKey::generate();
        let sealed = seal(&key, &NONCE, &[], b"secret").unwrap();

        let mut other = NONCE;
        other[11] = 1;
        assert!(open(&key, &other, &[], &sealed).is_err());
    }

    #[test]
    fn test_aad_mismatch_fails() {
        let key = AeadKey::generate();
        let sealed = seal(&key, &NONCE, b"header", b"secret").unwrap();

        assert!(open(&key, &NONCE, b"other", &sealed).is_err());
        assert!(open(&key, &NONCE, b"header", &sealed).is_ok());
    }

    #[test]
    fn test_empty_plaintext() {
        let key = AeadKey::generate();
        let sealed = seal(&key, &NONCE, &[], b"").unwrap();
        assert_eq!(sealed.len(), TAG_SIZE);
        assert_eq!(open(&key, &NONCE, &[], &sealed).unwrap(), b"");
    }

    #[test]
    fn test_short_ciphertext_rejected() {
        let key = AeadKey::generate();
        assert!(matches!(
            open(&key, &NONCE, &[], &[0u8; 8]),
            Err(CryptoError::Decryption)
        ));
    }

    #[test]
    fn test_key_from_bytes_invalid_length() {
        assert!(matches!(
            AeadKey::from_bytes(&[0u8; 16]),
            Err(CryptoError::InvalidKeyLength {
                expected: KEY_SIZE,
                actual: 16
            })
        ));
    }

    #[test]
    fn test_key_debug_redacted() {
        let key = AeadKey::generate();
        assert!(format!("{:?}", key).contains("REDACTED"));
    }
}
