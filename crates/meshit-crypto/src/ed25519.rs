//! Ed25519 signatures for peer verification.
//!
//! The mesh signs nothing on the wire by default; signatures back the
//! out-of-band identity verification flow (QR / verification URI).

use ed25519_dalek::{Signature, Signer, Verifier};
pub use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;

use crate::{CryptoError, Result};

/// Size of an Ed25519 signature in bytes.
pub const SIGNATURE_SIZE: usize = 64;

/// Size of an Ed25519 public key in bytes.
pub const VERIFYING_KEY_SIZE: usize = 32;

/// Generate a new random Ed25519 signing key.
pub fn generate_signing_key() -> SigningKey {
    SigningKey::generate(&mut OsRng)
}

/// Sign a message, returning the detached 64-byte signature.
pub fn sign(message: &[u8], signing_key: &SigningKey) -> [u8; SIGNATURE_SIZE] {
    signing_key.sign(message).to_bytes()
}

/// Verify a detached signature over `message`.
///
/// Returns `false` for a well-formed but invalid signature.
///
/// # Errors
///
/// Returns an error only if `signature` or `public_key` have the wrong
/// length or the public key fails to parse.
pub fn verify(message: &[u8], signature: &[u8], public_key: &[u8]) -> Result<bool> {
    if signature.len() != SIGNATURE_SIZE {
        return Err(CryptoError::Signature(format!(
            "signature must be {} bytes, got {}",
            SIGNATURE_SIZE,
            signature.len()
        )));
    }
    let key_bytes: [u8; VERIFYING_KEY_SIZE] =
        public_key
            .try_into()
            .map_err(|_| CryptoError::InvalidKeyLength {
                expected: VERIFYING_KEY_SIZE,
                actual: public_key.len(),
            })?;
    let verifying_key = VerifyingKey::from_bytes(&key_bytes)
        .map_err(|e| CryptoError::Signature(format!("invalid Ed25519 public key: {e}")))?;

    let sig_bytes: [u8; SIGNATURE_SIZE] = signature
        .try_into()
        .map_err(|_| CryptoError::Signature("invalid signature bytes".into()))?;
    let signature = Signature::from_bytes(&sig_bytes);

    Ok(verifying_key.verify(message, &signature).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let key = generate_signing_key();
        let message = b"fingerprint binding";

        let sig = sign(message, &key);
        let valid = verify(message, &sig, key.verifying_key().as_bytes()).unwrap();
        assert!(valid);
    }

    #[test]
    fn test_verify_wrong_message() {
        let key = generate_signing_key();
        let sig = sign(b"original", &key);

        let valid = verify(b"tampered", &sig, key.verifying_key().as_bytes()).unwrap();
        assert!(!valid);
    }

    #[test]
    fn test_verify_wrong_key() {
        let key = generate_signing_key();
        let other = generate_signing_key();
        let sig = sign(b"message", &key);

        let valid = verify(b"message", &sig, other.verifying_key().as_bytes()).unwrap();
        assert!(!valid);
    }

    #[test]
    fn test_malformed_inputs() {
        let key = generate_signing_key();
        let sig = sign(b"message", &key);

        assert!(verify(b"message", &sig[..32], key.verifying_key().as_bytes()).is_err());
        assert!(verify(b"message", &sig, &[0u8; 16]).is_err());
    }
}
