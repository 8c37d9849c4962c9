//! HKDF-SHA256 key derivation.
//!
//! Every derivation in the protocol uses a 32-byte all-zero extract salt, so
//! the PRK depends only on the input key material. Output must match RFC 5869
//! expand over that zero-extract PRK byte for byte; the handshake on both
//! ends of a link depends on it.

use hkdf::Hkdf;
use sha2::Sha256;

use crate::{CryptoError, Result};

/// The fixed extract salt (32 zero bytes).
const ZERO_SALT: [u8; 32] = [0u8; 32];

/// Expand `ikm` with `info` into `length` bytes of key material.
///
/// # Errors
///
/// Returns an error if `length` exceeds the HKDF-SHA256 output limit
/// (255 * 32 bytes).
pub fn hkdf_expand(ikm: &[u8], info: &[u8], length: usize) -> Result<Vec<u8>> {
    let hk = Hkdf::<Sha256>::new(Some(&ZERO_SALT), ikm);
    let mut out = vec![0u8; length];
    hk.expand(info, &mut out)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    Ok(out)
}

/// Expand `ikm` with `info` into exactly 32 bytes.
pub fn hkdf_expand_32(ikm: &[u8], info: &[u8]) -> Result<[u8; 32]> {
    let hk = Hkdf::<Sha256>::new(Some(&ZERO_SALT), ikm);
    let mut out = [0u8; 32];
    hk.expand(info, &mut out)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    Ok(out)
}
