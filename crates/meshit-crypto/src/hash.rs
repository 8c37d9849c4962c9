//! SHA-256 fingerprints and CRC-32 frame checksums.

use sha2::{Digest, Sha256};

/// Length of a full fingerprint in hex characters.
pub const FINGERPRINT_LEN: usize = 64;

/// Length of a short fingerprint in hex characters.
pub const SHORT_FINGERPRINT_LEN: usize = 8;

/// Compute the SHA-256 digest of `bytes`.
pub fn sha256(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

/// Derive a node fingerprint from its Noise static public key.
///
/// The fingerprint is the lowercase hex of SHA-256 over the raw key bytes,
/// 64 characters.
pub fn fingerprint(public_key: &[u8]) -> String {
    hex::encode(sha256(public_key))
}

/// The first 8 characters of a full fingerprint.
///
/// Accepts the full 64-character form; shorter input is returned unchanged.
pub fn short_fingerprint(full: &str) -> String {
    full.chars().take(SHORT_FINGERPRINT_LEN).collect()
}

/// Compute the CRC-32/ISO-HDLC checksum of `bytes`.
pub fn crc32(bytes: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(bytes);
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_shape() {
        let fp = fingerprint(&[0u8; 32]);
        assert_eq!(fp.len(), FINGERPRINT_LEN);
        assert!(fp
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_fingerprint_known_vector() {
        // SHA-256 of 32 zero bytes.
        assert_eq!(
            fingerprint(&[0u8; 32]),
            "66687aadf862bd776c8fc18b8e9f8e20089714856ee233b3902a591d0d5f2925"
        );
    }

    #[test]
    fn test_short_fingerprint() {
        let fp = fingerprint(b"key material");
        assert_eq!(short_fingerprint(&fp), fp[..8]);
        assert_eq!(short_fingerprint("abc"), "abc");
    }

    #[test]
    fn test_fingerprint_deterministic() {
        assert_eq!(fingerprint(&[7u8; 32]), fingerprint(&[7u8; 32]));
        assert_ne!(fingerprint(&[7u8; 32]), fingerprint(&[8u8; 32]));
    }

    #[test]
    fn test_crc32_known_vector() {
        // CRC-32/ISO-HDLC of "123456789".
        assert_eq!(crc32(b"123456789"), 0xcbf4_3926);
    }

    #[test]
    fn test_crc32_sensitivity() {
        let base = crc32(b"payload");
        assert_ne!(base, crc32(b"paylOad"));
        assert_eq!(crc32(&[]), 0);
    }
}
