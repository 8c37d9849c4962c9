//! # meshit-crypto
//!
//! Cryptographic primitives and the Noise-XX session layer for the meshIt
//! mesh protocol.
//!
//! This crate provides:
//!
//! - **AEAD**: ChaCha20-Poly1305 with 96-bit nonces
//! - **Key Exchange**: X25519 Diffie-Hellman
//! - **Signatures**: Ed25519 sign/verify
//! - **Key Derivation**: HKDF-SHA256 with a fixed zero extract salt
//! - **Integrity**: SHA-256 fingerprints and CRC-32 frame checksums
//! - **Compression**: threshold-gated LZ4 block compression
//! - **Handshake**: the three-message mutually authenticating exchange and
//!   the per-peer transport session derived from it
//!
//! ## Security
//!
//! All secret key material implements `Zeroize` and is wiped on drop.
//! `Debug` implementations never print secret bytes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod aead;
pub mod compress;
pub mod ed25519;
pub mod error;
pub mod handshake;
pub mod hash;
pub mod kdf;
pub mod session;
pub mod x25519;

pub use aead::{open, seal, AeadKey, KEY_SIZE, NONCE_SIZE, TAG_SIZE};
pub use error::{CryptoError, Result};
pub use handshake::{Initiator, Responder, TransportKeys};
pub use hash::{crc32, fingerprint, sha256, short_fingerprint};
pub use session::NoiseSession;
pub use x25519::{SharedSecret, X25519PrivateKey, X25519PublicKey};
