//! # meshit-identity
//!
//! Long-term node identity for the meshIt mesh.
//!
//! A node owns two keypairs: an X25519 static pair for the Noise handshake
//! and an Ed25519 pair for signatures. The node **fingerprint** is the
//! lowercase hex of SHA-256 over the X25519 public key. Identities are
//! created once, persisted behind an at-rest protection boundary
//! ([`ProtectedStorage`]) bound to the current OS user, and never rotated
//! except by an explicit wipe.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod keypair;
pub mod store;
pub mod trust;
pub mod uri;

pub use error::{IdentityError, Result};
pub use keypair::NodeIdentity;
pub use store::{IdentityStore, MemoryProtectedStorage, ProtectedStorage};
pub use trust::TrustLevel;
pub use uri::{parse_verification_uri, verification_uri};
