//! Identity persistence behind an at-rest protection boundary.
//!
//! The store never touches the filesystem itself; it talks to a
//! [`ProtectedStorage`] implementation whose job is to bind decryption
//! ability to the current OS user account. A keyring-backed implementation
//! lives in `meshit-store`; [`MemoryProtectedStorage`] is the test double.
//!
//! Missing storage yields a fresh identity. Corrupt or undecryptable
//! storage also falls back to fresh generation, with a warning, so a damaged
//! profile never bricks the node.

use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{info, warn};

use crate::keypair::NodeIdentity;
use crate::{IdentityError, Result};

/// File name of the persisted identity record.
pub const IDENTITY_FILE: &str = "identity.json";

/// Current on-disk identity record version.
const IDENTITY_VERSION: u32 = 1;

/// At-rest protection contract for sensitive state.
///
/// `read_protected` returns `Ok(None)` when nothing has been stored under
/// `name`. Implementations must guarantee that material written on one user
/// account cannot be decrypted from another.
pub trait ProtectedStorage: Send + Sync {
    /// Read and unprotect a named blob, or `None` if absent.
    fn read_protected(&self, name: &str) -> Result<Option<Vec<u8>>>;

    /// Protect and persist a named blob.
    fn write_protected(&self, name: &str, bytes: &[u8]) -> Result<()>;
}

/// The serialized identity record.
///
/// Private keys are base64 (the surrounding blob is already protected);
/// public keys are kept in plaintext hex so tooling can read them without
/// unlocking anything.
#[derive(Serialize, Deserialize)]
struct StoredIdentity {
    version: u32,
    noise_private: String,
    signing_private: String,
    noise_public: String,
    signing_public: String,
    nickname: String,
}

/// Loads and saves [`NodeIdentity`] through a [`ProtectedStorage`].
pub struct IdentityStore {
    storage: Box<dyn ProtectedStorage>,
}

impl IdentityStore {
    /// Create a store over the given protection backend.
    pub fn new(storage: Box<dyn ProtectedStorage>) -> Self {
        Self { storage }
    }

    /// Load the stored identity, or create and persist a fresh one.
    ///
    /// A supplied nickname overlays the stored one. Corrupt storage falls
    /// back to fresh generation with a warning; only backend I/O failures
    /// propagate.
    pub fn load_or_create(&self, nickname: Option<&str>) -> Result<NodeIdentity> {
        let stored = match self.storage.read_protected(IDENTITY_FILE) {
            Ok(stored) => stored,
            // Undecryptable material is corruption, not an outage; fall
            // back to fresh generation like any other corrupt record.
            Err(IdentityError::Crypto(e)) => {
                warn!("stored identity failed to unprotect ({e}), generating a fresh keypair");
                let identity = NodeIdentity::generate(nickname.unwrap_or_default());
                self.save(&identity)?;
                return Ok(identity);
            }
            Err(e) => return Err(e),
        };
        match stored {
            None => {
                info!("no stored identity, generating a fresh keypair");
                let identity = NodeIdentity::generate(nickname.unwrap_or_default());
                self.save(&identity)?;
                Ok(identity)
            }
            Some(bytes) => match Self::decode(&bytes, nickname) {
                Ok(identity) => Ok(identity),
                Err(e) => {
                    warn!("stored identity unusable ({e}), generating a fresh keypair");
                    let identity = NodeIdentity::generate(nickname.unwrap_or_default());
                    self.save(&identity)?;
                    Ok(identity)
                }
            },
        }
    }

    /// Persist the identity.
    pub fn save(&self, identity: &NodeIdentity) -> Result<()> {
        let record = StoredIdentity {
            version: IDENTITY_VERSION,
            noise_private: general_purpose::STANDARD.encode(identity.noise_private().as_bytes()),
            signing_private: general_purpose::STANDARD.encode(identity.signing_key().as_bytes()),
            noise_public: hex::encode(identity.noise_public().as_bytes()),
            signing_public: hex::encode(identity.verifying_key().as_bytes()),
            nickname: identity.nickname().to_string(),
        };
        let bytes = serde_json::to_vec(&record)
            .map_err(|e| IdentityError::CorruptIdentity(e.to_string()))?;
        self.storage.write_protected(IDENTITY_FILE, &bytes)
    }

    fn decode(bytes: &[u8], nickname: Option<&str>) -> Result<NodeIdentity> {
        let record: StoredIdentity = serde_json::from_slice(bytes)
            .map_err(|e| IdentityError::CorruptIdentity(e.to_string()))?;

        let noise_private = general_purpose::STANDARD
            .decode(&record.noise_private)
            .map_err(|e| IdentityError::CorruptIdentity(format!("noise key base64: {e}")))?;
        let signing_private = general_purpose::STANDARD
            .decode(&record.signing_private)
            .map_err(|e| IdentityError::CorruptIdentity(format!("signing key base64: {e}")))?;

        let identity = NodeIdentity::from_parts(
            &noise_private,
            &signing_private,
            nickname.unwrap_or(&record.nickname),
        )?;

        // The stored public halves must match what the privates derive to.
        if hex::encode(identity.noise_public().as_bytes()) != record.noise_public {
            return Err(IdentityError::CorruptIdentity(
                "noise public key mismatch".into(),
            ));
        }
        if hex::encode(identity.verifying_key().as_bytes()) != record.signing_public {
            return Err(IdentityError::CorruptIdentity(
                "signing public key mismatch".into(),
            ));
        }
        Ok(identity)
    }
}

/// In-memory [`ProtectedStorage`] for tests and ephemeral nodes.
#[derive(Default)]
pub struct MemoryProtectedStorage {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryProtectedStorage {
    /// Create an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProtectedStorage for MemoryProtectedStorage {
    fn read_protected(&self, name: &str) -> Result<Option<Vec<u8>>> {
        Ok(self
            .blobs
            .lock()
            .expect("storage mutex poisoned")
            .get(name)
            .cloned())
    }

    fn write_protected(&self, name: &str, bytes: &[u8]) -> Result<()> {
        self.blobs
            .lock()
            .expect("storage mutex poisoned")
            .insert(name.to_string(), bytes.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> IdentityStore {
        IdentityStore::new(Box::new(MemoryProtectedStorage::new()))
    }

    #[test]
    fn test_creates_when_missing() {
        let store = store();
        let identity = store.load_or_create(Some("ada")).unwrap();
        assert_eq!(identity.nickname(), "ada");

        // Second load returns the same keys.
        let again = store.load_or_create(None).unwrap();
        assert_eq!(again.fingerprint(), identity.fingerprint());
    }

    #[test]
    fn test_nickname_overlay() {
        let store = store();
        let first = store.load_or_create(Some("ada")).unwrap();
        let second = store.load_or_create(Some("grace")).unwrap();

        assert_eq!(second.fingerprint(), first.fingerprint());
        assert_eq!(second.nickname(), "grace");
    }

    #[test]
    fn test_stored_nickname_when_none_supplied() {
        let store = store();
        store.load_or_create(Some("ada")).unwrap();
        let loaded = store.load_or_create(None).unwrap();
        assert_eq!(loaded.nickname(), "ada");
    }

    #[test]
    fn test_corrupt_storage_regenerates() {
        let backend = MemoryProtectedStorage::new();
        backend
            .write_protected(IDENTITY_FILE, b"not json at all")
            .unwrap();
        let store = IdentityStore::new(Box::new(backend));

        let identity = store.load_or_create(Some("ada")).unwrap();
        assert_eq!(identity.fingerprint().len(), 64);

        // The regenerated identity was persisted and is now stable.
        let again = store.load_or_create(None).unwrap();
        assert_eq!(again.fingerprint(), identity.fingerprint());
    }

    #[test]
    fn test_tampered_public_key_regenerates() {
        let backend = MemoryProtectedStorage::new();
        let store = IdentityStore::new(Box::new(backend));
        let original = store.load_or_create(Some("ada")).unwrap();

        // Flip the stored noise public key.
        let bytes = store
            .storage
            .read_protected(IDENTITY_FILE)
            .unwrap()
            .unwrap();
        let mut record: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        record["noise_public"] = serde_json::Value::String("00".repeat(32));
        store
            .storage
            .write_protected(IDENTITY_FILE, &serde_json::to_vec(&record).unwrap())
            .unwrap();

        let regenerated = store.load_or_create(Some("ada")).unwrap();
        assert_ne!(regenerated.fingerprint(), original.fingerprint());
    }
}
