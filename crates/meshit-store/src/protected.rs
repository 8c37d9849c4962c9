//! At-rest protection for identity material.
//!
//! Blobs are sealed with ChaCha20-Poly1305 under a 32-byte wrapping key
//! that never touches the data directory: it lives in the OS credential
//! store, which binds decryption ability to the current user account.
//! [`FileProtectedStorage`] does the sealing given a key;
//! [`KeyringProtectedStorage`] fetches (or mints) the key from the
//! credential store and delegates.

use base64::{engine::general_purpose, Engine as _};
use keyring::Entry;
use rand::rngs::OsRng;
use rand::RngCore;
use std::fs;
use std::path::PathBuf;
use tracing::info;

use meshit_crypto::aead::{self, AeadKey, NONCE_SIZE};
use meshit_identity::{IdentityError, ProtectedStorage};

const KEYRING_SERVICE: &str = "meshIt";
const KEYRING_ACCOUNT: &str = "identity-wrapping-key";

/// Seals blobs into files under a directory with a caller-supplied key.
pub struct FileProtectedStorage {
    dir: PathBuf,
    key: AeadKey,
}

impl FileProtectedStorage {
    /// Create storage over `dir` with the given wrapping key.
    pub fn new(dir: impl Into<PathBuf>, key: AeadKey) -> Result<Self, IdentityError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| IdentityError::Storage(e.to_string()))?;
        Ok(Self { dir, key })
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}

impl ProtectedStorage for FileProtectedStorage {
    fn read_protected(&self, name: &str) -> Result<Option<Vec<u8>>, IdentityError> {
        let sealed = match fs::read(self.path_for(name)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(IdentityError::Storage(e.to_string())),
        };
        if sealed.len() < NONCE_SIZE {
            return Err(IdentityError::Crypto(
                meshit_crypto::CryptoError::Decryption,
            ));
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_SIZE);
        let nonce: [u8; NONCE_SIZE] = nonce.try_into().expect("split at nonce width");
        let plaintext = aead::open(&self.key, &nonce, name.as_bytes(), ciphertext)?;
        Ok(Some(plaintext))
    }

    fn write_protected(&self, name: &str, bytes: &[u8]) -> Result<(), IdentityError> {
        let mut nonce = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce);
        let ciphertext = aead::seal(&self.key, &nonce, name.as_bytes(), bytes)?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        fs::write(self.path_for(name), sealed).map_err(|e| IdentityError::Storage(e.to_string()))
    }
}

/// Protected storage whose wrapping key lives in the OS credential store.
pub struct KeyringProtectedStorage {
    inner: FileProtectedStorage,
}

impl KeyringProtectedStorage {
    /// Open storage over `dir`, fetching or minting the wrapping key.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the credential store is unavailable or
    /// holds an unusable key.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, IdentityError> {
        let key = Self::load_or_create_key()?;
        Ok(Self {
            inner: FileProtectedStorage::new(dir, key)?,
        })
    }

    fn load_or_create_key() -> Result<AeadKey, IdentityError> {
        let entry = Entry::new(KEYRING_SERVICE, KEYRING_ACCOUNT)
            .map_err(|e| IdentityError::Storage(format!("keyring init: {e}")))?;

        match entry.get_password() {
            Ok(encoded) => {
                let bytes = general_purpose::STANDARD
                    .decode(encoded)
                    .map_err(|e| IdentityError::Storage(format!("wrapping key base64: {e}")))?;
                Ok(AeadKey::from_bytes(&bytes)?)
            }
            Err(keyring::Error::NoEntry) => {
                info!("no wrapping key in credential store, minting one");
                let key = AeadKey::generate();
                entry
                    .set_password(&general_purpose::STANDARD.encode(key.as_bytes()))
                    .map_err(|e| IdentityError::Storage(format!("store wrapping key: {e}")))?;
                Ok(key)
            }
            Err(e) => Err(IdentityError::Storage(format!("load wrapping key: {e}"))),
        }
    }
}

impl ProtectedStorage for KeyringProtectedStorage {
    fn read_protected(&self, name: &str) -> Result<Option<Vec<u8>>, IdentityError> {
        self.inner.read_protected(name)
    }

    fn write_protected(&self, name: &str, bytes: &[u8]) -> Result<(), IdentityError> {
        self.inner.write_protected(name, bytes)
    }
}
