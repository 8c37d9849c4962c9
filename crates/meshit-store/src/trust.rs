//! Trust levels persisted as `trust.json`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::warn;

use meshit_identity::TrustLevel;

use crate::Result;

/// File name of the persisted trust map.
pub const TRUST_FILE: &str = "trust.json";

#[derive(Default, Serialize, Deserialize)]
struct TrustRecord {
    #[serde(default)]
    peers: HashMap<String, TrustLevel>,
}

/// Fingerprint → trust level map with immediate persistence.
///
/// A malformed file is treated as empty with a warning; losing trust
/// badges is annoying, refusing to start is worse.
pub struct TrustStore {
    path: PathBuf,
    entries: RwLock<HashMap<String, TrustLevel>>,
}

impl TrustStore {
    /// Open the trust map from a data directory.
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let path = dir.join(TRUST_FILE);
        let entries = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<TrustRecord>(&contents) {
                Ok(record) => record.peers,
                Err(e) => {
                    warn!(error = %e, "trust.json unreadable, starting empty");
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    /// The trust level for a fingerprint (`Unknown` when absent).
    pub fn level(&self, fingerprint: &str) -> TrustLevel {
        self.entries
            .read()
            .expect("trust map poisoned")
            .get(fingerprint)
            .copied()
            .unwrap_or_default()
    }

    /// Set and persist the trust level for a fingerprint.
    pub fn set_level(&self, fingerprint: &str, level: TrustLevel) -> Result<()> {
        {
            let mut entries = self.entries.write().expect("trust map poisoned");
            if level == TrustLevel::Unknown {
                entries.remove(fingerprint);
            } else {
                entries.insert(fingerprint.to_string(), level);
            }
        }
        self.persist()
    }

    /// Fingerprints at `Verified` or above.
    pub fn verified_peers(&self) -> Vec<String> {
        let mut peers: Vec<String> = self
            .entries
            .read()
            .expect("trust map poisoned")
            .iter()
            .filter(|(_, level)| level.is_verified())
            .map(|(fp, _)| fp.clone())
            .collect();
        peers.sort();
        peers
    }

    fn persist(&self) -> Result<()> {
        let record = TrustRecord {
            peers: self.entries.read().expect("trust map poisoned").clone(),
        };
        fs::write(&self.path, serde_json::to_string_pretty(&record)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_unknown_by_default() {
        let dir = TempDir::new().unwrap();
        let store = TrustStore::open(dir.path()).unwrap();
        assert_eq!(store.level(&"a".repeat(64)), TrustLevel::Unknown);
    }

    #[test]
    fn test_set_and_reload() {
        let dir = TempDir::new().unwrap();
        let fingerprint = "a".repeat(64);
        {
            let store = TrustStore::open(dir.path()).unwrap();
            store.set_level(&fingerprint, TrustLevel::Verified).unwrap();
        }

        let store = TrustStore::open(dir.path()).unwrap();
        assert_eq!(store.level(&fingerprint), TrustLevel::Verified);
        assert_eq!(store.verified_peers(), vec![fingerprint]);
    }

    #[test]
    fn test_reset_to_unknown_removes_entry() {
        let dir = TempDir::new().unwrap();
        let fingerprint = "a".repeat(64);
        let store = TrustStore::open(dir.path()).unwrap();
        store.set_level(&fingerprint, TrustLevel::Favorite).unwrap();
        store.set_level(&fingerprint, TrustLevel::Unknown).unwrap();

        assert!(store.verified_peers().is_empty());
        let raw = fs::read_to_string(dir.path().join(TRUST_FILE)).unwrap();
        assert!(!raw.contains(&fingerprint));
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(TRUST_FILE), "]]not json[[").unwrap();
        let store = TrustStore::open(dir.path()).unwrap();
        assert!(store.verified_peers().is_empty());
    }
}
