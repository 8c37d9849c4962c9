//! Node settings persisted as `settings.json`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use uuid::Uuid;

use crate::Result;

/// File name of the persisted settings record.
pub const SETTINGS_FILE: &str = "settings.json";

/// Current settings record version.
const SETTINGS_VERSION: u32 = 2;

/// User-scoped node settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Display nickname.
    pub nickname: String,
    /// Stable per-installation id.
    pub user_id: Uuid,
    /// Record version for future migrations.
    pub version: u32,
}

impl Settings {
    /// Create settings for a new installation.
    pub fn new(nickname: impl Into<String>) -> Self {
        Self {
            nickname: nickname.into(),
            user_id: Uuid::new_v4(),
            version: SETTINGS_VERSION,
        }
    }

    /// Load settings from a data directory, or `None` when absent.
    pub fn load(dir: &Path) -> Result<Option<Self>> {
        let path = dir.join(SETTINGS_FILE);
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&contents)?))
    }

    /// Persist settings into a data directory.
    pub fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(dir.join(SETTINGS_FILE), contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_is_none() {
        let dir = TempDir::new().unwrap();
        assert!(Settings::load(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let settings = Settings::new("ada");
        settings.save(dir.path()).unwrap();

        let loaded = Settings::load(dir.path()).unwrap().unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_user_id_is_stable_per_record() {
        let a = Settings::new("ada");
        let b = Settings::new("ada");
        assert_ne!(a.user_id, b.user_id);
    }

    #[test]
    fn test_malformed_settings_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(SETTINGS_FILE), "{broken").unwrap();
        assert!(Settings::load(dir.path()).is_err());
    }
}
