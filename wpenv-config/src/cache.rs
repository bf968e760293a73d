//! Small on-disk key/value store under the work directory.
//!
//! The `start` and `clean` commands consult it to decide whether the
//! configuration changed since the last run and WordPress needs to be
//! reconfigured. A missing or corrupt cache file is treated as empty; the
//! read-modify-write in `set` is deliberately unlocked, since the tool is a
//! single-user local CLI never run concurrently against one work directory.

// Standard library imports
use std::fs;
use std::path::{Path, PathBuf};

// External crate imports
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tracing::debug;

// Internal imports
use crate::config::WpEnvConfig;
use wpenv_core::error::Result;

/// Cache key under which the configuration checksum is stored.
pub const CONFIG_CHECKSUM_KEY: &str = "config_checksum";

const CACHE_FILE: &str = "wp-env-cache.json";

pub struct ConfigCache {
    path: PathBuf,
}

impl ConfigCache {
    pub fn new(work_directory_path: &Path) -> Self {
        Self {
            path: work_directory_path.join(CACHE_FILE),
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.read_entries().get(key).cloned()
    }

    pub fn set(&self, key: &str, value: Value) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut entries = self.read_entries();
        entries.insert(key.to_string(), value);
        fs::write(&self.path, serde_json::to_string_pretty(&entries)?)?;
        Ok(())
    }

    /// Whether the stored value for `key` differs from `value` (a missing
    /// entry always counts as changed).
    pub fn did_change(&self, key: &str, value: &Value) -> bool {
        self.get(key).as_ref() != Some(value)
    }

    fn read_entries(&self) -> Map<String, Value> {
        let Ok(contents) = fs::read_to_string(&self.path) else {
            return Map::new();
        };
        match serde_json::from_str::<Value>(&contents) {
            Ok(Value::Object(entries)) => entries,
            _ => {
                debug!("Ignoring unreadable cache file at: {}", self.path.display());
                Map::new()
            }
        }
    }
}

/// Checksum of the fully resolved configuration, stored under
/// [`CONFIG_CHECKSUM_KEY`] by the start/clean collaborators.
pub fn config_checksum(config: &WpEnvConfig) -> Result<String> {
    let serialized = serde_json::to_string(config)?;
    Ok(format!("{:x}", Sha256::digest(serialized.as_bytes())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_get_set_round_trip() {
        let dir = tempdir().unwrap();
        let cache = ConfigCache::new(dir.path());

        assert_eq!(cache.get("key"), None);
        cache.set("key", json!("value")).unwrap();
        assert_eq!(cache.get("key"), Some(json!("value")));

        // Other keys survive a second write.
        cache.set("other", json!(42)).unwrap();
        assert_eq!(cache.get("key"), Some(json!("value")));
        assert_eq!(cache.get("other"), Some(json!(42)));
    }

    #[test]
    fn test_did_change() {
        let dir = tempdir().unwrap();
        let cache = ConfigCache::new(dir.path());

        assert!(cache.did_change("key", &json!("a")));
        cache.set("key", json!("a")).unwrap();
        assert!(!cache.did_change("key", &json!("a")));
        assert!(cache.did_change("key", &json!("b")));
    }

    #[test]
    fn test_corrupt_cache_file_is_treated_as_empty() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(CACHE_FILE), "{ not json").unwrap();

        let cache = ConfigCache::new(dir.path());
        assert_eq!(cache.get("key"), None);
        cache.set("key", json!(1)).unwrap();
        assert_eq!(cache.get("key"), Some(json!(1)));
    }

    #[test]
    fn test_missing_work_directory_is_created_on_set() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("deeper/work");
        let cache = ConfigCache::new(&nested);
        cache.set("key", json!(true)).unwrap();
        assert!(nested.join(CACHE_FILE).is_file());
    }
}
