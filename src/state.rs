//! Persisted appliance configuration.
//!
//! Handlers never touch ambient globals; everything they may read or
//! write hangs off the context object passed into each call, and the
//! persisted part of that context lives here. [`ConfigStore`] owns the
//! current [`Config`] behind a lock and persists every mutation, so the
//! on-disk file always matches what handlers last committed.
//!
//! Concurrency: handler calls are synchronous within a session but
//! sessions run concurrently and background work (update checks) reads
//! the config too; the store is safe for all of that.

use std::path::PathBuf;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A saved Wake-on-LAN target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WakeOnLanDevice {
    /// Display name.
    pub name: String,
    /// Target MAC address, `aa:bb:cc:dd:ee:ff`.
    pub mac_address: String,
}

/// Appliance configuration, serialized as one JSON document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Install updates without asking.
    pub auto_update_enabled: bool,
    /// Follow the pre-release update channel.
    pub include_pre_release: bool,
    /// Keep the host awake by nudging the pointer.
    pub jiggler_enabled: bool,
    /// Video stream quality factor, `(0, 1]`.
    pub stream_quality_factor: f64,
    /// Saved Wake-on-LAN targets.
    pub wake_on_lan_devices: Vec<WakeOnLanDevice>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            auto_update_enabled: true,
            include_pre_release: false,
            jiggler_enabled: false,
            stream_quality_factor: 1.0,
            wake_on_lan_devices: Vec::new(),
        }
    }
}

/// Owner of the live configuration with an explicit load/save lifecycle.
pub struct ConfigStore {
    path: Option<PathBuf>,
    current: RwLock<Config>,
}

impl ConfigStore {
    /// A store that never touches disk. Used by tests and demos.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            current: RwLock::new(Config::default()),
        }
    }

    /// Load from `path`, falling back to defaults when the file does not
    /// exist yet. A file that exists but does not parse is an error - a
    /// corrupt config should be surfaced at startup, not silently reset.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let config = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Config::default(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path: Some(path),
            current: RwLock::new(config),
        })
    }

    /// A copy of the current configuration.
    pub fn snapshot(&self) -> Config {
        self.read_lock().clone()
    }

    /// Mutate the configuration and persist the result.
    ///
    /// The lock is held across the write so concurrent updates cannot
    /// persist out of order.
    pub fn update(&self, mutate: impl FnOnce(&mut Config)) -> Result<()> {
        let mut guard = self.write_lock();
        mutate(&mut guard);
        self.persist(&guard)
    }

    /// Restore defaults and persist.
    pub fn reset(&self) -> Result<()> {
        self.update(|config| *config = Config::default())
    }

    fn persist(&self, config: &Config) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let bytes = serde_json::to_vec_pretty(config)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    fn read_lock(&self) -> RwLockReadGuard<'_, Config> {
        self.current.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_lock(&self) -> RwLockWriteGuard<'_, Config> {
        self.current.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.auto_update_enabled);
        assert!(!config.include_pre_release);
        assert_eq!(config.stream_quality_factor, 1.0);
        assert!(config.wake_on_lan_devices.is_empty());
    }

    #[test]
    fn test_in_memory_update_does_not_touch_disk() {
        let store = ConfigStore::in_memory();
        store.update(|c| c.jiggler_enabled = true).unwrap();
        assert!(store.snapshot().jiggler_enabled);
    }

    #[test]
    fn test_load_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::load(dir.path().join("config.json")).unwrap();
        assert_eq!(store.snapshot(), Config::default());
    }

    #[test]
    fn test_update_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let store = ConfigStore::load(&path).unwrap();
        store
            .update(|c| {
                c.include_pre_release = true;
                c.wake_on_lan_devices.push(WakeOnLanDevice {
                    name: "workstation".into(),
                    mac_address: "aa:bb:cc:dd:ee:ff".into(),
                });
            })
            .unwrap();

        let reloaded = ConfigStore::load(&path).unwrap();
        let config = reloaded.snapshot();
        assert!(config.include_pre_release);
        assert_eq!(config.wake_on_lan_devices.len(), 1);
        assert_eq!(config.wake_on_lan_devices[0].name, "workstation");
    }

    #[test]
    fn test_reset_restores_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let store = ConfigStore::load(&path).unwrap();
        store.update(|c| c.auto_update_enabled = false).unwrap();
        store.reset().unwrap();

        assert_eq!(store.snapshot(), Config::default());
        assert_eq!(ConfigStore::load(&path).unwrap().snapshot(), Config::default());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, b"{not json").unwrap();

        assert!(ConfigStore::load(&path).is_err());
    }

    #[test]
    fn test_partial_file_takes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, br#"{"jigglerEnabled": true}"#).unwrap();

        let config = ConfigStore::load(&path).unwrap().snapshot();
        assert!(config.jiggler_enabled);
        assert!(config.auto_update_enabled); // default survives
    }
}
