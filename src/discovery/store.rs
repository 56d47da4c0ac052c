// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Persistence of discovered devices and cached payloads.
//!
//! The discovered list is one flat array of `{id, host, port, gen}` records
//! stored under [`STORAGE_KEY`]. Device payloads are cached per id so a
//! device that is offline at startup can still be built from its last known
//! state.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use parking_lot::Mutex;

use super::DiscoveredDevice;
use crate::device::DevicePayloads;
use crate::error::StorageError;
use crate::event::DeviceId;

/// Name of the persisted discovery list.
pub const STORAGE_KEY: &str = "DeviceIdentifiers";

/// Key-value persistence used by the discovery registry.
pub trait DeviceStore: Send + Sync + fmt::Debug {
    /// Reads the discovered list. A missing list is empty.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the list exists but cannot be read.
    fn load(&self) -> Result<Vec<DiscoveredDevice>, StorageError>;

    /// Replaces the discovered list.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the list cannot be written.
    fn save(&self, devices: &[DiscoveredDevice]) -> Result<(), StorageError>;

    /// Reads the cached payloads of one device.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the cache exists but cannot be read.
    fn load_payloads(&self, id: &DeviceId) -> Result<Option<DevicePayloads>, StorageError>;

    /// Caches the payloads of one device.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the cache cannot be written.
    fn save_payloads(&self, id: &DeviceId, payloads: &DevicePayloads) -> Result<(), StorageError>;
}

/// In-memory store, useful for tests and for running without persistence.
#[derive(Debug, Default)]
pub struct MemoryStore {
    devices: Mutex<Vec<DiscoveredDevice>>,
    payloads: Mutex<HashMap<DeviceId, DevicePayloads>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-filled with a discovered list.
    #[must_use]
    pub fn with_devices(devices: Vec<DiscoveredDevice>) -> Self {
        Self {
            devices: Mutex::new(devices),
            payloads: Mutex::default(),
        }
    }
}

impl DeviceStore for MemoryStore {
    fn load(&self) -> Result<Vec<DiscoveredDevice>, StorageError> {
        Ok(self.devices.lock().clone())
    }

    fn save(&self, devices: &[DiscoveredDevice]) -> Result<(), StorageError> {
        *self.devices.lock() = devices.to_vec();
        Ok(())
    }

    fn load_payloads(&self, id: &DeviceId) -> Result<Option<DevicePayloads>, StorageError> {
        Ok(self.payloads.lock().get(id).cloned())
    }

    fn save_payloads(&self, id: &DeviceId, payloads: &DevicePayloads) -> Result<(), StorageError> {
        self.payloads.lock().insert(id.clone(), payloads.clone());
        Ok(())
    }
}

/// JSON files in one directory: `DeviceIdentifiers.json` plus `<id>.json`
/// per cached device.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Uses `dir` for all files. The directory is created on first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Storage directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn list_path(&self) -> PathBuf {
        self.dir.join(format!("{STORAGE_KEY}.json"))
    }

    /// Ids come from device payloads, so anything that is not a single
    /// plain file name is refused.
    fn payload_path(&self, id: &DeviceId) -> Result<PathBuf, StorageError> {
        let name = id.as_str();
        let mut components = Path::new(name).components();
        let plain = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );
        if !plain || name.contains(['/', '\\', ':']) || name.contains("..") {
            return Err(StorageError::InvalidKey(name.to_string()));
        }
        Ok(self.dir.join(format!("{name}.json")))
    }

    fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>, StorageError> {
        match fs::read_to_string(path) {
            Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write_json<T: serde::Serialize + ?Sized>(&self, path: &Path, value: &T) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir)?;
        let contents = serde_json::to_string_pretty(value)?;
        fs::write(path, contents)?;
        tracing::debug!(path = %path.display(), "Saved");
        Ok(())
    }
}

impl DeviceStore for FileStore {
    fn load(&self) -> Result<Vec<DiscoveredDevice>, StorageError> {
        Ok(Self::read_json(&self.list_path())?.unwrap_or_default())
    }

    fn save(&self, devices: &[DiscoveredDevice]) -> Result<(), StorageError> {
        self.write_json(&self.list_path(), devices)
    }

    fn load_payloads(&self, id: &DeviceId) -> Result<Option<DevicePayloads>, StorageError> {
        Self::read_json(&self.payload_path(id)?)
    }

    fn save_payloads(&self, id: &DeviceId, payloads: &DevicePayloads) -> Result<(), StorageError> {
        self.write_json(&self.payload_path(id)?, payloads)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::types::Generation;

    fn sample() -> Vec<DiscoveredDevice> {
        vec![
            DiscoveredDevice::new("shelly1-abc", "10.0.0.5", 80, Some(Generation::Gen1)),
            DiscoveredDevice::new("shellyplus1-def", "10.0.0.6", 80, Some(Generation::Gen2)),
        ]
    }

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryStore::new();
        assert!(store.load().unwrap().is_empty());
        store.save(&sample()).unwrap();
        assert_eq!(store.load().unwrap(), sample());
    }

    #[test]
    fn file_store_missing_files_are_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested"));
        assert!(store.load().unwrap().is_empty());
        assert!(store.load_payloads(&DeviceId::new("x")).unwrap().is_none());
    }

    #[test]
    fn file_store_creates_directory_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested"));
        store.save(&sample()).unwrap();

        let reopened = FileStore::new(dir.path().join("nested"));
        assert_eq!(reopened.load().unwrap(), sample());
        assert!(dir.path().join("nested/DeviceIdentifiers.json").exists());
    }

    #[test]
    fn file_store_caches_payloads_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let id = DeviceId::new("Shelly1-ABC");
        let payloads = DevicePayloads {
            shelly: json!({"type": "SHSW-1", "mac": "AABBCC"}),
            settings: json!({}),
            status: json!({}),
        };
        store.save_payloads(&id, &payloads).unwrap();
        assert!(dir.path().join("shelly1-abc.json").exists());
        assert_eq!(store.load_payloads(&id).unwrap(), Some(payloads));
    }

    #[test]
    fn payload_keys_stay_inside_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("store"));
        let payloads = DevicePayloads {
            shelly: json!({}),
            settings: json!({}),
            status: json!({}),
        };

        for id in ["../escaped", "/tmp/absolute", "a/b", "a\\b", "..", "c:evil"] {
            let id = DeviceId::new(id);
            assert!(
                matches!(store.save_payloads(&id, &payloads), Err(StorageError::InvalidKey(_))),
                "{id} was accepted"
            );
            assert!(matches!(store.load_payloads(&id), Err(StorageError::InvalidKey(_))));
        }
        assert!(!dir.path().join("escaped.json").exists());
        assert!(store.save_payloads(&DeviceId::new("shellyplus1-a"), &payloads).is_ok());
    }

    #[test]
    fn corrupt_list_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("DeviceIdentifiers.json"), "{not json").unwrap();
        let store = FileStore::new(dir.path());
        assert!(matches!(store.load(), Err(StorageError::Json(_))));
    }
}
