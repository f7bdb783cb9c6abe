//! Persistence for the bearer token between runs.

use std::{
    collections::BTreeMap,
    fs,
    path::PathBuf,
    sync::{Arc, Mutex, PoisonError},
};

use crate::{
    consts::KEYRING_SERVICE,
    core::{restrict_file_permissions, write_file_atomic},
    error::StoreError,
};

pub trait TokenStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// JSON object of key/value pairs kept in a single `0600` file.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, StoreError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let raw = fs::read_to_string(&self.path)?;
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&raw)?)
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value = self
            .read_all()?
            .remove(key)
            .filter(|value| !value.trim().is_empty());
        tracing::debug!(
            "token_store(file): get {key} found={}",
            value.is_some()
        );
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.read_all()?;
        entries.insert(key.to_string(), value.to_string());
        let content = serde_json::to_string_pretty(&entries)?;
        write_file_atomic(&self.path, &content)?;
        restrict_file_permissions(&self.path);
        tracing::debug!("token_store(file): set {key} len={}", value.len());
        Ok(())
    }
}

/// OS keychain entry per key under one service name.
///
/// Entries are opened once per key and reused, so a backend that keeps the
/// secret on the entry itself still answers `get` after `set`.
pub struct KeyringTokenStore {
    service: String,
    entries: Mutex<BTreeMap<String, Arc<keyring::Entry>>>,
}

impl std::fmt::Debug for KeyringTokenStore {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("KeyringTokenStore")
            .field("service", &self.service)
            .finish()
    }
}

impl KeyringTokenStore {
    pub fn new() -> Self {
        Self::with_service(KEYRING_SERVICE)
    }

    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    fn entry(&self, key: &str) -> Result<Arc<keyring::Entry>, StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = entries.get(key) {
            return Ok(Arc::clone(entry));
        }
        let entry = Arc::new(keyring::Entry::new(&self.service, key)?);
        entries.insert(key.to_string(), Arc::clone(&entry));
        Ok(entry)
    }
}

impl Default for KeyringTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenStore for KeyringTokenStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self.entry(key)?.get_password() {
            Ok(value) if !value.trim().is_empty() => Ok(Some(value)),
            Ok(_) | Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entry(key)?.set_password(value)?;
        tracing::debug!("token_store(keyring): set {key} len={}", value.len());
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(key: &str, value: &str) -> Self {
        let store = Self::default();
        store
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        store
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
