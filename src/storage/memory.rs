//! In-memory storage for tests.

use super::path::validate;
use super::{BoxRead, Storage, StorageError};
use std::collections::BTreeMap;
use std::io::Cursor;
use std::sync::Mutex;

/// Blob map behind a mutex, with operation counters so tests can assert
/// what the render pipeline actually did.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    blobs: Mutex<BTreeMap<String, Vec<u8>>>,
    saves: Mutex<Vec<String>>,
    deletes: Mutex<Vec<String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a blob without recording it as a save.
    pub fn insert(&self, path: &str, data: impl Into<Vec<u8>>) {
        let key = validate(path).unwrap_or_else(|_| path.to_string());
        self.blobs.lock().unwrap().insert(key, data.into());
    }

    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.blobs.lock().unwrap().get(path).cloned()
    }

    /// Sorted list of stored keys.
    pub fn keys(&self) -> Vec<String> {
        self.blobs.lock().unwrap().keys().cloned().collect()
    }

    /// Snapshot of every key and its bytes.
    pub fn snapshot(&self) -> BTreeMap<String, Vec<u8>> {
        self.blobs.lock().unwrap().clone()
    }

    pub fn saved(&self) -> Vec<String> {
        self.saves.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deletes.lock().unwrap().clone()
    }
}

impl Storage for MemoryStorage {
    fn name(&self) -> &str {
        "memory"
    }

    fn exists(&self, path: &str) -> Result<bool, StorageError> {
        let key = validate(path)?;
        Ok(self.blobs.lock().unwrap().contains_key(&key))
    }

    fn open(&self, path: &str) -> Result<BoxRead, StorageError> {
        let key = validate(path)?;
        let data = self
            .blobs
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .ok_or(StorageError::NotFound(key))?;
        Ok(Box::new(Cursor::new(data)))
    }

    fn save(&self, path: &str, data: &[u8]) -> Result<String, StorageError> {
        let key = validate(path)?;
        self.blobs.lock().unwrap().insert(key.clone(), data.to_vec());
        self.saves.lock().unwrap().push(key.clone());
        Ok(key)
    }

    fn delete(&self, path: &str) -> Result<(), StorageError> {
        let key = validate(path)?;
        self.blobs.lock().unwrap().remove(&key);
        self.deletes.lock().unwrap().push(key);
        Ok(())
    }
}
