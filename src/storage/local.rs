//! Local filesystem storage backend.

use super::path::validate;
use super::{BoxRead, Storage, StorageError};
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Stores blobs as files below a root directory.
///
/// ```no_run
/// use image_variations::storage::{LocalStorage, Storage};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let storage = LocalStorage::new("media", "/srv/shop/media")?;
/// storage.save("image/2024/01/a.jpg", b"...")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct LocalStorage {
    name: String,
    root: PathBuf,
}

impl LocalStorage {
    /// Create a backend rooted at `root`, creating the directory if needed.
    ///
    /// Fails with [`StorageError::InvalidPath`] if `root` exists but is not
    /// a directory.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self, StorageError> {
        let root = root.as_ref().to_path_buf();
        if root.exists() {
            if !root.is_dir() {
                return Err(StorageError::InvalidPath(root.display().to_string()));
            }
        } else {
            fs::create_dir_all(&root)
                .map_err(|e| StorageError::from_io(e, &root.display().to_string()))?;
        }
        Ok(Self {
            name: name.into(),
            root,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn absolute_path(&self, path: &str) -> Result<(String, PathBuf), StorageError> {
        let key = validate(path)?;
        let absolute = self.root.join(&key);
        Ok((key, absolute))
    }
}

impl Storage for LocalStorage {
    fn name(&self) -> &str {
        &self.name
    }

    fn exists(&self, path: &str) -> Result<bool, StorageError> {
        let (_, absolute) = self.absolute_path(path)?;
        Ok(absolute.is_file())
    }

    fn open(&self, path: &str) -> Result<BoxRead, StorageError> {
        let (key, absolute) = self.absolute_path(path)?;
        let file = File::open(&absolute).map_err(|e| StorageError::from_io(e, &key))?;
        Ok(Box::new(BufReader::new(file)))
    }

    fn save(&self, path: &str, data: &[u8]) -> Result<String, StorageError> {
        let (key, absolute) = self.absolute_path(path)?;
        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent).map_err(|e| StorageError::from_io(e, &key))?;
        }
        fs::write(&absolute, data).map_err(|e| StorageError::from_io(e, &key))?;
        Ok(key)
    }

    fn delete(&self, path: &str) -> Result<(), StorageError> {
        let (key, absolute) = self.absolute_path(path)?;
        match fs::remove_file(&absolute) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::from_io(e, &key)),
        }
    }
}
