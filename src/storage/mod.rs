//! Storage adapter: named blobs, independent of the backing medium.
//!
//! The render pipeline only ever needs four things from storage: does a key
//! exist, read it, write it, delete it. So [`Storage`] is a small blocking
//! CRUD trait. Keys are `/`-separated strings relative to the storage root,
//! normalised by [`path::validate`] before they reach a backend.
//!
//! | Backend | Type | Availability |
//! |---|---|---|
//! | Local filesystem | [`LocalStorage`] | always |
//! | S3-compatible object store | `S3Storage` | feature `s3` |
//! | In-memory | `MemoryStorage` | tests / feature `mock` |
//!
//! ## Descriptors
//!
//! Bulk rendering runs on a worker pool where every worker opens its own
//! handle. Workers therefore receive a [`StorageDescriptor`] (plain,
//! serialisable configuration) and call [`StorageDescriptor::connect`]
//! rather than sharing a live client.

mod local;
#[cfg(any(test, feature = "mock"))]
mod memory;
pub mod path;
#[cfg(feature = "s3")]
mod s3;

pub use local::LocalStorage;
#[cfg(any(test, feature = "mock"))]
pub use memory::MemoryStorage;
#[cfg(feature = "s3")]
pub use s3::S3Storage;

use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("File not found: {0}")]
    NotFound(String),
    #[error("Invalid storage path: {0:?}")]
    InvalidPath(String),
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Storage backend error: {0}")]
    Backend(String),
    #[error("Unsupported storage backend: {0}")]
    Unsupported(String),
}

impl StorageError {
    /// Map an I/O error for `path` onto the storage taxonomy, keeping
    /// "not found" distinguishable from other failures.
    pub(crate) fn from_io(e: std::io::Error, path: &str) -> Self {
        match e.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path.to_string()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_string()),
            _ => Self::Io(e),
        }
    }
}

pub type BoxRead = Box<dyn Read + Send + 'static>;

/// Unified blocking interface over storage backends.
pub trait Storage: Send + Sync {
    /// Backend name, used for logging only.
    fn name(&self) -> &str;

    /// Check whether a blob exists.
    fn exists(&self, path: &str) -> Result<bool, StorageError>;

    /// Open a blob for reading.
    ///
    /// Returns [`StorageError::NotFound`] if the blob does not exist.
    fn open(&self, path: &str) -> Result<BoxRead, StorageError>;

    /// Read a whole blob into memory.
    fn read(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let mut reader = self.open(path)?;
        let mut buf = Vec::new();
        reader
            .read_to_end(&mut buf)
            .map_err(|e| StorageError::from_io(e, path))?;
        Ok(buf)
    }

    /// Write a blob, creating or overwriting it. Returns the normalised key
    /// the blob was stored under.
    fn save(&self, path: &str, data: &[u8]) -> Result<String, StorageError>;

    /// Delete a blob. Deleting a blob that does not exist is not an error.
    fn delete(&self, path: &str) -> Result<(), StorageError>;
}

/// Serialisable recipe for opening a [`Storage`] handle.
///
/// This is the `[storage]` table of the config file:
///
/// ```toml
/// [storage]
/// backend = "local"
/// root = "media"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageDescriptor {
    Local {
        root: PathBuf,
    },
    S3 {
        bucket: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prefix: Option<String>,
        region: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        endpoint: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        key_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        key_secret: Option<String>,
    },
}

impl Default for StorageDescriptor {
    fn default() -> Self {
        Self::Local {
            root: PathBuf::from("media"),
        }
    }
}

impl StorageDescriptor {
    /// Short human-readable label (`local:media`, `s3:bucket/prefix`).
    pub fn label(&self) -> String {
        match self {
            Self::Local { root } => format!("local:{}", root.display()),
            Self::S3 { bucket, prefix, .. } => match prefix {
                Some(p) => format!("s3:{}/{}", bucket, p.trim_matches('/')),
                None => format!("s3:{}", bucket),
            },
        }
    }

    /// Open a fresh, independent storage handle.
    pub fn connect(&self) -> Result<Box<dyn Storage>, StorageError> {
        match self {
            Self::Local { root } => Ok(Box::new(LocalStorage::new(self.label(), root)?)),
            #[cfg(feature = "s3")]
            Self::S3 {
                bucket,
                prefix,
                region,
                endpoint,
                key_id,
                key_secret,
            } => {
                let key_id = resolve_secret(key_id.as_deref(), "AWS_ACCESS_KEY_ID")?;
                let key_secret = resolve_secret(key_secret.as_deref(), "AWS_SECRET_ACCESS_KEY")?;
                Ok(Box::new(S3Storage::connect(
                    self.label(),
                    bucket,
                    prefix.clone(),
                    region,
                    endpoint.clone(),
                    key_id,
                    key_secret,
                )?))
            }
            #[cfg(not(feature = "s3"))]
            Self::S3 { .. } => Err(StorageError::Unsupported(
                "s3 (rebuild with the `s3` feature)".to_string(),
            )),
        }
    }
}

#[cfg(feature = "s3")]
fn resolve_secret(configured: Option<&str>, env_var: &str) -> Result<String, StorageError> {
    match configured {
        Some(value) => Ok(value.to_string()),
        None => std::env::var(env_var).map_err(|_| {
            StorageError::Backend(format!("no credentials configured and {env_var} is unset"))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_parses_local_table() {
        let descriptor: StorageDescriptor = toml::from_str(
            r#"
            backend = "local"
            root = "/srv/media"
            "#,
        )
        .unwrap();
        assert_eq!(
            descriptor,
            StorageDescriptor::Local {
                root: PathBuf::from("/srv/media")
            }
        );
    }

    #[test]
    fn descriptor_parses_s3_table() {
        let descriptor: StorageDescriptor = toml::from_str(
            r#"
            backend = "s3"
            bucket = "shop-media"
            prefix = "uploads/"
            region = "us-west-004"
            endpoint = "https://s3.us-west-004.backblazeb2.com"
            "#,
        )
        .unwrap();
        assert_eq!(descriptor.label(), "s3:shop-media/uploads");
        assert!(matches!(
            descriptor,
            StorageDescriptor::S3 { key_id: None, .. }
        ));
    }

    #[test]
    fn descriptor_rejects_unknown_backend() {
        let result: Result<StorageDescriptor, _> = toml::from_str(r#"backend = "ftp""#);
        assert!(result.is_err());
    }

    #[test]
    fn descriptor_roundtrips_through_json() {
        let descriptor = StorageDescriptor::Local {
            root: PathBuf::from("media"),
        };
        let json = serde_json::to_string(&descriptor).unwrap();
        let back: StorageDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(back, descriptor);
    }

    #[test]
    fn connect_local_opens_independent_handles() {
        let tmp = tempfile::TempDir::new().unwrap();
        let descriptor = StorageDescriptor::Local {
            root: tmp.path().to_path_buf(),
        };
        let a = descriptor.connect().unwrap();
        let b = descriptor.connect().unwrap();
        a.save("x/one.txt", b"1").unwrap();
        assert!(b.exists("x/one.txt").unwrap());
    }

    #[cfg(not(feature = "s3"))]
    #[test]
    fn connect_s3_without_feature_is_unsupported() {
        let descriptor = StorageDescriptor::S3 {
            bucket: "b".into(),
            prefix: None,
            region: "r".into(),
            endpoint: None,
            key_id: None,
            key_secret: None,
        };
        assert!(matches!(
            descriptor.connect(),
            Err(StorageError::Unsupported(_))
        ));
    }
}
