//! S3-compatible object store backend (AWS S3, Backblaze B2, MinIO, ...).
//!
//! The SDK is async while the render pipeline is blocking and runs on rayon
//! workers, so each [`S3Storage`] owns a private current-thread tokio runtime
//! and blocks on it. Every worker connects its own instance from the
//! descriptor, so runtimes are never shared between threads.

use super::path::validate;
use super::{BoxRead, Storage, StorageError};
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region, retry::RetryConfig};
use aws_sdk_s3::primitives::ByteStream;
use std::io::Cursor;
use tokio::runtime::Runtime;

pub struct S3Storage {
    name: String,
    client: Client,
    bucket: String,
    prefix: Option<String>,
    runtime: Runtime,
}

impl S3Storage {
    /// Build a client for `bucket`, optionally under a key prefix.
    ///
    /// `endpoint` is required for non-AWS services. Path-style addressing is
    /// always used for compatibility with them.
    pub fn connect(
        name: impl Into<String>,
        bucket: impl Into<String>,
        prefix: Option<String>,
        region: impl Into<String>,
        endpoint: Option<String>,
        key_id: impl Into<String>,
        key_secret: impl Into<String>,
    ) -> Result<Self, StorageError> {
        let prefix = prefix
            .map(|p| p.trim_matches('/').to_string())
            .filter(|p| !p.is_empty());
        let credentials = Credentials::new(key_id, key_secret, None, None, "image-variations");
        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new(region.into()))
            .retry_config(RetryConfig::standard().with_max_attempts(4))
            .force_path_style(true);
        if let Some(url) = endpoint {
            builder = builder.endpoint_url(url);
        }
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self {
            name: name.into(),
            client: Client::from_conf(builder.build()),
            bucket: bucket.into(),
            prefix,
            runtime,
        })
    }

    fn full_key(&self, path: &str) -> Result<String, StorageError> {
        let key = validate(path)?;
        Ok(match &self.prefix {
            Some(prefix) => format!("{}/{}", prefix, key),
            None => key,
        })
    }

    fn relative_key(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => key
                .strip_prefix(prefix.as_str())
                .and_then(|k| k.strip_prefix('/'))
                .unwrap_or(key)
                .to_string(),
            None => key.to_string(),
        }
    }
}

fn backend_error(op: &str, key: &str, e: impl std::fmt::Display) -> StorageError {
    StorageError::Backend(format!("{op} {key}: {e}"))
}

impl Storage for S3Storage {
    fn name(&self) -> &str {
        &self.name
    }

    fn exists(&self, path: &str) -> Result<bool, StorageError> {
        let key = self.full_key(path)?;
        let result = self.runtime.block_on(
            self.client
                .head_object()
                .bucket(&self.bucket)
                .key(&key)
                .send(),
        );
        match result {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().is_some_and(|s| s.is_not_found()) => Ok(false),
            Err(e) => Err(backend_error("HEAD", &key, e)),
        }
    }

    fn open(&self, path: &str) -> Result<BoxRead, StorageError> {
        let key = self.full_key(path)?;
        let data = self.runtime.block_on(async {
            let output = match self
                .client
                .get_object()
                .bucket(&self.bucket)
                .key(&key)
                .send()
                .await
            {
                Ok(output) => output,
                Err(e) if e.as_service_error().is_some_and(|s| s.is_no_such_key()) => {
                    return Err(StorageError::NotFound(self.relative_key(&key)));
                }
                Err(e) => return Err(backend_error("GET", &key, e)),
            };
            let body = output
                .body
                .collect()
                .await
                .map_err(|e| backend_error("GET", &key, e))?;
            Ok(body.into_bytes().to_vec())
        })?;
        Ok(Box::new(Cursor::new(data)))
    }

    fn save(&self, path: &str, data: &[u8]) -> Result<String, StorageError> {
        let key = self.full_key(path)?;
        self.runtime
            .block_on(
                self.client
                    .put_object()
                    .bucket(&self.bucket)
                    .key(&key)
                    .body(ByteStream::from(data.to_vec()))
                    .send(),
            )
            .map_err(|e| backend_error("PUT", &key, e))?;
        Ok(self.relative_key(&key))
    }

    fn delete(&self, path: &str) -> Result<(), StorageError> {
        let key = self.full_key(path)?;
        self.runtime
            .block_on(
                self.client
                    .delete_object()
                    .bucket(&self.bucket)
                    .key(&key)
                    .send(),
            )
            .map_err(|e| backend_error("DELETE", &key, e))?;
        Ok(())
    }
}
