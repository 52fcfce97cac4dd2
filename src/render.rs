//! Render orchestration for a single source image.
//!
//! A [`Renderer`] pairs a [`Storage`] with a [`VariationBackend`] and turns
//! `(source, variation)` pairs into stored artifacts:
//!
//! ```text
//! derive path ── exists? ──yes── replace? ──no──▶ Existing (backend untouched)
//!                   │                │
//!                   no              yes ─▶ delete ─┐
//!                   │                              │
//!                   └──────▶ read source ─▶ render ─▶ save ─▶ Rendered / Replaced
//! ```
//!
//! Idempotent naming plus skip-if-exists is what makes concurrent and
//! repeated renders safe: there are no locks around artifact writes.

use crate::imaging::{BackendError, VariationBackend};
use crate::naming::derive_variation_name;
use crate::storage::{Storage, StorageError};
use crate::variations::{FieldVariations, VariationSpec};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Source file was not found: {0}")]
    SourceNotFound(String),
    #[error("Source file {path} could not be decoded: {reason}")]
    SourceUnreadable { path: String, reason: String },
    #[error("Failed to write {path}: {source}")]
    StorageWriteFailure { path: String, source: StorageError },
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Encode failed: {0}")]
    Encode(String),
    #[error(
        "Image {path} is {width}x{height}, smaller than the required minimum {min_width}x{min_height}"
    )]
    BelowMinimumSize {
        path: String,
        width: u32,
        height: u32,
        min_width: u32,
        min_height: u32,
    },
}

/// What a render did to one artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStatus {
    /// Newly written.
    Rendered,
    /// Deleted and written again (`replace`).
    Replaced,
    /// Already present; nothing was done.
    Existing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOutcome {
    pub variation: String,
    pub path: String,
    pub status: RenderStatus,
}

/// Source bytes, read on first use and reused for every later variation.
struct SourceCache<'s> {
    path: &'s str,
    bytes: Option<Vec<u8>>,
}

impl<'s> SourceCache<'s> {
    fn new(path: &'s str) -> Self {
        Self { path, bytes: None }
    }

    fn get(&mut self, storage: &dyn Storage) -> Result<&[u8], RenderError> {
        if self.bytes.is_none() {
            let bytes = storage.read(self.path).map_err(|e| match e {
                StorageError::NotFound(_) => RenderError::SourceNotFound(self.path.to_string()),
                other => RenderError::Storage(other),
            })?;
            self.bytes = Some(bytes);
        }
        Ok(self.bytes.as_deref().unwrap_or_default())
    }
}

/// Renders and removes variations of stored images.
#[derive(Clone, Copy)]
pub struct Renderer<'a> {
    storage: &'a dyn Storage,
    backend: &'a dyn VariationBackend,
}

impl<'a> Renderer<'a> {
    pub fn new(storage: &'a dyn Storage, backend: &'a dyn VariationBackend) -> Self {
        Self { storage, backend }
    }

    pub fn storage(&self) -> &'a dyn Storage {
        self.storage
    }

    pub fn backend(&self) -> &'a dyn VariationBackend {
        self.backend
    }

    /// Render one variation of `source`.
    ///
    /// An existing artifact is left alone unless `replace` is set, in which
    /// case it is deleted and rendered again.
    pub fn render_one(
        &self,
        source: &str,
        spec: &VariationSpec,
        replace: bool,
    ) -> Result<RenderOutcome, RenderError> {
        self.render_cached(&mut SourceCache::new(source), spec, replace)
    }

    /// Render every variation of `source` in declaration order. The source
    /// is read at most once, and not at all if every artifact already exists
    /// and `replace` is off.
    pub fn render_all(
        &self,
        source: &str,
        variations: &FieldVariations,
        replace: bool,
    ) -> Result<Vec<RenderOutcome>, RenderError> {
        let mut cache = SourceCache::new(source);
        variations
            .iter()
            .map(|spec| self.render_cached(&mut cache, spec, replace))
            .collect()
    }

    fn render_cached(
        &self,
        cache: &mut SourceCache<'_>,
        spec: &VariationSpec,
        replace: bool,
    ) -> Result<RenderOutcome, RenderError> {
        let source = cache.path;
        let path = derive_variation_name(source, spec.name());
        let outcome = |status| RenderOutcome {
            variation: spec.name().to_string(),
            path: path.clone(),
            status,
        };

        let status = if self.storage.exists(&path)? {
            if !replace {
                info!("\"{path}\" already exists");
                return Ok(outcome(RenderStatus::Existing));
            }
            info!("replacing \"{path}\"");
            self.storage.delete(&path)?;
            RenderStatus::Replaced
        } else {
            RenderStatus::Rendered
        };

        let bytes = cache.get(self.storage)?;
        let rendered = self.backend.render(bytes, spec).map_err(|e| match e {
            BackendError::Unreadable(reason) => RenderError::SourceUnreadable {
                path: source.to_string(),
                reason,
            },
            BackendError::Encode(reason) => RenderError::Encode(format!("{path}: {reason}")),
        })?;

        self.storage
            .save(&path, &rendered.bytes)
            .map_err(|source| RenderError::StorageWriteFailure {
                path: path.clone(),
                source,
            })?;
        debug!(
            storage = self.storage.name(),
            path = %path,
            width = rendered.width,
            height = rendered.height,
            "rendered variation"
        );
        Ok(outcome(status))
    }

    /// Delete every variation artifact of `source`. Returns the paths that
    /// were targeted; absent artifacts are not an error.
    pub fn delete_variations(
        &self,
        source: &str,
        variations: &FieldVariations,
    ) -> Result<Vec<String>, RenderError> {
        let mut deleted = Vec::with_capacity(variations.len());
        for name in variations.names() {
            let path = derive_variation_name(source, name);
            self.storage.delete(&path)?;
            debug!(path = %path, "deleted variation");
            deleted.push(path);
        }
        Ok(deleted)
    }
}
