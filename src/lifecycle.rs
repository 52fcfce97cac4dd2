//! Lifecycle hooks that keep variations in sync with their source.
//!
//! Record-owning code calls these directly at the matching points of its own
//! save/delete logic:
//!
//! | Record event | Hook | Effect |
//! |---|---|---|
//! | upload accepted | [`FieldHooks::validate_upload`] | enforce the minimum size |
//! | value changed on an existing record | [`FieldHooks::on_replace`] | delete the old file's variations |
//! | saved with a file | [`FieldHooks::on_save`] | render variations (policy permitting) |
//! | deleted | [`FieldHooks::on_delete`] | delete variations, then the source |
//!
//! Every hook runs synchronously on the caller's thread.

use crate::imaging::VariationBackend;
use crate::naming::variation_paths;
use crate::render::{RenderError, RenderOutcome, Renderer};
use crate::storage::Storage;
use crate::variations::{FieldSelector, ImageFieldConfig, RecordContext};
use tracing::{debug, info};

/// An image field of some record type: its identity and its variations.
#[derive(Debug, Clone)]
pub struct ImageField {
    pub selector: FieldSelector,
    pub config: ImageFieldConfig,
}

impl ImageField {
    pub fn new(selector: FieldSelector, config: ImageFieldConfig) -> Self {
        Self { selector, config }
    }

    /// Bind the field to the storage and backend its hooks act on.
    pub fn hooks<'a>(
        &'a self,
        storage: &'a dyn Storage,
        backend: &'a dyn VariationBackend,
    ) -> FieldHooks<'a> {
        FieldHooks {
            field: self,
            renderer: Renderer::new(storage, backend),
        }
    }

    /// `(variation name, path)` of every variation of a stored value.
    pub fn variation_paths(&self, path: &str) -> Vec<(String, String)> {
        variation_paths(path, &self.config.variations)
    }
}

/// Hooks of one field, bound to a storage and a backend.
#[derive(Clone, Copy)]
pub struct FieldHooks<'a> {
    field: &'a ImageField,
    renderer: Renderer<'a>,
}

impl FieldHooks<'_> {
    /// After a record is saved with `path`: render every variation if the
    /// field's policy says so. Returns `None` when the policy declined.
    ///
    /// Existing artifacts are kept (`replace = false`).
    pub fn on_save(
        &self,
        pk: Option<&str>,
        path: &str,
    ) -> Result<Option<Vec<RenderOutcome>>, RenderError> {
        let config = &self.field.config;
        let ctx = RecordContext {
            selector: &self.field.selector,
            pk,
            file_name: path,
            variations: &config.variations,
        };
        if !config.render_on_save.should_render(&ctx) {
            debug!(field = %self.field.selector, path, "render on save declined");
            return Ok(None);
        }
        self.renderer
            .render_all(path, &config.variations, false)
            .map(Some)
    }

    /// Before a record is deleted: remove every variation of `path`, then
    /// `path` itself. Returns the deleted paths, source last.
    pub fn on_delete(&self, path: &str) -> Result<Vec<String>, RenderError> {
        let mut deleted = self
            .renderer
            .delete_variations(path, &self.field.config.variations)?;
        self.renderer.storage().delete(path)?;
        info!(field = %self.field.selector, path, "deleted source and variations");
        deleted.push(path.to_string());
        Ok(deleted)
    }

    /// Before an existing record is updated: when the stored value changes
    /// from `previous` to something else, delete `previous`'s variations.
    ///
    /// The previous source file itself is left to the record's own
    /// replacement logic.
    pub fn on_replace(
        &self,
        previous: Option<&str>,
        new: Option<&str>,
    ) -> Result<Vec<String>, RenderError> {
        let previous = match previous.filter(|p| !p.is_empty()) {
            Some(p) if Some(p) != new => p,
            _ => return Ok(Vec::new()),
        };
        info!(
            field = %self.field.selector,
            previous,
            "source replaced, deleting stale variations"
        );
        self.renderer
            .delete_variations(previous, &self.field.config.variations)
    }

    /// Reject an upload smaller than the field's minimum size, when the field
    /// forces one. The minimum is the largest bounded width and height
    /// across the field's variations.
    pub fn validate_upload(&self, path: &str, bytes: &[u8]) -> Result<(), RenderError> {
        let Some((min_width, min_height)) = self.field.config.min_size() else {
            return Ok(());
        };
        let dims = self
            .renderer
            .backend()
            .identify(bytes)
            .map_err(|e| RenderError::SourceUnreadable {
                path: path.to_string(),
                reason: e.to_string(),
            })?;
        if dims.width < min_width || dims.height < min_height {
            return Err(RenderError::BelowMinimumSize {
                path: path.to_string(),
                width: dims.width,
                height: dims.height,
                min_width,
                min_height,
            });
        }
        Ok(())
    }

    pub fn variation_paths(&self, path: &str) -> Vec<(String, String)> {
        self.field.variation_paths(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::RustBackend;
    use crate::imaging::backend::tests::MockBackend;
    use crate::render::RenderStatus;
    use crate::storage::MemoryStorage;
    use crate::test_helpers::{jpeg_bytes, selector, thumbnail_field};
    use crate::variations::{FieldVariations, RenderPolicy, VariationParams};

    fn field() -> ImageField {
        ImageField::new(selector(), thumbnail_field())
    }

    #[test]
    fn save_renders_every_variation() {
        let storage = MemoryStorage::new();
        storage.insert("image/a.jpg", b"source".to_vec());
        let backend = MockBackend::new();
        let field = field();

        let outcomes = field
            .hooks(&storage, &backend)
            .on_save(Some("1"), "image/a.jpg")
            .unwrap()
            .unwrap();
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| o.status == RenderStatus::Rendered));
        assert_eq!(
            storage.keys(),
            vec!["image/a.jpg", "image/a.large.jpg", "image/a.thumbnail.jpg"]
        );
    }

    #[test]
    fn save_with_policy_never_renders_nothing() {
        let storage = MemoryStorage::new();
        storage.insert("image/a.jpg", b"source".to_vec());
        let backend = MockBackend::new();
        let field = ImageField::new(
            selector(),
            thumbnail_field().with_policy(RenderPolicy::Never),
        );

        let result = field
            .hooks(&storage, &backend)
            .on_save(Some("1"), "image/a.jpg")
            .unwrap();
        assert!(result.is_none());
        assert_eq!(storage.keys(), vec!["image/a.jpg"]);
    }

    #[test]
    fn save_predicate_receives_file_name() {
        let storage = MemoryStorage::new();
        storage.insert("image/a.png", b"source".to_vec());
        storage.insert("image/b.jpg", b"source".to_vec());
        let backend = MockBackend::new();
        let field = ImageField::new(
            selector(),
            thumbnail_field()
                .with_policy(RenderPolicy::predicate(|ctx| ctx.file_name.ends_with(".jpg"))),
        );
        let hooks = field.hooks(&storage, &backend);

        assert!(hooks.on_save(None, "image/a.png").unwrap().is_none());
        assert!(hooks.on_save(None, "image/b.jpg").unwrap().is_some());
    }

    #[test]
    fn save_twice_keeps_existing_artifacts() {
        let storage = MemoryStorage::new();
        storage.insert("image/a.jpg", b"source".to_vec());
        let backend = MockBackend::new();
        let field = field();
        let hooks = field.hooks(&storage, &backend);

        hooks.on_save(Some("1"), "image/a.jpg").unwrap();
        let again = hooks.on_save(Some("1"), "image/a.jpg").unwrap().unwrap();
        assert!(again.iter().all(|o| o.status == RenderStatus::Existing));
        assert_eq!(backend.render_count(), 2);
    }

    #[test]
    fn save_with_missing_source_fails() {
        let storage = MemoryStorage::new();
        let backend = MockBackend::new();
        let field = field();
        let err = field
            .hooks(&storage, &backend)
            .on_save(Some("1"), "image/gone.jpg")
            .unwrap_err();
        assert!(matches!(err, RenderError::SourceNotFound(_)));
    }

    #[test]
    fn delete_removes_variations_then_source() {
        let storage = MemoryStorage::new();
        storage.insert("image/a.jpg", b"source".to_vec());
        storage.insert("image/b.jpg", b"other".to_vec());
        let backend = MockBackend::new();
        let field = field();
        let hooks = field.hooks(&storage, &backend);
        hooks.on_save(Some("1"), "image/a.jpg").unwrap();

        let deleted = hooks.on_delete("image/a.jpg").unwrap();
        assert_eq!(
            deleted,
            ["image/a.thumbnail.jpg", "image/a.large.jpg", "image/a.jpg"]
        );
        assert_eq!(storage.keys(), vec!["image/b.jpg"]);
    }

    #[test]
    fn replace_deletes_old_variations_only() {
        let storage = MemoryStorage::new();
        storage.insert("image/old.jpg", b"old".to_vec());
        storage.insert("image/new.jpg", b"new".to_vec());
        let backend = MockBackend::new();
        let field = field();
        let hooks = field.hooks(&storage, &backend);
        hooks.on_save(Some("1"), "image/old.jpg").unwrap();

        let deleted = hooks
            .on_replace(Some("image/old.jpg"), Some("image/new.jpg"))
            .unwrap();
        assert_eq!(deleted.len(), 2);
        hooks.on_save(Some("1"), "image/new.jpg").unwrap();

        assert_eq!(
            storage.keys(),
            vec![
                "image/new.jpg",
                "image/new.large.jpg",
                "image/new.thumbnail.jpg",
                "image/old.jpg",
            ]
        );
    }

    #[test]
    fn replace_with_same_or_empty_value_does_nothing() {
        let storage = MemoryStorage::new();
        storage.insert("image/a.thumbnail.jpg", b"t".to_vec());
        let backend = MockBackend::new();
        let field = field();
        let hooks = field.hooks(&storage, &backend);

        assert!(hooks.on_replace(Some("image/a.jpg"), Some("image/a.jpg")).unwrap().is_empty());
        assert!(hooks.on_replace(None, Some("image/a.jpg")).unwrap().is_empty());
        assert!(hooks.on_replace(Some(""), Some("image/a.jpg")).unwrap().is_empty());
        assert!(storage.deleted().is_empty());
    }

    #[test]
    fn replace_with_cleared_value_deletes() {
        let storage = MemoryStorage::new();
        storage.insert("image/a.thumbnail.jpg", b"t".to_vec());
        let backend = MockBackend::new();
        let field = field();
        let deleted = field
            .hooks(&storage, &backend)
            .on_replace(Some("image/a.jpg"), None)
            .unwrap();
        assert_eq!(deleted.len(), 2);
        assert!(storage.keys().is_empty());
    }

    #[test]
    fn validate_upload_enforces_min_size_when_forced() {
        let storage = MemoryStorage::new();
        let backend = RustBackend::new();
        let mut variations = FieldVariations::new();
        variations.add("thumb", VariationParams::new(100, 75)).unwrap();
        variations
            .add(
                "tall",
                VariationParams {
                    width: None,
                    height: Some(200),
                    ..VariationParams::default()
                },
            )
            .unwrap();
        let forced = ImageField::new(
            selector(),
            ImageFieldConfig::new(variations.clone()).with_force_min_size(true),
        );
        let hooks = forced.hooks(&storage, &backend);

        hooks.validate_upload("ok.jpg", &jpeg_bytes(100, 200)).unwrap();
        let err = hooks
            .validate_upload("small.jpg", &jpeg_bytes(150, 150))
            .unwrap_err();
        assert!(matches!(
            err,
            RenderError::BelowMinimumSize {
                width: 150,
                height: 150,
                min_width: 100,
                min_height: 200,
                ..
            }
        ));

        let relaxed = ImageField::new(selector(), ImageFieldConfig::new(variations));
        relaxed
            .hooks(&storage, &backend)
            .validate_upload("small.jpg", &jpeg_bytes(10, 10))
            .unwrap();
    }

    #[test]
    fn validate_upload_rejects_garbage_when_forced() {
        let storage = MemoryStorage::new();
        let backend = RustBackend::new();
        let field = ImageField::new(selector(), thumbnail_field().with_force_min_size(true));
        let err = field
            .hooks(&storage, &backend)
            .validate_upload("x.jpg", b"nope")
            .unwrap_err();
        assert!(matches!(err, RenderError::SourceUnreadable { .. }));
    }

    #[test]
    fn variation_paths_expose_every_variation() {
        let field = field();
        assert_eq!(
            field.variation_paths("image/a.jpg"),
            vec![
                ("thumbnail".to_string(), "image/a.thumbnail.jpg".to_string()),
                ("large".to_string(), "image/a.large.jpg".to_string()),
            ]
        );
    }
}
