//! Variation spec registry.
//!
//! Each image field declares a set of named variations (target box, crop
//! flag and resample filter) plus a policy deciding whether saving a record
//! renders them immediately. Everything here is validated when it is
//! registered, so a bad variation never reaches the render pipeline.
//!
//! ```
//! use image_variations::variations::{FieldVariations, Resample, VariationParams};
//!
//! let mut variations = FieldVariations::new();
//! variations.add("thumbnail", VariationParams::new(100, 75)).unwrap();
//! variations
//!     .add("square", VariationParams::new(64, 64).crop(true).resample(Resample::CatmullRom))
//!     .unwrap();
//! assert_eq!(variations.len(), 2);
//! assert!(variations.add("thumbnail", VariationParams::new(1, 1)).is_err());
//! ```

use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VariationError {
    #[error("Invalid variation spec: {0}")]
    InvalidVariationSpec(String),
    #[error("Error parsing field path '{0}'. Use format <app.model.field>.")]
    InvalidSelector(String),
}

/// Interpolation used when scaling pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resample {
    Nearest,
    #[serde(alias = "bilinear")]
    Triangle,
    #[serde(alias = "bicubic")]
    CatmullRom,
    Gaussian,
    /// High-quality antialiasing filter.
    #[default]
    #[serde(alias = "antialias")]
    Lanczos3,
}

impl Resample {
    pub fn filter(self) -> FilterType {
        match self {
            Self::Nearest => FilterType::Nearest,
            Self::Triangle => FilterType::Triangle,
            Self::CatmullRom => FilterType::CatmullRom,
            Self::Gaussian => FilterType::Gaussian,
            Self::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// Target box for a variation. `None` on an axis means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Unvalidated variation parameters, before a name is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VariationParams {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub crop: bool,
    pub resample: Resample,
}

impl VariationParams {
    /// A bounded box, no crop, Lanczos3.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
            ..Self::default()
        }
    }

    pub fn crop(mut self, crop: bool) -> Self {
        self.crop = crop;
        self
    }

    pub fn resample(mut self, resample: Resample) -> Self {
        self.resample = resample;
        self
    }

    /// Parse a config value: a table `{width, height, crop, resample}` or an
    /// array `[width, height]` / `[width, height, crop]`.
    pub fn from_toml(name: &str, value: &toml::Value) -> Result<Self, VariationError> {
        match value {
            toml::Value::Table(_) => {
                let table: VariationTable = value.clone().try_into().map_err(|e| {
                    VariationError::InvalidVariationSpec(format!("variation '{name}': {e}"))
                })?;
                Ok(Self {
                    width: table.width,
                    height: table.height,
                    crop: table.crop,
                    resample: table.resample,
                })
            }
            toml::Value::Array(items) => {
                let invalid = || {
                    VariationError::InvalidVariationSpec(format!(
                        "variation '{name}': expected [width, height] or [width, height, crop]"
                    ))
                };
                if !(2..=3).contains(&items.len()) {
                    return Err(invalid());
                }
                let dimension = |v: &toml::Value| {
                    v.as_integer()
                        .and_then(|n| u32::try_from(n).ok())
                        .ok_or_else(invalid)
                };
                let width = dimension(&items[0])?;
                let height = dimension(&items[1])?;
                let crop = match items.get(2) {
                    Some(v) => v.as_bool().ok_or_else(invalid)?,
                    None => false,
                };
                Ok(Self::new(width, height).crop(crop))
            }
            other => Err(VariationError::InvalidVariationSpec(format!(
                "variation '{name}' expects a table or an array, but got {}",
                other.type_str()
            ))),
        }
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct VariationTable {
    width: Option<u32>,
    height: Option<u32>,
    #[serde(default)]
    crop: bool,
    #[serde(default)]
    resample: Resample,
}

/// A registered, validated variation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariationSpec {
    name: String,
    width: Option<u32>,
    height: Option<u32>,
    crop: bool,
    resample: Resample,
}

impl VariationSpec {
    /// Validate `params` and attach `name`.
    ///
    /// Names become part of derived file names (`a.<name>.jpg`), so they
    /// may not be empty or contain `.`, `/` or `\`.
    pub fn new(name: impl Into<String>, params: VariationParams) -> Result<Self, VariationError> {
        let name = name.into();
        let invalid = |msg: &str| {
            Err(VariationError::InvalidVariationSpec(format!(
                "variation '{name}': {msg}"
            )))
        };
        if name.is_empty() {
            return invalid("name must not be empty");
        }
        if name.contains(['.', '/', '\\']) {
            return invalid("name must not contain '.', '/' or '\\'");
        }
        if params.width == Some(0) || params.height == Some(0) {
            return invalid("width and height must be non-zero");
        }
        if params.crop && (params.width.is_none() || params.height.is_none()) {
            return invalid("crop requires both width and height");
        }
        Ok(Self {
            name,
            width: params.width,
            height: params.height,
            crop: params.crop,
            resample: params.resample,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> Option<u32> {
        self.width
    }

    pub fn height(&self) -> Option<u32> {
        self.height
    }

    pub fn crop(&self) -> bool {
        self.crop
    }

    pub fn resample(&self) -> Resample {
        self.resample
    }

    pub fn bounds(&self) -> Bounds {
        Bounds {
            width: self.width,
            height: self.height,
        }
    }
}

/// The variations of one image field, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldVariations {
    specs: Vec<VariationSpec>,
}

impl FieldVariations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a variation. Fails on invalid params or a duplicate name.
    pub fn add(
        &mut self,
        name: impl Into<String>,
        params: VariationParams,
    ) -> Result<&VariationSpec, VariationError> {
        let spec = VariationSpec::new(name, params)?;
        if self.get(spec.name()).is_some() {
            return Err(VariationError::InvalidVariationSpec(format!(
                "variation '{}' is registered twice",
                spec.name()
            )));
        }
        self.specs.push(spec);
        Ok(&self.specs[self.specs.len() - 1])
    }

    pub fn get(&self, name: &str) -> Option<&VariationSpec> {
        self.specs.iter().find(|s| s.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &VariationSpec> {
        self.specs.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.specs.iter().map(|s| s.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Largest bounded width and height across all variations, used as the
    /// minimum accepted upload size when a field forces it.
    pub fn min_size(&self) -> Option<(u32, u32)> {
        let width = self.specs.iter().filter_map(|s| s.width).max();
        let height = self.specs.iter().filter_map(|s| s.height).max();
        match (width, height) {
            (None, None) => None,
            (w, h) => Some((w.unwrap_or(0), h.unwrap_or(0))),
        }
    }
}

/// `app.model.field` identity of an image field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldSelector {
    pub app: String,
    pub model: String,
    pub field: String,
}

impl FromStr for FieldSelector {
    type Err = VariationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('.').collect();
        match parts.as_slice() {
            [app, model, field] if !app.is_empty() && !model.is_empty() && !field.is_empty() => {
                Ok(Self {
                    app: app.to_string(),
                    model: model.to_string(),
                    field: field.to_string(),
                })
            }
            _ => Err(VariationError::InvalidSelector(s.to_string())),
        }
    }
}

impl fmt::Display for FieldSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.app, self.model, self.field)
    }
}

/// What a render-policy predicate gets to look at.
#[derive(Debug, Clone, Copy)]
pub struct RecordContext<'a> {
    pub selector: &'a FieldSelector,
    pub pk: Option<&'a str>,
    pub file_name: &'a str,
    pub variations: &'a FieldVariations,
}

type Predicate = dyn Fn(&RecordContext<'_>) -> bool + Send + Sync;

/// Whether saving a record renders its variations right away.
#[derive(Clone, Default)]
pub enum RenderPolicy {
    #[default]
    Always,
    Never,
    Predicate(Arc<Predicate>),
}

impl RenderPolicy {
    pub fn predicate(f: impl Fn(&RecordContext<'_>) -> bool + Send + Sync + 'static) -> Self {
        Self::Predicate(Arc::new(f))
    }

    pub fn from_bool(render: bool) -> Self {
        if render { Self::Always } else { Self::Never }
    }

    /// Parse the `render_on_save` config value, which must be a boolean.
    pub fn from_toml(value: &toml::Value) -> Result<Self, VariationError> {
        value.as_bool().map(Self::from_bool).ok_or_else(|| {
            VariationError::InvalidVariationSpec(format!(
                "render_on_save expects a boolean, but got {}",
                value.type_str()
            ))
        })
    }

    pub fn should_render(&self, ctx: &RecordContext<'_>) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Predicate(f) => f(ctx),
        }
    }
}

impl fmt::Debug for RenderPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Always => f.write_str("Always"),
            Self::Never => f.write_str("Never"),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// Everything registered for one image field.
#[derive(Debug, Clone, Default)]
pub struct ImageFieldConfig {
    pub variations: FieldVariations,
    pub render_on_save: RenderPolicy,
    pub force_min_size: bool,
}

impl ImageFieldConfig {
    pub fn new(variations: FieldVariations) -> Self {
        Self {
            variations,
            ..Self::default()
        }
    }

    pub fn with_policy(mut self, policy: RenderPolicy) -> Self {
        self.render_on_save = policy;
        self
    }

    pub fn with_force_min_size(mut self, force: bool) -> Self {
        self.force_min_size = force;
        self
    }

    /// Minimum upload size, only when the field forces one.
    pub fn min_size(&self) -> Option<(u32, u32)> {
        if self.force_min_size {
            self.variations.min_size()
        } else {
            None
        }
    }
}

/// All image fields known to the application, keyed by selector.
#[derive(Debug, Clone, Default)]
pub struct VariationRegistry {
    fields: BTreeMap<FieldSelector, ImageFieldConfig>,
}

impl VariationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a field. Re-registering a selector replaces it.
    pub fn register(&mut self, selector: FieldSelector, config: ImageFieldConfig) {
        self.fields.insert(selector, config);
    }

    pub fn get(&self, selector: &FieldSelector) -> Option<&ImageFieldConfig> {
        self.fields.get(selector)
    }

    /// Attach a dynamic render policy to an already-registered field.
    /// Returns `false` if the field is unknown.
    pub fn set_policy(&mut self, selector: &FieldSelector, policy: RenderPolicy) -> bool {
        match self.fields.get_mut(selector) {
            Some(config) => {
                config.render_on_save = policy;
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FieldSelector, &ImageFieldConfig)> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
