//! Configuration module.
//!
//! Handles loading and validating the `variations.toml` file that declares
//! where images are stored, how many workers bulk renders use, and the
//! variations of every image field.
//!
//! ## Configuration Options
//!
//! ```toml
//! [storage]
//! backend = "local"          # "local" or "s3"
//! root = "media"             # local: directory holding uploaded files
//!
//! [processing]
//! max_processes = 4          # Max parallel workers (omit for auto = CPU cores)
//!
//! [fields."goods.goodsinfo.gpic"]
//! render_on_save = true      # Render variations when a record is saved
//! force_min_size = false     # Reject uploads smaller than the largest variation
//! variations.thumbnail = { width = 100, height = 75, crop = true }
//! variations.large = [800, 600]   # Shorthand: [width, height] or [width, height, crop]
//! ```
//!
//! Variations render in the order they are declared. Unknown keys are
//! rejected to catch typos early.

use crate::storage::StorageDescriptor;
use crate::variations::{
    FieldSelector, FieldVariations, ImageFieldConfig, RenderPolicy, VariationError,
    VariationParams, VariationRegistry,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("{0}")]
    Variation(#[from] VariationError),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration loaded from `variations.toml`.
///
/// Every section is optional. An empty file stores under `media/` and
/// declares no fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Where source images and their variations live.
    pub storage: StorageDescriptor,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
    /// Image fields keyed by `app.model.field`.
    pub fields: BTreeMap<String, FieldConfig>,
}

/// One image field as written in the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldConfig {
    /// Must be a boolean. Kept raw so a wrong type is reported as an
    /// invalid variation spec rather than a parse error.
    #[serde(default = "default_render_on_save")]
    pub render_on_save: toml::Value,
    #[serde(default)]
    pub force_min_size: bool,
    /// Variation name to table or array, in declaration order.
    #[serde(default)]
    pub variations: toml::Table,
}

fn default_render_on_save() -> toml::Value {
    toml::Value::Boolean(true)
}

impl FieldConfig {
    /// Validate and convert into the registry form.
    pub fn to_field_config(&self) -> Result<ImageFieldConfig, VariationError> {
        let mut variations = FieldVariations::new();
        for (name, value) in &self.variations {
            variations.add(name.as_str(), VariationParams::from_toml(name, value)?)?;
        }
        Ok(ImageFieldConfig::new(variations)
            .with_policy(RenderPolicy::from_toml(&self.render_on_save)?)
            .with_force_min_size(self.force_min_size))
    }
}

impl Config {
    /// Validate config values and every declared field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        for (key, field) in &self.fields {
            if field.variations.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "fields.\"{key}\" declares no variations"
                )));
            }
        }
        self.registry().map(|_| ())
    }

    /// Build the variation registry from the `[fields]` section.
    pub fn registry(&self) -> Result<VariationRegistry, ConfigError> {
        let mut registry = VariationRegistry::new();
        for (key, field) in &self.fields {
            let selector: FieldSelector = key.parse()?;
            let config = field.to_field_config().map_err(|e| match e {
                VariationError::InvalidVariationSpec(msg) => {
                    VariationError::InvalidVariationSpec(format!("{key}: {msg}"))
                }
                other => other,
            })?;
            registry.register(selector, config);
        }
        Ok(registry)
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel render workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

/// Load and validate the config file at `path`.
///
/// A missing file yields the default config (local `media/`, no fields).
/// Returns `Err` if the file exists but is invalid.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        debug!(path = %path.display(), "no config file, using defaults");
        return Ok(Config::default());
    }
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate config file content.
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
}

/// Returns a fully-commented stock `variations.toml` with all keys and
/// explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# image-variations configuration
# ==============================
# Declares where images are stored and which variations each image field
# renders. Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Storage
# ---------------------------------------------------------------------------
[storage]
# "local" stores files below `root`. "s3" talks to an S3-compatible object
# store (requires a build with the `s3` feature):
#
#   backend = "s3"
#   bucket = "shop-media"
#   prefix = "uploads"                # optional key prefix
#   region = "us-east-1"
#   endpoint = "http://localhost:9000" # optional, for non-AWS services
#   key_id = "..."                    # optional, else AWS_ACCESS_KEY_ID
#   key_secret = "..."                # optional, else AWS_SECRET_ACCESS_KEY
backend = "local"
root = "media"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel render workers for bulk renders.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4

# ---------------------------------------------------------------------------
# Image fields
# ---------------------------------------------------------------------------
# One table per field, keyed by "app.model.field". Variations are written
# next to the source as <name>.<variation>.<ext> and render in the order
# they are declared here.
#
# A variation is a table:
#   width, height   box size in pixels; omit one for an unbounded axis
#   crop            fill the box exactly, cropping the overflow (needs both
#                   width and height); otherwise fit inside the box
#   resample        nearest, bilinear, bicubic, gaussian or lanczos3
#                   (default lanczos3, alias antialias)
# or the shorthand [width, height] / [width, height, crop].
#
# Sources smaller than the box are stored as is, never upscaled.
[fields."goods.goodsinfo.gpic"]
# Render every variation when a record is saved with a new file.
render_on_save = true
# Reject uploads smaller than the largest variation box.
force_min_size = false

[fields."goods.goodsinfo.gpic".variations]
thumbnail = { width = 100, height = 75, crop = true }
large = [800, 600]
"##
}
