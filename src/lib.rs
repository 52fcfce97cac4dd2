//! # Image Variations
//!
//! Derived image variations for stored uploads. Each image field declares a
//! set of named variations (a target box, crop or fit, a resample filter).
//! When a record is saved the source is written to storage and every
//! variation is rendered next to it:
//!
//! ```text
//! image/goods/tea.jpg              source
//! image/goods/tea.thumbnail.jpg    variation "thumbnail"
//! image/goods/tea.large.jpg        variation "large"
//! ```
//!
//! Variation paths are a pure function of the source path and the variation
//! name, so existence in storage is the only state: rendering skips
//! artifacts that already exist unless asked to replace them, and deleting a
//! record deletes exactly the paths that could have been rendered for it.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`variations`] | Variation specs, field selectors, render policies, the registry |
//! | [`naming`] | Pure source path + variation name → artifact path derivation |
//! | [`imaging`] | Decode, prescale, crop/fit and re-encode behind [`imaging::VariationBackend`] |
//! | [`storage`] | Blocking blob storage trait with local and S3 backends |
//! | [`render`] | Renders one source's variations with skip/replace semantics |
//! | [`bulk`] | Parallel re-render of every record of a field |
//! | [`lifecycle`] | Save, replace, delete and upload-validation hooks |
//! | [`records`] | Record sources: which file each record holds |
//! | [`config`] | `variations.toml` loading and validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## No Upscaling
//!
//! A source that already fits inside a variation's box is stored as a
//! re-encoded copy at its own size. Variations never invent pixels.
//!
//! ## Prescale Before Resample
//!
//! Large sources are first reduced by an integer divisor with a cheap filter
//! so the expensive filter runs on a much smaller image. See
//! [`imaging::calculations::prescale_divisor`].
//!
//! ## Per-Worker Storage
//!
//! Bulk workers never share a storage connection. They receive a
//! [`storage::StorageDescriptor`] and each opens its own handle.

pub mod bulk;
pub mod config;
pub mod imaging;
pub mod lifecycle;
pub mod naming;
pub mod output;
pub mod records;
pub mod render;
pub mod storage;
pub mod variations;

#[cfg(test)]
pub(crate) mod test_helpers;
