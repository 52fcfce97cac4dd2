//! Shared test utilities for the image-variations test suite.
//!
//! Provides synthetic image builders, a ready-made field configuration and
//! storage seeding helpers that work with the render pipeline's types.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let storage = MemoryStorage::new();
//! seed_jpegs(&storage, &["image/a.jpg", "image/b.jpg"], 400, 300);
//!
//! let field = thumbnail_field();
//! assert_eq!(field.variations.names().collect::<Vec<_>>(), ["thumbnail", "large"]);
//! ```

use image::{ExtendedColorType, ImageEncoder, RgbImage, RgbaImage};

use crate::storage::MemoryStorage;
use crate::variations::{FieldSelector, FieldVariations, ImageFieldConfig, VariationParams};

// =========================================================================
// Synthetic images
// =========================================================================

/// Encode a gradient JPEG of the given size.
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let mut buf = Vec::new();
    image::codecs::jpeg::JpegEncoder::new(&mut buf)
        .write_image(img.as_raw(), width, height, ExtendedColorType::Rgb8)
        .unwrap();
    buf
}

/// Encode a gradient RGB PNG of the given size.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(y % 256) as u8, 64, (x % 256) as u8])
    });
    let mut buf = Vec::new();
    image::codecs::png::PngEncoder::new(&mut buf)
        .write_image(img.as_raw(), width, height, ExtendedColorType::Rgb8)
        .unwrap();
    buf
}

/// Encode a half-transparent RGBA PNG of the given size.
pub fn rgba_png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_fn(width, height, |x, _| image::Rgba([200, 10, 10, (x % 256) as u8]));
    let mut buf = Vec::new();
    image::codecs::png::PngEncoder::new(&mut buf)
        .write_image(img.as_raw(), width, height, ExtendedColorType::Rgba8)
        .unwrap();
    buf
}

// =========================================================================
// Fields and storage
// =========================================================================

pub fn selector() -> FieldSelector {
    "goods.goodsinfo.gpic".parse().unwrap()
}

/// A field with a cropped `thumbnail` (100x75) and a fitted `large` (800x600).
pub fn thumbnail_field() -> ImageFieldConfig {
    let mut variations = FieldVariations::new();
    variations
        .add("thumbnail", VariationParams::new(100, 75).crop(true))
        .unwrap();
    variations
        .add("large", VariationParams::new(800, 600))
        .unwrap();
    ImageFieldConfig::new(variations)
}

/// Store a synthetic JPEG at every path.
pub fn seed_jpegs(storage: &MemoryStorage, paths: &[&str], width: u32, height: u32) {
    let bytes = jpeg_bytes(width, height);
    for path in paths {
        storage.insert(path, bytes.clone());
    }
}
