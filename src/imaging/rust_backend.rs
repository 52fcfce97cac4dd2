//! Pure Rust variation backend built on the `image` crate.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Identify | `image::ImageReader::into_dimensions` (header only) |
//! | Decode (JPEG, PNG, GIF, BMP, TIFF, WebP) | `image::load_from_memory_with_format` |
//! | Pre-shrink | `DynamicImage::resize_exact` with `Triangle` |
//! | Fit | `DynamicImage::resize_exact` to [`fit_within`] dimensions |
//! | Crop | `DynamicImage::resize_to_fill` (centre crop) |
//! | Encode → JPEG | `jpeg_encoder::Encoder` on RGB8 (progressive, optimized Huffman tables) |
//! | Encode → other | `DynamicImage::write_to` in the source format |

use super::backend::{BackendError, Dimensions, RenderedVariation, VariationBackend};
use super::calculations::{fit_within, is_larger, prescale_divisor, prescaled_dimensions};
use super::params::EncodingOptions;
use crate::variations::VariationSpec;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};
use std::io::Cursor;
use tracing::debug;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Guess the format from magic bytes and decode.
fn load_image(source: &[u8]) -> Result<(DynamicImage, ImageFormat), BackendError> {
    let format = image::guess_format(source)
        .map_err(|e| BackendError::Unreadable(format!("unrecognised format: {e}")))?;
    let img = image::load_from_memory_with_format(source, format)
        .map_err(|e| BackendError::Unreadable(format!("failed to decode {format:?}: {e}")))?;
    Ok((img, format))
}

/// Resize `img` for `spec`. Returns the image untouched when it already fits.
fn process_variation(img: DynamicImage, spec: &VariationSpec) -> DynamicImage {
    let bounds = spec.bounds();
    let source = (img.width(), img.height());
    if !is_larger(source, bounds) {
        return img;
    }

    let divisor = prescale_divisor(source, bounds);
    let img = if divisor > 1 {
        let (w, h) = prescaled_dimensions(source, divisor);
        debug!(divisor, width = w, height = h, "pre-shrinking");
        img.resize_exact(w, h, FilterType::Triangle)
    } else {
        img
    };

    let filter = spec.resample().filter();
    match (spec.crop(), bounds.width, bounds.height) {
        (true, Some(bw), Some(bh)) => img.resize_to_fill(bw, bh, filter),
        _ => {
            // Fit against the original dimensions so the pre-shrink's
            // rounding does not skew the aspect ratio.
            let (w, h) = fit_within(source, bounds);
            img.resize_exact(w, h, filter)
        }
    }
}

/// Encode `img` with `options`.
///
/// JPEG is always written from RGB8, dropping any alpha channel, through
/// `jpeg-encoder` so `progressive` and `optimize` take effect in the bytes.
fn encode(img: &DynamicImage, options: &EncodingOptions) -> Result<Vec<u8>, BackendError> {
    let mut buf = Vec::new();
    if options.format == ImageFormat::Jpeg {
        let rgb = img.to_rgb8();
        let dimension = |v: u32| {
            u16::try_from(v)
                .map_err(|_| BackendError::Encode(format!("{v}px exceeds the JPEG size limit")))
        };
        let (width, height) = (dimension(rgb.width())?, dimension(rgb.height())?);
        let quality = options.quality.unwrap_or_default().value();
        let mut encoder = jpeg_encoder::Encoder::new(&mut buf, quality);
        encoder.set_progressive(options.progressive);
        encoder.set_optimized_huffman_tables(options.optimize);
        encoder
            .encode(rgb.as_raw(), width, height, jpeg_encoder::ColorType::Rgb)
            .map_err(|e| BackendError::Encode(format!("JPEG encode failed: {e}")))?;
    } else {
        img.write_to(&mut Cursor::new(&mut buf), options.format)
            .map_err(|e| {
                BackendError::Encode(format!("{:?} encode failed: {e}", options.format))
            })?;
    }
    Ok(buf)
}

impl VariationBackend for RustBackend {
    fn identify(&self, source: &[u8]) -> Result<Dimensions, BackendError> {
        let (width, height) = ImageReader::new(Cursor::new(source))
            .with_guessed_format()
            .map_err(|e| BackendError::Unreadable(e.to_string()))?
            .into_dimensions()
            .map_err(|e| BackendError::Unreadable(format!("failed to read dimensions: {e}")))?;
        Ok(Dimensions { width, height })
    }

    fn render(
        &self,
        source: &[u8],
        spec: &VariationSpec,
    ) -> Result<RenderedVariation, BackendError> {
        let (img, format) = load_image(source)?;
        let resized = is_larger((img.width(), img.height()), spec.bounds());
        let options = if resized {
            EncodingOptions::for_variation(format, spec.bounds())
        } else {
            EncodingOptions::passthrough(format)
        };

        let out = process_variation(img, spec);
        let bytes = encode(&out, &options)?;
        Ok(RenderedVariation {
            bytes,
            width: out.width(),
            height: out.height(),
            options,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::Quality;
    use crate::test_helpers::{jpeg_bytes, png_bytes, rgba_png_bytes};
    use crate::variations::{Resample, VariationParams};

    fn spec(name: &str, params: VariationParams) -> VariationSpec {
        VariationSpec::new(name, params).unwrap()
    }

    fn decode(bytes: &[u8]) -> (DynamicImage, ImageFormat) {
        let format = image::guess_format(bytes).unwrap();
        (image::load_from_memory(bytes).unwrap(), format)
    }

    #[test]
    fn identify_synthetic_jpeg() {
        let backend = RustBackend::new();
        let dims = backend.identify(&jpeg_bytes(200, 150)).unwrap();
        assert_eq!(dims, Dimensions { width: 200, height: 150 });
    }

    #[test]
    fn identify_garbage_is_unreadable() {
        let backend = RustBackend::new();
        assert!(matches!(
            backend.identify(b"definitely not an image"),
            Err(BackendError::Unreadable(_))
        ));
    }

    #[test]
    fn render_garbage_is_unreadable() {
        let backend = RustBackend::new();
        let s = spec("thumbnail", VariationParams::new(100, 75));
        assert!(matches!(
            backend.render(b"GIF89a but truncated", &s),
            Err(BackendError::Unreadable(_))
        ));
    }

    #[test]
    fn large_jpeg_cropped_to_exact_box_without_alpha() {
        let backend = RustBackend::new();
        let s = spec("thumbnail", VariationParams::new(100, 75).crop(true));

        let out = backend.render(&jpeg_bytes(4000, 3000), &s).unwrap();
        assert_eq!((out.width, out.height), (100, 75));
        assert_eq!(out.options.format, ImageFormat::Jpeg);
        assert_eq!(out.options.quality, Some(Quality::WEB_HIGH));
        assert!(out.options.optimize);
        assert!(!out.options.progressive);

        let (img, format) = decode(&out.bytes);
        assert_eq!(format, ImageFormat::Jpeg);
        assert_eq!((img.width(), img.height()), (100, 75));
        assert!(!img.color().has_alpha());
    }

    /// Start-of-frame marker of a JPEG: 0xC0 baseline, 0xC2 progressive.
    fn frame_marker(bytes: &[u8]) -> Option<u8> {
        let mut i = 2;
        while i + 4 <= bytes.len() && bytes[i] == 0xFF {
            let marker = bytes[i + 1];
            if (0xC0..=0xC2).contains(&marker) {
                return Some(marker);
            }
            let len = u16::from_be_bytes([bytes[i + 2], bytes[i + 3]]) as usize;
            i += 2 + len;
        }
        None
    }

    #[test]
    fn large_box_jpeg_is_written_progressive() {
        let backend = RustBackend::new();
        let s = spec("medium", VariationParams::new(400, 300));

        let out = backend.render(&jpeg_bytes(2000, 1500), &s).unwrap();
        assert!(out.options.progressive);
        assert!(out.options.optimize);
        assert_eq!(frame_marker(&out.bytes), Some(0xC2));

        let (img, _) = decode(&out.bytes);
        assert_eq!((img.width(), img.height()), (400, 300));
    }

    #[test]
    fn small_box_jpeg_is_written_baseline() {
        let backend = RustBackend::new();
        let s = spec("thumbnail", VariationParams::new(100, 75).crop(true));
        let out = backend.render(&jpeg_bytes(2000, 1500), &s).unwrap();
        assert!(!out.options.progressive);
        assert_eq!(frame_marker(&out.bytes), Some(0xC0));
    }

    #[test]
    fn unresized_jpeg_is_written_baseline() {
        let backend = RustBackend::new();
        let s = spec("large", VariationParams::new(800, 600));
        let out = backend.render(&jpeg_bytes(200, 150), &s).unwrap();
        assert_eq!(out.options, EncodingOptions::passthrough(ImageFormat::Jpeg));
        assert_eq!(frame_marker(&out.bytes), Some(0xC0));
    }

    #[test]
    fn crop_portrait_source_to_landscape_box() {
        let backend = RustBackend::new();
        let s = spec("card", VariationParams::new(120, 80).crop(true));
        let out = backend.render(&jpeg_bytes(300, 900), &s).unwrap();
        assert_eq!((out.width, out.height), (120, 80));
    }

    #[test]
    fn small_png_is_reencoded_unchanged() {
        let backend = RustBackend::new();
        let s = spec("thumbnail", VariationParams::new(100, 75));

        let out = backend.render(&png_bytes(50, 50), &s).unwrap();
        assert_eq!((out.width, out.height), (50, 50));
        assert_eq!(out.options, EncodingOptions::passthrough(ImageFormat::Png));

        let (img, format) = decode(&out.bytes);
        assert_eq!(format, ImageFormat::Png);
        assert_eq!((img.width(), img.height()), (50, 50));
    }

    #[test]
    fn small_source_is_not_upscaled_even_with_crop() {
        let backend = RustBackend::new();
        let s = spec("large", VariationParams::new(800, 600).crop(true));
        let out = backend.render(&jpeg_bytes(64, 48), &s).unwrap();
        assert_eq!((out.width, out.height), (64, 48));
        assert_eq!(out.options.quality, Some(Quality::default()));
    }

    #[test]
    fn fit_keeps_aspect_and_one_side_exact() {
        let backend = RustBackend::new();
        let s = spec("medium", VariationParams::new(100, 75));

        let out = backend.render(&png_bytes(800, 400), &s).unwrap();
        assert_eq!((out.width, out.height), (100, 50));

        let out = backend.render(&png_bytes(400, 800), &s).unwrap();
        assert_eq!((out.width, out.height), (38, 75));
    }

    #[test]
    fn fit_with_unbounded_height() {
        let backend = RustBackend::new();
        let params = VariationParams {
            width: Some(300),
            height: None,
            crop: false,
            resample: Resample::Triangle,
        };
        let s = spec("wide", params);
        let out = backend.render(&jpeg_bytes(1200, 900), &s).unwrap();
        assert_eq!((out.width, out.height), (300, 225));
        assert!(out.options.progressive);
    }

    #[test]
    fn prescaled_source_still_hits_exact_fit() {
        let backend = RustBackend::new();
        let s = spec("thumbnail", VariationParams::new(100, 75));
        // Pre-shrinks by 8 to 125x87; the fit still uses 1000x700
        let out = backend.render(&png_bytes(1000, 700), &s).unwrap();
        assert_eq!(out.width, 100);
        assert_eq!(out.height, 70);
    }

    #[test]
    fn png_alpha_is_preserved() {
        let backend = RustBackend::new();
        let s = spec("icon", VariationParams::new(32, 32));
        let out = backend.render(&rgba_png_bytes(64, 64), &s).unwrap();
        let (img, format) = decode(&out.bytes);
        assert_eq!(format, ImageFormat::Png);
        assert!(img.color().has_alpha());
        assert_eq!((img.width(), img.height()), (32, 32));
    }
}
