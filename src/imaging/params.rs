//! Encoding parameters for rendered variations.
//!
//! These describe *how* a variation is written, not what it contains. The
//! backend picks them from the source format and the variation box, and
//! reports them back in [`RenderedVariation`](super::backend::RenderedVariation)
//! so callers and tests can see what was decided.

use super::calculations::wants_progressive;
use crate::variations::Bounds;
use image::ImageFormat;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u8);

impl Quality {
    /// "web high": the preset used for resized JPEG variations.
    pub const WEB_HIGH: Quality = Quality(80);

    pub fn new(value: u8) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    /// Encoder default for JPEGs re-encoded without resizing.
    fn default() -> Self {
        Self(75)
    }
}

/// How a variation is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodingOptions {
    /// Output format, always the source's format.
    pub format: ImageFormat,
    /// Lossy quality; `None` for lossless formats.
    pub quality: Option<Quality>,
    pub optimize: bool,
    pub progressive: bool,
}

impl EncodingOptions {
    /// Plain re-encode in `format` with encoder defaults.
    pub fn passthrough(format: ImageFormat) -> Self {
        Self {
            format,
            quality: (format == ImageFormat::Jpeg).then(Quality::default),
            optimize: false,
            progressive: false,
        }
    }

    /// Options for a resized variation of a `format` source.
    ///
    /// JPEGs get the web-high preset, optimisation, and progressive encoding
    /// for boxes over the area threshold. Other formats keep their defaults.
    pub fn for_variation(format: ImageFormat, bounds: Bounds) -> Self {
        if format != ImageFormat::Jpeg {
            return Self::passthrough(format);
        }
        Self {
            format,
            quality: Some(Quality::WEB_HIGH),
            optimize: true,
            progressive: wants_progressive(bounds),
        }
    }
}
