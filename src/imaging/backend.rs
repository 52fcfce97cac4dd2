//! Image processing backend trait and shared types.
//!
//! The [`VariationBackend`] trait defines the two operations the render
//! pipeline needs: identify a source and render one variation of it. Both
//! work on in-memory bytes, since sources and artifacts live behind a
//! [`Storage`](crate::storage::Storage) rather than on a local disk.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate.

use super::params::EncodingOptions;
use crate::variations::VariationSpec;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("unreadable image: {0}")]
    Unreadable(String),
    #[error("encode failed: {0}")]
    Encode(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn as_tuple(self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Encoded output of a single variation.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedVariation {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub options: EncodingOptions,
}

/// Trait for image processing backends.
///
/// Implementations must be `Sync`: bulk renders share one backend across
/// every worker of the pool.
pub trait VariationBackend: Sync {
    /// Read the dimensions of an encoded image.
    fn identify(&self, source: &[u8]) -> Result<Dimensions, BackendError>;

    /// Produce the encoded bytes of `spec` for an encoded source.
    fn render(&self, source: &[u8], spec: &VariationSpec)
    -> Result<RenderedVariation, BackendError>;
}
