//! Image processing for variations, pure Rust.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::ImageReader::into_dimensions` |
//! | **Pre-shrink** | `Triangle` resize by a power of two |
//! | **Fit** | aspect-preserving resize, constraining side exact |
//! | **Crop** | `resize_to_fill` (centre crop) |
//! | **Encode** | source format; JPEG as RGB8 at "web high" quality |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Encoding options chosen per variation
//! - **Backend**: [`VariationBackend`] trait + [`RustBackend`]

pub mod backend;
pub mod calculations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, RenderedVariation, VariationBackend};
pub use params::{EncodingOptions, Quality};
pub use rust_backend::RustBackend;
