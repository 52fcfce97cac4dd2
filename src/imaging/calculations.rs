//! Pure calculation functions for variation dimensions.
//!
//! All functions here are pure and testable without any I/O or images. An
//! unbounded axis (`None`) never constrains anything.

use crate::variations::Bounds;

/// Box areas above this many pixels get progressive JPEG encoding.
pub const PROGRESSIVE_AREA_THRESHOLD: u64 = 10_000;

/// Whether `source` exceeds the box on at least one bounded axis.
///
/// Only larger sources are resized; everything else is re-encoded as is.
pub fn is_larger(source: (u32, u32), bounds: Bounds) -> bool {
    let (w, h) = source;
    bounds.width.is_some_and(|bw| w > bw) || bounds.height.is_some_and(|bh| h > bh)
}

/// Power-of-two divisor for a cheap pre-shrink before the precise resize.
///
/// Doubles while the source divided by the divisor is still more than twice
/// the box on **both** axes, so the final filter never works on more than
/// ~4× the target pixels. An unbounded axis stops the search at 1.
///
/// # Examples
/// ```
/// # use image_variations::imaging::calculations::prescale_divisor;
/// # use image_variations::variations::Bounds;
/// let bounds = Bounds { width: Some(100), height: Some(75) };
/// assert_eq!(prescale_divisor((4000, 3000), bounds), 32);
/// assert_eq!(prescale_divisor((150, 120), bounds), 1);
/// ```
pub fn prescale_divisor(source: (u32, u32), bounds: Bounds) -> u32 {
    let (Some(bw), Some(bh)) = (bounds.width, bounds.height) else {
        return 1;
    };
    let (w, h) = (source.0 as f64, source.1 as f64);
    let mut divisor: u32 = 1;
    while w / divisor as f64 > 2.0 * bw as f64 && h / divisor as f64 > 2.0 * bh as f64 {
        divisor *= 2;
    }
    divisor
}

/// Dimensions after dividing by `divisor`, never below 1×1.
pub fn prescaled_dimensions(source: (u32, u32), divisor: u32) -> (u32, u32) {
    let divisor = divisor.max(1);
    ((source.0 / divisor).max(1), (source.1 / divisor).max(1))
}

/// Largest size that fits inside the box while preserving aspect ratio.
///
/// The constraining axis matches the box exactly; the other is rounded and
/// clamped to `1..=bound`. Sources already inside the box are returned
/// unchanged, so this never upscales.
///
/// # Examples
/// ```
/// # use image_variations::imaging::calculations::fit_within;
/// # use image_variations::variations::Bounds;
/// let bounds = Bounds { width: Some(100), height: Some(75) };
/// assert_eq!(fit_within((400, 200), bounds), (100, 50));
/// assert_eq!(fit_within((200, 400), bounds), (38, 75));
/// assert_eq!(fit_within((50, 50), bounds), (50, 50));
/// ```
pub fn fit_within(source: (u32, u32), bounds: Bounds) -> (u32, u32) {
    let (w, h) = source;
    let scale_x = bounds.width.map(|bw| bw as f64 / w as f64);
    let scale_y = bounds.height.map(|bh| bh as f64 / h as f64);

    let width_constrains = match (scale_x, scale_y) {
        (None, None) => return source,
        (Some(sx), None) => {
            if sx >= 1.0 {
                return source;
            }
            true
        }
        (None, Some(sy)) => {
            if sy >= 1.0 {
                return source;
            }
            false
        }
        (Some(sx), Some(sy)) => {
            if sx.min(sy) >= 1.0 {
                return source;
            }
            sx <= sy
        }
    };

    if width_constrains {
        let (bw, sx) = (bounds.width.unwrap_or(w), scale_x.unwrap_or(1.0));
        let max_h = bounds.height.unwrap_or(u32::MAX);
        (bw, scale_round(h, sx).clamp(1, max_h))
    } else {
        let (bh, sy) = (bounds.height.unwrap_or(h), scale_y.unwrap_or(1.0));
        let max_w = bounds.width.unwrap_or(u32::MAX);
        (scale_round(w, sy).clamp(1, max_w), bh)
    }
}

fn scale_round(value: u32, scale: f64) -> u32 {
    (value as f64 * scale).round() as u32
}

/// Pixel area of the box, or `None` when an axis is unbounded.
pub fn box_area(bounds: Bounds) -> Option<u64> {
    Some(bounds.width? as u64 * bounds.height? as u64)
}

/// Whether a JPEG for this box should be written progressively. An
/// unbounded box always qualifies.
pub fn wants_progressive(bounds: Bounds) -> bool {
    box_area(bounds).is_none_or(|area| area > PROGRESSIVE_AREA_THRESHOLD)
}
