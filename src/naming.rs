//! Derived file names for variations.
//!
//! A variation lives next to its source, named after it:
//!
//! ```text
//! image/2024/05/dawn.jpg          ← source
//! image/2024/05/dawn.thumbnail.jpg ← variation "thumbnail"
//! ```
//!
//! The layout is part of the storage contract: templates and external
//! tooling build variation URLs from it directly, so it must never change.

use crate::variations::FieldVariations;

/// Derive the storage path of `variation` for `source`.
///
/// Splits the source into directory, base name and extension and returns
/// `directory/base.variation.ext`. Backslashes are normalised to `/`. The
/// extension is everything from the last dot of the file name, unless that
/// dot only leads the name (`.hidden` has no extension).
///
/// Pure and infallible: malformed paths pass through structurally.
///
/// ```
/// use image_variations::naming::derive_variation_name;
/// assert_eq!(
///     derive_variation_name("image/2024/05/dawn.jpg", "thumbnail"),
///     "image/2024/05/dawn.thumbnail.jpg"
/// );
/// assert_eq!(derive_variation_name("a.tar.gz", "small"), "a.tar.small.gz");
/// ```
pub fn derive_variation_name(source: &str, variation: &str) -> String {
    let normalized = source.replace('\\', "/");
    let (dir, file) = match normalized.rfind('/') {
        Some(pos) => (&normalized[..=pos], &normalized[pos + 1..]),
        None => ("", normalized.as_str()),
    };
    let (stem, ext) = split_extension(file);
    format!("{dir}{stem}.{variation}{ext}")
}

/// Split `file` into stem and extension (with its dot). Leading dots belong
/// to the stem.
fn split_extension(file: &str) -> (&str, &str) {
    let leading = file.len() - file.trim_start_matches('.').len();
    match file[leading..].rfind('.') {
        Some(pos) => file.split_at(leading + pos),
        None => (file, ""),
    }
}

/// Every variation path of `source`, as `(variation name, path)` pairs in
/// declaration order.
pub fn variation_paths(source: &str, variations: &FieldVariations) -> Vec<(String, String)> {
    variations
        .names()
        .map(|name| (name.to_string(), derive_variation_name(source, name)))
        .collect()
}
