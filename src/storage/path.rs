//! Storage key validation.
//!
//! Keys arrive from record fields and config files, so they may use either
//! separator and may try to climb out of the storage root. Every backend
//! runs keys through [`validate`] first.

use super::StorageError;

/// Normalise a storage key and reject anything that escapes the root.
///
/// - `\` is treated as a separator and rewritten to `/`
/// - empty segments and `.` are dropped, `..` pops a segment
/// - a `..` with nothing left to pop, a NUL byte, or an empty result is
///   [`StorageError::InvalidPath`]
///
/// ```
/// use image_variations::storage::path::validate;
/// assert_eq!(validate("image//2024/./a.jpg").unwrap(), "image/2024/a.jpg");
/// assert_eq!(validate("image\\goods\\a.jpg").unwrap(), "image/goods/a.jpg");
/// assert!(validate("../etc/passwd").is_err());
/// ```
pub fn validate(path: &str) -> Result<String, StorageError> {
    if path.contains('\0') {
        return Err(StorageError::InvalidPath(path.to_string()));
    }
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(StorageError::InvalidPath(path.to_string()));
                }
            }
            normal => segments.push(normal),
        }
    }
    if segments.is_empty() {
        return Err(StorageError::InvalidPath(path.to_string()));
    }
    Ok(segments.join("/"))
}
