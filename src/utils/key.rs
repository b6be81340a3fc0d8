//! Key path normalization.
//!
//! Keys are absolute slash-delimited paths. The client accepts a few
//! harmless spellings (`test/key1`, `/test/dir/`) and rewrites them into the
//! canonical form before they reach the store; inputs that cannot name a
//! node are rejected as programmer errors.

use crate::ClientApiError;

/// Returns the canonical form of `key`.
///
/// - adds the leading `/` when missing
/// - drops trailing `/` (the root stays `/`)
///
/// # Errors
/// [`ClientApiError::InvalidArgument`] for empty keys, keys containing NUL,
/// and keys with an empty segment (`/a//b`).
pub fn normalize_key(key: &str) -> std::result::Result<String, ClientApiError> {
    if key.is_empty() {
        return Err(ClientApiError::invalid_argument("key must not be empty"));
    }
    if key.contains('\0') {
        return Err(ClientApiError::invalid_argument(format!(
            "key must not contain NUL: {key:?}"
        )));
    }

    let trimmed = key.trim_end_matches('/');
    if trimmed.is_empty() {
        return Ok("/".to_string());
    }

    let canonical = if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    };

    if canonical.contains("//") {
        return Err(ClientApiError::invalid_argument(format!(
            "key must not contain empty segments: {key:?}"
        )));
    }

    Ok(canonical)
}
