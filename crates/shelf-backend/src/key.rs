//! Blob key syntax.
//!
//! Keys are `/`-separated paths such as `Sessions/s1/User/u1.bin`. A
//! container is any proper prefix of a key; the empty key is the root
//! container. Every segment:
//! - Must be non-empty
//! - Must not be `.` or `..`
//! - Must not contain `/`, `\` or NUL
//! - Must not start with [`RESERVED_PREFIX`]

use crate::error::{BackendError, BackendResult};

/// Characters that are forbidden anywhere in a segment.
const FORBIDDEN_CHARS: &[char] = &['/', '\\', '\0'];

/// Segment prefix backends use for their own temporary entries.
pub const RESERVED_PREFIX: &str = ".shelf-";

/// Validate one path segment.
///
/// ```
/// use shelf_backend::key::validate_segment;
///
/// assert!(validate_segment("u1.bin").is_ok());
/// assert!(validate_segment("").is_err());
/// assert!(validate_segment("..").is_err());
/// assert!(validate_segment("a/b").is_err());
/// assert!(validate_segment(".shelf-tmp").is_err());
/// ```
pub fn validate_segment(segment: &str) -> BackendResult<()> {
    if segment.is_empty() {
        return Err(invalid(segment, "segment must not be empty"));
    }
    if segment == "." || segment == ".." {
        return Err(invalid(segment, "segment must not be '.' or '..'"));
    }
    if segment.starts_with(RESERVED_PREFIX) {
        return Err(invalid(
            segment,
            &format!("segment must not start with {RESERVED_PREFIX:?}"),
        ));
    }
    for ch in FORBIDDEN_CHARS {
        if segment.contains(*ch) {
            return Err(invalid(
                segment,
                &format!("contains forbidden character: {ch:?}"),
            ));
        }
    }
    Ok(())
}

/// Validate a blob or container key. The empty key is rejected.
pub fn validate_key(key: &str) -> BackendResult<()> {
    if key.is_empty() {
        return Err(invalid(key, "key must not be empty"));
    }
    for segment in key.split('/') {
        validate_segment(segment).map_err(|e| match e {
            BackendError::InvalidKey { reason, .. } => invalid(key, &reason),
            other => other,
        })?;
    }
    Ok(())
}

/// Validate a container key, accepting the empty root key.
pub fn validate_container(key: &str) -> BackendResult<()> {
    if key.is_empty() {
        return Ok(());
    }
    validate_key(key)
}

/// Append `child` to `parent`.
pub fn join(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        child.to_string()
    } else {
        format!("{parent}/{child}")
    }
}

/// Container holding `key` (empty for top-level keys).
pub fn parent(key: &str) -> &str {
    key.rsplit_once('/').map_or("", |(parent, _)| parent)
}

/// Last segment of `key`.
pub fn file_name(key: &str) -> &str {
    key.rsplit_once('/').map_or(key, |(_, name)| name)
}

/// Returns `true` if `key` lies anywhere under `container`.
pub fn is_within(container: &str, key: &str) -> bool {
    if container.is_empty() {
        return !key.is_empty();
    }
    key.len() > container.len()
        && key.starts_with(container)
        && key.as_bytes()[container.len()] == b'/'
}

/// Rewrite `key` from under `from` to under `to`.
pub(crate) fn rebase(key: &str, from: &str, to: &str) -> String {
    let rest = if from.is_empty() {
        key
    } else {
        &key[from.len() + 1..]
    };
    join(to, rest)
}

fn invalid(key: &str, reason: &str) -> BackendError {
    BackendError::InvalidKey {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
