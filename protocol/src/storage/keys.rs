//! # Composite Keys
//!
//! Records that belong to a category (holds, allowances, bids) are stored
//! under composite keys: the object type and every attribute are each
//! terminated by U+0000, and the whole key starts with U+0000 so composite
//! keys can never collide with plain keys such as a principal ID.
//!
//! ```text
//! \0allowance\0alice\0bob\0
//! ```
//!
//! The layout matches what permissioned-ledger peers expect, so range
//! scans over `\0{object_type}\0` enumerate a whole category.

use super::{StoreError, StoreResult};

/// Delimiter between composite key segments.
pub const COMPOSITE_KEY_NAMESPACE: char = '\u{0}';

/// Build a composite key from an object type and its ordered attributes.
///
/// # Errors
///
/// Returns [`StoreError::InvalidKey`] if the object type is empty or if any
/// segment contains the U+0000 delimiter.
pub fn composite_key(object_type: &str, attributes: &[&str]) -> StoreResult<String> {
    if object_type.is_empty() {
        return Err(StoreError::InvalidKey("object type must not be empty".into()));
    }
    validate_segment(object_type)?;

    let mut key = String::with_capacity(
        2 + object_type.len() + attributes.iter().map(|a| a.len() + 1).sum::<usize>(),
    );
    key.push(COMPOSITE_KEY_NAMESPACE);
    key.push_str(object_type);
    key.push(COMPOSITE_KEY_NAMESPACE);
    for attr in attributes {
        validate_segment(attr)?;
        key.push_str(attr);
        key.push(COMPOSITE_KEY_NAMESPACE);
    }
    Ok(key)
}

/// Split a composite key back into its object type and attributes.
///
/// # Errors
///
/// Returns [`StoreError::InvalidKey`] if `key` was not produced by
/// [`composite_key`].
pub fn split_composite_key(key: &str) -> StoreResult<(String, Vec<String>)> {
    let body = key
        .strip_prefix(COMPOSITE_KEY_NAMESPACE)
        .and_then(|rest| rest.strip_suffix(COMPOSITE_KEY_NAMESPACE))
        .ok_or_else(|| StoreError::InvalidKey(format!("not a composite key: {key:?}")))?;

    let mut parts = body.split(COMPOSITE_KEY_NAMESPACE).map(str::to_string);
    let object_type = parts
        .next()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| StoreError::InvalidKey(format!("missing object type: {key:?}")))?;
    Ok((object_type, parts.collect()))
}

/// Returns `true` if `key` lives in the composite-key namespace.
pub fn is_composite_key(key: &str) -> bool {
    key.starts_with(COMPOSITE_KEY_NAMESPACE)
}

fn validate_segment(segment: &str) -> StoreResult<()> {
    if segment.contains(COMPOSITE_KEY_NAMESPACE) {
        return Err(StoreError::InvalidKey(format!(
            "segment {segment:?} contains the U+0000 delimiter"
        )));
    }
    Ok(())
}
