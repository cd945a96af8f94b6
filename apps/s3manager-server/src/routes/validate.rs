//! Request validation shared by the route handlers
//!
//! Checks here run before any backend call; the backend still has the final
//! word on bucket naming rules.

use crate::error::{AppError, Result};
use crate::storage::MAX_LIST_KEYS;

/// Page size when the caller does not ask for one
pub const DEFAULT_PAGE_SIZE: i32 = 50;

pub fn bucket_name(name: &str) -> Result<()> {
    if !(3..=63).contains(&name.len()) {
        return Err(AppError::bad_request(
            "bucket name must be between 3 and 63 characters",
        ));
    }
    if name.contains('/') {
        return Err(AppError::bad_request("bucket name must not contain '/'"));
    }
    Ok(())
}

pub fn object_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(AppError::bad_request("object key is required"));
    }
    Ok(())
}

/// Boolean query flag; accepts the spellings `1`, `t`, `true` and their
/// negations in any of the usual cases
pub fn flag(name: &str, value: Option<&str>) -> Result<Option<bool>> {
    let Some(value) = value else {
        return Ok(None);
    };
    match value {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(Some(true)),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(Some(false)),
        _ => Err(AppError::bad_request(format!("invalid {} param", name))),
    }
}

/// Requested page size, defaulted and range checked
pub fn page_size(count: Option<i32>) -> Result<i32> {
    let count = count.unwrap_or(DEFAULT_PAGE_SIZE);
    if !(1..=MAX_LIST_KEYS).contains(&count) {
        return Err(AppError::bad_request(format!(
            "count must be between 1 and {}",
            MAX_LIST_KEYS
        )));
    }
    Ok(count)
}
