//! Input validation shared by the vault, scanner and resolver.

use std::sync::OnceLock;

use regex::Regex;

use crate::errors::{Result, SecretSyncError};

/// Maximum plaintext size in UTF-8 bytes (8 KiB).
pub const MAX_VALUE_BYTES: usize = 8 * 1024;

/// Default and maximum `list` page sizes.
pub const DEFAULT_PAGE_SIZE: usize = 25;
pub const MAX_PAGE_SIZE: usize = 100;

fn key_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Z0-9_.:-]{2,128}$").expect("static regex is valid"))
}

/// Returns `true` if `key` is a well-formed secret key.
pub fn is_valid_key(key: &str) -> bool {
    key_pattern().is_match(key)
}

/// Validate a secret key: uppercase letters, digits, `_ . : -`, 2-128 chars.
pub fn validate_key(key: &str) -> Result<()> {
    if is_valid_key(key) {
        Ok(())
    } else {
        Err(SecretSyncError::Validation(format!(
            "key '{key}' must match ^[A-Z0-9_.:-]{{2,128}}$"
        )))
    }
}

/// Validate a plaintext value against the size cap.
pub fn validate_value(value: &str) -> Result<()> {
    if value.len() > MAX_VALUE_BYTES {
        return Err(SecretSyncError::Validation(format!(
            "value is {} bytes, maximum is {MAX_VALUE_BYTES}",
            value.len()
        )));
    }
    Ok(())
}

/// Normalize `list` paging: pages are 1-based, sizes clamped to `1..=MAX_PAGE_SIZE`.
pub fn normalize_page(page: usize, page_size: usize) -> (usize, usize) {
    (page.max(1), page_size.clamp(1, MAX_PAGE_SIZE))
}
