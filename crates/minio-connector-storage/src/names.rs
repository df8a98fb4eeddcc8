//! Available-name generation
//!
//! When a name is taken (or too long), a candidate is derived from it by truncating the
//! stem and appending `_NNN` before the extension: `photos/cat.jpg` becomes
//! `photos/cat_417.jpg`.

use crate::traits::{StorageError, StorageResult};
use rand::Rng;

/// S3 object keys are limited to 1024 bytes
pub const DEFAULT_MAX_NAME_LENGTH: usize = 1024;

/// Candidates tried before giving up
pub const MAX_NAME_ATTEMPTS: usize = 100;

/// `_` plus three digits
const SUFFIX_LEN: usize = 4;

/// Split `name` into stem and extension, extension including its dot
///
/// Only the last path component is considered and leading dots do not start an
/// extension, so `a.b/c` and `dir/.env` have no extension.
pub fn split_extension(name: &str) -> (&str, &str) {
    let base_start = name.rfind('/').map(|i| i + 1).unwrap_or(0);
    let base = &name[base_start..];
    let leading_dots = base.len() - base.trim_start_matches('.').len();

    match base[leading_dots..].rfind('.') {
        Some(pos) => name.split_at(base_start + leading_dots + pos),
        None => (name, ""),
    }
}

/// Random suffix in `100..999`
pub fn random_suffix() -> u16 {
    rand::rng().random_range(100..999)
}

/// Build the candidate `{stem}_{suffix}{ext}`, truncating the stem so the result is at
/// most `max_length` bytes
pub fn candidate_name(name: &str, max_length: usize, suffix: u16) -> StorageResult<String> {
    let (stem, ext) = split_extension(name);

    let Some(stem_budget) = max_length.checked_sub(ext.len() + SUFFIX_LEN) else {
        return Err(StorageError::InvalidKey(format!(
            "max length {} cannot hold the extension of {}",
            max_length, name
        )));
    };

    Ok(format!("{}_{}{}", truncate_at_char_boundary(stem, stem_budget), suffix, ext))
}

fn truncate_at_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
