//! Naming rules for object names, user ids, and session ids.
//!
//! These values become parts of storage file names
//! (`<user>_<session>_<object>.json`), so path separators, reserved
//! characters, whitespace, and the `_` field separator are rejected.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;
use thiserror::Error;

static INVALID_NAME_CHARS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"[<>:"/\\|?*\x00-\x1F\x7F\s_]"#).expect("static name pattern is valid")
});

/// Name validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameValidationError {
    #[error("name must not be empty")]
    Empty,
    #[error("name consists only of invalid characters")]
    OnlyInvalidCharacters,
    #[error("name contains invalid characters {found:?}; suggested `{sanitized}`")]
    InvalidCharacters { found: Vec<char>, sanitized: String },
}

/// Validates one name against the storage naming rules.
pub fn validate_name(value: &str) -> Result<(), NameValidationError> {
    if value.is_empty() {
        return Err(NameValidationError::Empty);
    }

    let sanitized = sanitize_name(value);
    if sanitized.is_empty() {
        return Err(NameValidationError::OnlyInvalidCharacters);
    }

    let found: BTreeSet<char> = INVALID_NAME_CHARS
        .find_iter(value)
        .filter_map(|m| m.as_str().chars().next())
        .collect();
    if !found.is_empty() {
        return Err(NameValidationError::InvalidCharacters {
            found: found.into_iter().collect(),
            sanitized,
        });
    }
    Ok(())
}

/// Replaces invalid characters with `-` and trims leading/trailing dashes.
pub fn sanitize_name(value: &str) -> String {
    INVALID_NAME_CHARS
        .replace_all(value, "-")
        .trim_matches('-')
        .to_string()
}
