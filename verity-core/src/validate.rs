//! Checks for user-supplied text fields.

use thiserror::Error;

use crate::char_len;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Empty { field: &'static str },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },

    #[error("{field} {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

/// Trim `value` and check it is non-empty and within `max` characters.
pub fn check_text(field: &'static str, value: &str, max: usize) -> Result<String, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::Empty { field });
    }
    check_optional_text(field, value, max)
}

/// Like [`check_text`] but an empty value is fine.
pub fn check_optional_text(
    field: &'static str,
    value: &str,
    max: usize,
) -> Result<String, ValidationError> {
    let value = value.trim();
    if char_len(value) > max {
        return Err(ValidationError::TooLong { field, max });
    }
    Ok(value.to_string())
}
