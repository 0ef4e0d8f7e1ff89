//! Input validation for feedback submissions.
//!
//! Both fields of a submission are required, non-empty strings. Text is
//! length-checked, stripped of control characters, and NFKC-normalized
//! before it reaches the sanitizer.

use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

/// Validation error types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is missing or blank.
    #[error("Field '{0}' is required and must be a non-empty string")]
    Missing(&'static str),

    /// A field exceeds its maximum allowed length.
    #[error("Field '{field}' exceeds maximum length ({max} bytes, got {actual})")]
    TooLong {
        /// Field name.
        field: &'static str,
        /// Maximum allowed length.
        max: usize,
        /// Actual input length.
        actual: usize,
    },

    /// Nothing was left of the feedback text after markup was removed.
    #[error("Feedback contains no text after sanitization")]
    EmptyAfterSanitize,
}

/// Size limits per field.
pub mod limits {
    /// Maximum length of the `type` tag.
    pub const MAX_TYPE_LENGTH: usize = 64;

    /// Maximum feedback text length (64KB).
    pub const MAX_FEEDBACK_LENGTH: usize = 64 * 1024;
}

/// Strip control characters (except newlines/tabs) and NFKC-normalize.
#[must_use]
pub fn normalize_text(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\t' | '\r'))
        .collect::<String>()
        .nfkc()
        .collect()
}

/// Validate a required text field and return its normalized, trimmed value.
///
/// The length cap applies to the raw input and again to the normalized
/// value, since NFKC can expand a single character into many.
///
/// # Errors
///
/// Returns `ValidationError::TooLong` if either the raw or the normalized
/// value exceeds `max_len` bytes, or `ValidationError::Missing` if nothing but
/// whitespace remains.
pub fn validate_field(
    field: &'static str,
    input: &str,
    max_len: usize,
) -> Result<String, ValidationError> {
    check_length(field, input, max_len)?;

    let normalized = normalize_text(input);
    let trimmed = normalized.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Missing(field));
    }
    check_length(field, trimmed, max_len)?;

    Ok(trimmed.to_string())
}

fn check_length(field: &'static str, value: &str, max_len: usize) -> Result<(), ValidationError> {
    if value.len() > max_len {
        return Err(ValidationError::TooLong {
            field,
            max: max_len,
            actual: value.len(),
        });
    }
    Ok(())
}

/// Validate the `type` tag of a submission.
///
/// # Errors
///
/// See [`validate_field`].
pub fn validate_kind(input: &str) -> Result<String, ValidationError> {
    validate_field("type", input, limits::MAX_TYPE_LENGTH)
}

/// Validate the feedback text of a submission (before sanitization).
///
/// # Errors
///
/// See [`validate_field`].
pub fn validate_feedback(input: &str) -> Result<String, ValidationError> {
    validate_field("feedback", input, limits::MAX_FEEDBACK_LENGTH)
}
