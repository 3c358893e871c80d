//! Record domain model.
//!
//! # Responsibility
//! - Define the canonical stored record and its identifier.
//! - Validate record names before any store mutation.
//!
//! # Invariants
//! - `id` is store-assigned, positive and never reused within one store.
//! - `name` is non-blank and at most [`MAX_RECORD_NAME_UNITS`] UTF-16 code units.
//! - `created_at` is set once at creation and never mutated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Store-assigned record identifier. Valid ids are strictly positive.
pub type RecordId = i64;

/// Maximum accepted record name length, counted in UTF-16 code units.
pub const MAX_RECORD_NAME_UNITS: usize = 500;

/// A named record with its creation timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Reason a record name was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordValidationError {
    /// Name is empty or whitespace-only.
    EmptyName,
    /// Name exceeds [`MAX_RECORD_NAME_UNITS`].
    NameTooLong { max: usize, actual: usize },
}

impl Display for RecordValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyName => write!(f, "record name cannot be empty or whitespace"),
            Self::NameTooLong { max, actual } => write!(
                f,
                "record name cannot exceed {max} UTF-16 code units (got {actual})"
            ),
        }
    }
}

impl Error for RecordValidationError {}

impl RecordValidationError {
    /// Stable short code used in structured log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptyName => "empty_name",
            Self::NameTooLong { .. } => "name_too_long",
        }
    }
}

/// Checks a candidate record name.
///
/// Whitespace is not trimmed from accepted names; the stored name equals the
/// input exactly. Length counts UTF-16 code units, so characters outside the
/// Basic Multilingual Plane count twice.
pub fn validate_record_name(name: &str) -> Result<(), RecordValidationError> {
    if name.trim().is_empty() {
        return Err(RecordValidationError::EmptyName);
    }

    let actual = name.encode_utf16().count();
    if actual > MAX_RECORD_NAME_UNITS {
        return Err(RecordValidationError::NameTooLong {
            max: MAX_RECORD_NAME_UNITS,
            actual,
        });
    }

    Ok(())
}

/// Truncates a timestamp to the millisecond precision used by storage.
pub fn storage_timestamp(at: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(at.timestamp_millis()).unwrap_or(at)
}
