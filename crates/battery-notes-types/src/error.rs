//! Error types for metadata validation in battery-notes-types.

use thiserror::Error;

/// Errors raised when battery metadata fails range or format checks.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum MetadataError {
    /// A percentage threshold was outside `0..=100`.
    #[error("{field} must be between 0 and 100, got {value}")]
    ThresholdOutOfRange { field: &'static str, value: u32 },

    /// A stored or user-supplied date could not be parsed.
    #[error("Invalid date '{0}': expected YYYY-MM-DD")]
    InvalidDate(String),
}

/// Result type alias using battery-notes-types' MetadataError type.
pub type MetadataResult<T> = std::result::Result<T, MetadataError>;
