//! Error types for battery-notes-store.

use std::path::PathBuf;

use battery_notes_types::MetadataError;

/// Result type for battery-notes-store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in battery-notes-store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Database error from SQLite.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Failed to create database directory.
    #[error("Failed to create database directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Metadata failed validation, or a stored row could not be decoded.
    #[error("Invalid metadata: {0}")]
    InvalidMetadata(#[from] MetadataError),

    /// Stored value out of range for its column.
    #[error("Invalid stored value for {column}: {value}")]
    InvalidColumn { column: &'static str, value: i64 },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
