//! Hub errors.

use thiserror::Error;

/// Errors raised by [`crate::BatteryNotes`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HubError {
    /// The sync engine failed.
    #[error(transparent)]
    Core(#[from] battery_notes_core::Error),

    /// The metadata store failed.
    #[error("Metadata store error: {0}")]
    Store(#[from] battery_notes_store::Error),

    /// No entry with this id is loaded.
    #[error("Entry not found: {0}")]
    EntryNotFound(String),

    /// An entry with this id is already loaded.
    #[error("Entry already loaded: {0}")]
    DuplicateEntry(String),

    /// No loaded entry belongs to this device.
    #[error("Device {0} is not configured in battery notes")]
    DeviceNotConfigured(String),
}

/// Result type alias using the hub's error type.
pub type Result<T> = std::result::Result<T, HubError>;
