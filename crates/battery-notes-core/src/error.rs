//! Error types for battery-notes-core.
//!
//! Upstream telemetry problems never surface here: a missing or malformed
//! upstream value degrades the mirrored sensor to unavailable. These errors
//! cover persistence, identity and wiring failures, which abort the setup of
//! a single entry.
//!
//! | Error | Raised by | Effect |
//! |-------|-----------|--------|
//! | [`Error::Store`] | metadata reads and writes | caller decides retry vs. report |
//! | [`Error::EntityIdCollision`] | entity naming | entry setup aborted |
//! | [`Error::ListenerAlreadyRegistered`] | `Coordinator::add_listener` | registration refused |
//! | [`Error::InvalidConfig`] | options validation | entry setup aborted |
//! | [`Error::RegistryUpdateRejected`] | host registry writes | entry setup aborted |

use thiserror::Error;

use battery_notes_types::MetadataError;

/// Errors raised by the battery notes sync engine.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The metadata store failed.
    #[error("Metadata store error: {0}")]
    Store(#[from] battery_notes_store::Error),

    /// Metadata failed validation.
    #[error("Invalid metadata: {0}")]
    InvalidMetadata(#[from] MetadataError),

    /// A derived entity id is already taken by another entity.
    #[error("Entity id {entity_id} is already used by {existing_unique_id}, cannot assign it to {unique_id}")]
    EntityIdCollision {
        /// The contested entity id.
        entity_id: String,
        /// Unique id of the entity being created.
        unique_id: String,
        /// Unique id currently holding the entity id.
        existing_unique_id: String,
    },

    /// The same listener was registered twice with a coordinator.
    #[error("Listener already registered with coordinator for {device_id}")]
    ListenerAlreadyRegistered {
        /// Device the coordinator belongs to.
        device_id: String,
    },

    /// A registry entity does not exist.
    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    /// A registry device does not exist.
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// The host refused a registry update.
    #[error("Registry update rejected for {0}")]
    RegistryUpdateRejected(String),

    /// Invalid options or entry configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A coordinator listener reported a failure.
    #[error("Listener failed: {0}")]
    Listener(String),
}

impl Error {
    /// Create an entity not found error.
    pub fn entity_not_found(entity_id: impl Into<String>) -> Self {
        Self::EntityNotFound(entity_id.into())
    }

    /// Create a device not found error.
    pub fn device_not_found(device_id: impl Into<String>) -> Self {
        Self::DeviceNotFound(device_id.into())
    }

    /// Create an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Create a listener failure.
    pub fn listener(message: impl Into<String>) -> Self {
        Self::Listener(message.into())
    }
}

/// Result type alias using battery-notes-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collision_message_names_both_ids() {
        let err = Error::EntityIdCollision {
            entity_id: "sensor.remote_battery_plus".into(),
            unique_id: "entry2_battery_plus".into(),
            existing_unique_id: "entry1_battery_plus".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("entry1_battery_plus"));
        assert!(msg.contains("entry2_battery_plus"));
    }

    #[test]
    fn test_store_error_converts() {
        let err: Error = battery_notes_store::Error::from(MetadataError::InvalidDate("x".into())).into();
        assert!(matches!(err, Error::Store(_)));
    }
}
