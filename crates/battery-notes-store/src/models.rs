//! Data models for stored metadata.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use battery_notes_types::DeviceMetadata;

/// A device's metadata as stored in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMetadata {
    /// Device identifier.
    pub device_id: String,
    /// Battery metadata.
    #[serde(flatten)]
    pub metadata: DeviceMetadata,
    /// Last time the record was written.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}
