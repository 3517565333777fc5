//! Platform-agnostic types for battery notes.
//!
//! This crate provides the data shared by the store (battery-notes-store),
//! the sync engine (battery-notes-core) and the service front-end.
//!
//! # Features
//!
//! - Per-device battery metadata and partial updates
//! - Upstream telemetry state with sentinel and numeric handling
//! - Day-precision date helpers
//! - Validation errors
//!
//! # Example
//!
//! ```
//! use battery_notes_types::{DeviceMetadata, MetadataUpdate};
//!
//! let current = DeviceMetadata::new("AA", 2);
//! let next = MetadataUpdate::new().battery_quantity(4).apply_to(&current);
//! assert_eq!(next.battery_type_and_quantity(), "4× AA");
//! ```

pub mod date;
pub mod error;
pub mod metadata;
pub mod telemetry;

pub use date::{day_start_utc, format_date, parse_date, truncate_to_day};
pub use error::{MetadataError, MetadataResult};
pub use metadata::{
    DEFAULT_BATTERY_INCREASE_THRESHOLD, DEFAULT_BATTERY_LOW_THRESHOLD, DeviceMetadata,
    MAX_THRESHOLD, MetadataUpdate, battery_type_and_quantity,
};
pub use telemetry::{
    Attributes, Precision, STATE_OFF, STATE_ON, STATE_UNAVAILABLE, STATE_UNKNOWN,
    TelemetryState,
};
