//! Local persistence for battery notes device metadata.
//!
//! This crate provides SQLite-based storage for per-device battery metadata
//! (type, quantity, low threshold, last replacement day). Writes are
//! synchronous; a failed write is returned to the caller, never dropped.
//!
//! # Example
//!
//! ```no_run
//! use battery_notes_store::Store;
//! use battery_notes_types::MetadataUpdate;
//!
//! let store = Store::open_default()?;
//! store.update_device("a1b2c3", &MetadataUpdate::new().battery_type("CR2032"))?;
//! let metadata = store.get_device_or_default("a1b2c3")?;
//! println!("{}", metadata.battery_type_and_quantity());
//! # Ok::<(), battery_notes_store::Error>(())
//! ```

mod error;
mod models;
mod schema;
mod store;

pub use error::{Error, Result};
pub use models::StoredMetadata;
pub use store::Store;

/// Default database path following platform conventions.
///
/// - Linux: `~/.local/share/battery-notes/metadata.db`
/// - macOS: `~/Library/Application Support/battery-notes/metadata.db`
/// - Windows: `C:\Users\<user>\AppData\Local\battery-notes\metadata.db`
pub fn default_db_path() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("battery-notes")
        .join("metadata.db")
}
