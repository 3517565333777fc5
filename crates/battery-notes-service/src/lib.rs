//! Hub, host event dispatcher and configuration for battery notes.
//!
//! This crate ties the sync engine to a host integration:
//! - Loads configuration (options, storage path, entries) from TOML
//! - Owns every loaded entry through the [`BatteryNotes`] hub
//! - Applies host events serially through [`dispatch::run`]
//!
//! # Configuration
//!
//! The service reads configuration from `~/.config/battery-notes/config.toml`:
//!
//! ```toml
//! [options]
//! enable_replaced = true
//! hide_battery = false
//! round_battery = false
//! default_battery_low_threshold = 10
//! battery_increase_threshold = 25
//!
//! [storage]
//! path = "~/.local/share/battery-notes/metadata.db"
//!
//! [[entries]]
//! entry_id = "01HV..."
//! device_id = "a1b2c3"
//! source_entity_id = "sensor.kitchen_remote_battery"
//! battery_type = "CR2032"
//! battery_quantity = 1
//! battery_low_threshold = 15
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod hub;

pub use config::{Config, ConfigError, StorageConfig, ValidationError, default_config_path};
pub use dispatch::HostEvent;
pub use error::{HubError, Result};
pub use hub::{BatteryNotes, open_store};
