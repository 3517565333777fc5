//! Sync engine for battery notes.
//!
//! This crate keeps per-device battery metadata (type, quantity, low
//! threshold, last replacement) consistent with an upstream battery
//! telemetry entity, and exposes derived entities to a host platform.
//!
//! # Components
//!
//! | Component | Role |
//! |-----------|------|
//! | [`Coordinator`] | one per device; owns the metadata snapshot, low/increase detection and listener fan-out |
//! | [`TelemetryMirror`] | follows one upstream entity and normalizes its value |
//! | [`sensors`] | derived entities rendered from coordinator and mirror state |
//! | [`IdentityReconciler`] | reacts to upstream renames, removals and device moves |
//! | [`BatteryNotesEntry`] | wires all of the above for one configuration entry |
//!
//! The host platform is reached only through the traits in [`host`]. The
//! [`mock`] module provides an in-memory implementation for tests.
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//!
//! use battery_notes_core::{
//!     BatteryNotesEntry, EntryConfig, EventDispatcher, MockHost, Options, SharedHost,
//! };
//! use battery_notes_core::host::DeviceEntry;
//! use battery_notes_store::Store;
//!
//! let mock = Arc::new(MockHost::new().with_device(DeviceEntry::new("dev1", "Remote")));
//! mock.set_value("sensor.remote_battery", "87");
//!
//! let host: SharedHost = mock.clone();
//! let store = Arc::new(parking_lot::Mutex::new(Store::open_in_memory().unwrap()));
//! let config = EntryConfig::new("entry1", "dev1")
//!     .with_source("sensor.remote_battery")
//!     .with_battery("AAA", 2);
//!
//! let entry = BatteryNotesEntry::setup(
//!     config,
//!     host,
//!     store,
//!     &Options::default(),
//!     EventDispatcher::default(),
//! )
//! .unwrap();
//!
//! let snapshot = entry.coordinator().snapshot().unwrap();
//! assert_eq!(snapshot.battery_type_and_quantity, "2× AAA");
//! ```

pub mod config;
pub mod coordinator;
pub mod entry;
pub mod error;
pub mod events;
pub mod host;
pub mod mirror;
pub mod mock;
pub mod naming;
pub mod reconciler;
pub mod sensors;
pub mod subscription;

pub use config::Options;
pub use coordinator::{
    Coordinator, CoordinatorSnapshot, Listener, ListenerHandle, ListenerId, RefreshReason,
    SharedStore, TelemetryReading,
};
pub use entry::{BatteryNotesEntry, EntryConfig};
pub use error::{Error, Result};
pub use events::{
    DomainEvent, EVENT_BATTERY_INCREASED, EVENT_BATTERY_THRESHOLD, EventDispatcher,
    EventReceiver, EventSender,
};
pub use host::{
    DeviceRegistry, EntityRegistry, Host, RegistryEvent, SensorState, SharedHost, StateCallback,
    StateSink, StateSource, StateValue,
};
pub use mirror::{MirrorState, TelemetryMirror};
pub use mock::MockHost;
pub use naming::{EntityIdentity, resolve_identity, slugify};
pub use reconciler::{BindingState, IdentityReconciler, ReconcileAction};
pub use sensors::{
    BatteryLowSensor, BatteryPlusSensor, DerivedSensor, EntityDescription, LastReplacedSensor,
    ReplacedButton, TypeSensor,
};
pub use subscription::Subscription;

// Re-export the metadata types for convenience
pub use battery_notes_types::{DeviceMetadata, MetadataUpdate, Precision, TelemetryState};
