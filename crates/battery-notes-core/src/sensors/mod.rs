//! Derived entities.
//!
//! Every entity renders purely from coordinator and mirror state and is
//! updated by push only. Each owns its listener registration and upstream
//! subscription; `stop` releases both and drops anything still in flight.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde::Serialize;

use battery_notes_types::Attributes;

use crate::coordinator::{Coordinator, CoordinatorSnapshot, Listener, ListenerHandle, RefreshReason};
use crate::error::Result;
use crate::host::{EntityCategory, SensorState, SharedHost, StateValue};
use crate::naming::EntityIdentity;

mod battery_low;
mod battery_plus;
mod button;
mod last_replaced;
mod type_sensor;

pub use battery_low::BatteryLowSensor;
pub use battery_plus::BatteryPlusSensor;
pub use button::ReplacedButton;
pub use last_replaced::LastReplacedSensor;
pub use type_sensor::TypeSensor;

/// Static description of a derived entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityDescription {
    pub key: &'static str,
    /// Appended to the entry id to form the unique id. Never change these.
    pub unique_id_suffix: &'static str,
    pub domain: &'static str,
    pub name: &'static str,
    pub icon: Option<&'static str>,
    pub entity_category: Option<EntityCategory>,
}

/// Battery type and quantity. The empty suffix predates the other entities.
pub const TYPE_SENSOR: EntityDescription = EntityDescription {
    key: "battery_type",
    unique_id_suffix: "",
    domain: "sensor",
    name: "Battery type",
    icon: Some("mdi:battery-unknown"),
    entity_category: Some(EntityCategory::Diagnostic),
};

pub const LAST_REPLACED_SENSOR: EntityDescription = EntityDescription {
    key: "battery_last_replaced",
    unique_id_suffix: "_battery_last_replaced",
    domain: "sensor",
    name: "Battery last replaced",
    icon: Some("mdi:battery-clock"),
    entity_category: Some(EntityCategory::Diagnostic),
};

pub const BATTERY_PLUS: EntityDescription = EntityDescription {
    key: "battery_plus",
    unique_id_suffix: "_battery_plus",
    domain: "sensor",
    name: "Battery+",
    icon: None,
    entity_category: None,
};

pub const BATTERY_LOW: EntityDescription = EntityDescription {
    key: "battery_plus_low",
    unique_id_suffix: "_battery_plus_low",
    domain: "binary_sensor",
    name: "Battery+ low",
    icon: None,
    entity_category: None,
};

pub const REPLACED_BUTTON: EntityDescription = EntityDescription {
    key: "battery_replaced",
    unique_id_suffix: "_battery_replaced",
    domain: "button",
    name: "Battery replaced",
    icon: Some("mdi:battery-sync"),
    entity_category: Some(EntityCategory::Config),
};

/// Every entity description, in setup order.
pub const ALL_DESCRIPTIONS: [&EntityDescription; 5] = [
    &TYPE_SENSOR,
    &LAST_REPLACED_SENSOR,
    &BATTERY_PLUS,
    &BATTERY_LOW,
    &REPLACED_BUTTON,
];

/// Common behaviour of the derived entities.
pub trait DerivedSensor: Send + Sync {
    /// Entity identity.
    fn identity(&self) -> &EntityIdentity;

    /// Render the current state without publishing it.
    fn render(&self) -> SensorState;

    /// Release every subscription and listener. Idempotent.
    fn stop(&self);

    /// Returns true once stopped.
    fn is_stopped(&self) -> bool;
}

/// State and plumbing shared by every derived entity.
pub(crate) struct SensorBase {
    identity: EntityIdentity,
    description: &'static EntityDescription,
    host: SharedHost,
    coordinator: Arc<Coordinator>,
    listener: Mutex<Option<ListenerHandle>>,
    stopped: Arc<AtomicBool>,
}

impl SensorBase {
    pub(crate) fn new(
        identity: EntityIdentity,
        description: &'static EntityDescription,
        host: SharedHost,
        coordinator: Arc<Coordinator>,
    ) -> Self {
        Self {
            identity,
            description,
            host,
            coordinator,
            listener: Mutex::new(None),
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    pub(crate) fn identity(&self) -> &EntityIdentity {
        &self.identity
    }

    pub(crate) fn host(&self) -> &SharedHost {
        &self.host
    }

    pub(crate) fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }

    /// Register `on_update` with the coordinator on behalf of `sensor`.
    ///
    /// The listener holds only a weak reference to the sensor and drops
    /// notifications once the sensor is stopped.
    pub(crate) fn listen<S, F>(&self, sensor: &Arc<S>, on_update: F) -> Result<()>
    where
        S: Send + Sync + 'static,
        F: Fn(&S, &CoordinatorSnapshot, RefreshReason) + Send + Sync + 'static,
    {
        let weak = Arc::downgrade(sensor);
        let stopped = self.stopped.clone();
        let listener: Listener = Arc::new(move |snapshot, reason| {
            if stopped.load(Ordering::Acquire) {
                return Ok(());
            }
            if let Some(sensor) = weak.upgrade() {
                on_update(&sensor, snapshot, reason);
            }
            Ok(())
        });

        let handle = self.coordinator.add_listener(listener)?;
        *self.listener.lock() = Some(handle);
        Ok(())
    }

    pub(crate) fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Mark stopped and drop the listener. Returns false if already stopped.
    pub(crate) fn stop(&self) -> bool {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return false;
        }
        let handle = self.listener.lock().take();
        drop(handle);
        true
    }

    pub(crate) fn state(
        &self,
        value: StateValue,
        available: bool,
        attributes: Attributes,
    ) -> SensorState {
        SensorState {
            entity_id: self.identity.entity_id.clone(),
            unique_id: self.identity.unique_id.clone(),
            name: self.identity.name.clone(),
            value,
            available,
            attributes,
            icon: self.description.icon.map(str::to_string),
            entity_category: self.description.entity_category,
        }
    }

    /// Publish unless stopped.
    pub(crate) fn publish(&self, state: SensorState) {
        if !self.is_stopped() {
            self.host.publish(state);
        }
    }
}

/// Serialize a fixed attribute schema into an attribute map.
pub(crate) fn to_attributes<T: Serialize>(schema: &T) -> Attributes {
    match serde_json::to_value(schema) {
        Ok(serde_json::Value::Object(map)) => map.into_iter().collect(),
        _ => Attributes::new(),
    }
}
