//! In-memory host for testing.
//!
//! [`MockHost`] implements every host contract ([`StateSource`],
//! [`EntityRegistry`], [`DeviceRegistry`], [`StateSink`]) so the engine can
//! be driven without a real home-automation platform.
//!
//! State changes are delivered to subscribers synchronously, after the
//! internal lock is released, so callbacks may call back into the host.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use battery_notes_core::{MockHost, SharedHost, StateSource};
//!
//! let mock = Arc::new(MockHost::new());
//! mock.set_value("sensor.remote_battery", "87");
//!
//! let host: SharedHost = mock.clone();
//! assert_eq!(
//!     host.get_state("sensor.remote_battery").and_then(|s| s.numeric_value()),
//!     Some(87.0)
//! );
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use battery_notes_types::TelemetryState;

use crate::error::{Error, Result};
use crate::host::{
    DeviceEntry, DeviceRegistry, DeviceUpdate, EntityRegistry, EntityUpdate, RegistryEntry,
    RegistryEvent, SensorState, StateCallback, StateSink, StateSource, SubscriptionId,
};

#[derive(Default)]
struct Inner {
    states: HashMap<String, TelemetryState>,
    subscriptions: BTreeMap<SubscriptionId, (String, StateCallback)>,
    entities: BTreeMap<String, RegistryEntry>,
    devices: BTreeMap<String, DeviceEntry>,
    published: Vec<SensorState>,
    latest: HashMap<String, SensorState>,
    restored: HashMap<String, SensorState>,
    read_only: HashSet<String>,
}

/// A mock host for testing.
#[derive(Default)]
pub struct MockHost {
    inner: Mutex<Inner>,
    next_subscription: AtomicU64,
}

impl std::fmt::Debug for MockHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("MockHost")
            .field("states", &inner.states.len())
            .field("subscriptions", &inner.subscriptions.len())
            .field("entities", &inner.entities.len())
            .field("devices", &inner.devices.len())
            .field("published", &inner.published.len())
            .finish()
    }
}

impl MockHost {
    /// Create an empty host.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a device to the registry.
    #[must_use]
    pub fn with_device(self, device: DeviceEntry) -> Self {
        self.inner.lock().devices.insert(device.id.clone(), device);
        self
    }

    /// Add an entity to the registry.
    #[must_use]
    pub fn with_entity(self, entity: RegistryEntry) -> Self {
        self.inner
            .lock()
            .entities
            .insert(entity.entity_id.clone(), entity);
        self
    }

    /// Make registry updates of an entity fail.
    #[must_use]
    pub fn with_read_only_entity(self, entity_id: &str) -> Self {
        self.inner.lock().read_only.insert(entity_id.to_string());
        self
    }

    /// Seed an entity's state without notifying anyone.
    #[must_use]
    pub fn with_state(self, entity_id: &str, state: TelemetryState) -> Self {
        self.inner.lock().states.insert(entity_id.to_string(), state);
        self
    }

    /// Set a restore-cache entry, as if persisted before a restart.
    pub fn set_restored(&self, state: SensorState) {
        self.inner
            .lock()
            .restored
            .insert(state.entity_id.clone(), state);
    }

    /// Set an entity's state and notify its subscribers.
    pub fn set_state(&self, entity_id: &str, state: TelemetryState) {
        let callbacks = {
            let mut inner = self.inner.lock();
            inner.states.insert(entity_id.to_string(), state.clone());
            Self::callbacks_for(&inner, entity_id)
        };
        for callback in callbacks {
            callback(Some(&state));
        }
    }

    /// Set an entity's state to a bare value.
    pub fn set_value(&self, entity_id: &str, value: &str) {
        self.set_state(entity_id, TelemetryState::new(value));
    }

    /// Remove an entity's state and notify its subscribers with `None`.
    pub fn clear_state(&self, entity_id: &str) {
        let callbacks = {
            let mut inner = self.inner.lock();
            inner.states.remove(entity_id);
            Self::callbacks_for(&inner, entity_id)
        };
        for callback in callbacks {
            callback(None);
        }
    }

    /// Rename an entity in the registry, carrying its state along.
    ///
    /// Subscribers of the old id are not moved; consumers react to the
    /// returned event instead.
    pub fn rename_entity(&self, old_entity_id: &str, new_entity_id: &str) -> RegistryEvent {
        let mut inner = self.inner.lock();
        if let Some(mut entity) = inner.entities.remove(old_entity_id) {
            entity.entity_id = new_entity_id.to_string();
            inner.entities.insert(new_entity_id.to_string(), entity);
        }
        if let Some(state) = inner.states.remove(old_entity_id) {
            inner.states.insert(new_entity_id.to_string(), state);
        }
        RegistryEvent::renamed(old_entity_id, new_entity_id)
    }

    /// Remove an entity and its state. Subscribers receive `None`.
    pub fn remove_entity(&self, entity_id: &str) -> RegistryEvent {
        let callbacks = {
            let mut inner = self.inner.lock();
            inner.entities.remove(entity_id);
            inner.states.remove(entity_id);
            Self::callbacks_for(&inner, entity_id)
        };
        for callback in callbacks {
            callback(None);
        }
        RegistryEvent::removed(entity_id)
    }

    /// Move an entity to another device (or to none).
    pub fn move_entity(&self, entity_id: &str, device_id: Option<&str>) -> RegistryEvent {
        let mut inner = self.inner.lock();
        if inner.read_only.contains(entity_id) {
            return Err(Error::RegistryUpdateRejected(entity_id.to_string()));
        }
        let entity = inner
            .entities
            .entry(entity_id.to_string())
            .or_insert_with(|| RegistryEntry::new(entity_id));
        entity.device_id = device_id.map(str::to_string);
        RegistryEvent::updated(entity_id, ["device_id"])
    }

    /// Number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.inner.lock().subscriptions.len()
    }

    /// Number of live subscriptions for one entity.
    pub fn subscription_count_for(&self, entity_id: &str) -> usize {
        self.inner
            .lock()
            .subscriptions
            .values()
            .filter(|(id, _)| id == entity_id)
            .count()
    }

    /// Every state published so far, in order.
    pub fn published(&self) -> Vec<SensorState> {
        self.inner.lock().published.clone()
    }

    /// Number of states published for one entity.
    pub fn publish_count(&self, entity_id: &str) -> usize {
        self.inner
            .lock()
            .published
            .iter()
            .filter(|state| state.entity_id == entity_id)
            .count()
    }

    /// The last state published for an entity.
    pub fn latest(&self, entity_id: &str) -> Option<SensorState> {
        self.inner.lock().latest.get(entity_id).cloned()
    }

    /// Current registry record of an entity.
    pub fn entity(&self, entity_id: &str) -> Option<RegistryEntry> {
        self.inner.lock().entities.get(entity_id).cloned()
    }

    /// Current registry record of a device.
    pub fn device(&self, device_id: &str) -> Option<DeviceEntry> {
        self.inner.lock().devices.get(device_id).cloned()
    }

    fn callbacks_for(inner: &Inner, entity_id: &str) -> Vec<StateCallback> {
        inner
            .subscriptions
            .values()
            .filter(|(id, _)| id == entity_id)
            .map(|(_, callback)| callback.clone())
            .collect()
    }
}

impl StateSource for MockHost {
    fn get_state(&self, entity_id: &str) -> Option<TelemetryState> {
        self.inner.lock().states.get(entity_id).cloned()
    }

    fn subscribe(&self, entity_id: &str, callback: StateCallback) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.inner
            .lock()
            .subscriptions
            .insert(id, (entity_id.to_string(), callback));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.inner.lock().subscriptions.remove(&id);
    }
}

impl EntityRegistry for MockHost {
    fn get_entity(&self, entity_id: &str) -> Option<RegistryEntry> {
        self.entity(entity_id)
    }

    fn update_entity(&self, entity_id: &str, update: EntityUpdate) -> Result<RegistryEntry> {
        let mut inner = self.inner.lock();
        if inner.read_only.contains(entity_id) {
            return Err(Error::RegistryUpdateRejected(entity_id.to_string()));
        }
        let entity = inner
            .entities
            .get_mut(entity_id)
            .ok_or_else(|| Error::entity_not_found(entity_id))?;

        if let Some(hidden_by) = update.hidden_by {
            entity.hidden_by = hidden_by;
        }
        if let Some(name) = update.name {
            entity.name = name;
        }
        Ok(entity.clone())
    }
}

impl DeviceRegistry for MockHost {
    fn get_device(&self, device_id: &str) -> Option<DeviceEntry> {
        self.device(device_id)
    }

    fn update_device(&self, device_id: &str, update: DeviceUpdate) -> Result<DeviceEntry> {
        let mut inner = self.inner.lock();
        let device = inner
            .devices
            .get_mut(device_id)
            .ok_or_else(|| Error::device_not_found(device_id))?;

        if let Some(entry_id) = update.add_config_entry_id {
            device.config_entries.insert(entry_id);
        }
        if let Some(entry_id) = update.remove_config_entry_id {
            device.config_entries.remove(&entry_id);
        }
        Ok(device.clone())
    }
}

impl StateSink for MockHost {
    fn publish(&self, state: SensorState) {
        let mut inner = self.inner.lock();
        inner
            .entities
            .entry(state.entity_id.clone())
            .or_insert_with(|| {
                RegistryEntry::new(&state.entity_id).with_unique_id(&state.unique_id)
            });
        inner.latest.insert(state.entity_id.clone(), state.clone());
        inner.published.push(state);
    }

    fn last_state(&self, entity_id: &str) -> Option<SensorState> {
        self.inner.lock().restored.get(entity_id).cloned()
    }
}
