//! Per-entry runtime.
//!
//! A configuration entry ties one device to its battery metadata and,
//! optionally, to an upstream battery entity. [`BatteryNotesEntry::setup`]
//! wires the coordinator, the derived entities and the reconciler; dropping
//! the entry releases all of it.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::Date;
use tracing::{info, warn};

use battery_notes_types::{DeviceMetadata, MetadataUpdate};

use crate::config::Options;
use crate::coordinator::{Coordinator, CoordinatorSnapshot, SharedStore};
use crate::error::{Error, Result};
use crate::events::EventDispatcher;
use crate::host::{DeviceUpdate, RegistryEvent, SharedHost};
use crate::naming::resolve_identity;
use crate::reconciler::{BindingState, IdentityReconciler, ReconcileAction};
use crate::sensors::{
    BATTERY_LOW, BATTERY_PLUS, BatteryLowSensor, BatteryPlusSensor, DerivedSensor, EntityDescription,
    LAST_REPLACED_SENSOR, LastReplacedSensor, REPLACED_BUTTON, ReplacedButton, TYPE_SENSOR,
    TypeSensor,
};

/// Configuration of one entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryConfig {
    pub entry_id: String,
    pub device_id: String,
    /// Upstream battery entity to mirror, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_entity_id: Option<String>,
    #[serde(default)]
    pub battery_type: String,
    #[serde(default)]
    pub battery_quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_low_threshold: Option<u8>,
}

impl EntryConfig {
    pub fn new(entry_id: impl Into<String>, device_id: impl Into<String>) -> Self {
        Self {
            entry_id: entry_id.into(),
            device_id: device_id.into(),
            source_entity_id: None,
            battery_type: String::new(),
            battery_quantity: 0,
            battery_low_threshold: None,
        }
    }

    #[must_use]
    pub fn with_source(mut self, entity_id: impl Into<String>) -> Self {
        self.source_entity_id = Some(entity_id.into());
        self
    }

    #[must_use]
    pub fn with_battery(mut self, battery_type: impl Into<String>, quantity: u32) -> Self {
        self.battery_type = battery_type.into();
        self.battery_quantity = quantity;
        self
    }

    #[must_use]
    pub fn with_low_threshold(mut self, threshold: u8) -> Self {
        self.battery_low_threshold = Some(threshold);
        self
    }

    /// The metadata this entry asserts. The replacement date is left alone.
    pub fn metadata_update(&self) -> MetadataUpdate {
        MetadataUpdate::new()
            .battery_type(self.battery_type.clone())
            .battery_quantity(self.battery_quantity)
            .battery_low_threshold(self.battery_low_threshold)
    }
}

/// Stops every collected entity on drop unless disarmed.
struct StartedEntities {
    entities: Vec<Arc<dyn DerivedSensor>>,
    armed: bool,
}

impl StartedEntities {
    fn push(&mut self, entity: Arc<dyn DerivedSensor>) {
        self.entities.push(entity);
    }

    fn disarm(mut self) -> Vec<Arc<dyn DerivedSensor>> {
        self.armed = false;
        std::mem::take(&mut self.entities)
    }
}

impl Drop for StartedEntities {
    fn drop(&mut self) {
        if self.armed {
            for entity in &self.entities {
                entity.stop();
            }
        }
    }
}

/// Undoes the registry link and store write of a setup that did not finish.
struct SetupRollback {
    host: SharedHost,
    store: SharedStore,
    entry_id: String,
    device_id: String,
    linked: bool,
    /// Record before setup wrote to the store; `None` until it did.
    previous: Option<Option<DeviceMetadata>>,
    armed: bool,
}

impl SetupRollback {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for SetupRollback {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        if self.linked
            && let Err(e) = self.host.update_device(
                &self.device_id,
                DeviceUpdate::remove_config_entry(&self.entry_id),
            )
        {
            warn!(
                "Failed to detach entry {} from device {}: {}",
                self.entry_id, self.device_id, e
            );
        }

        let result = match self.previous.take() {
            None => return,
            Some(None) => self.store.lock().delete_device(&self.device_id).map(|_| ()),
            Some(Some(previous)) => {
                let restore = MetadataUpdate::new()
                    .battery_type(previous.battery_type)
                    .battery_quantity(previous.battery_quantity)
                    .battery_low_threshold(previous.battery_low_threshold);
                self.store
                    .lock()
                    .update_device(&self.device_id, &restore)
                    .map(|_| ())
            }
        };
        if let Err(e) = result {
            warn!(
                "Failed to restore metadata of device {} after failed setup: {}",
                self.device_id, e
            );
        }
    }
}

/// A running configuration entry.
pub struct BatteryNotesEntry {
    config: EntryConfig,
    host: SharedHost,
    coordinator: Arc<Coordinator>,
    type_sensor: Arc<TypeSensor>,
    last_replaced: Option<Arc<LastReplacedSensor>>,
    battery_plus: Option<Arc<BatteryPlusSensor>>,
    battery_low: Option<Arc<BatteryLowSensor>>,
    button: Arc<ReplacedButton>,
    entities: Vec<Arc<dyn DerivedSensor>>,
    reconciler: IdentityReconciler,
    unloaded: bool,
}

impl BatteryNotesEntry {
    /// Set up an entry.
    ///
    /// A failure aborts only this entry; everything acquired so far is
    /// released before the error is returned.
    pub fn setup(
        config: EntryConfig,
        host: SharedHost,
        store: SharedStore,
        options: &Options,
        events: EventDispatcher,
    ) -> Result<Self> {
        options.validate()?;
        if config.entry_id.is_empty() {
            return Err(Error::invalid_config("entry_id must not be empty"));
        }

        let device = host.get_device(&config.device_id);
        let device_name = device
            .as_ref()
            .and_then(|device| device.display_name())
            .map(str::to_string);

        let identify = |description: &EntityDescription| {
            resolve_identity(&*host, &config.entry_id, device_name.as_deref(), description)
        };
        let type_identity = identify(&TYPE_SENSOR)?;
        let last_replaced_identity = if options.enable_replaced {
            Some(identify(&LAST_REPLACED_SENSOR)?)
        } else {
            None
        };
        let upstream_identities = match &config.source_entity_id {
            Some(_) => Some((identify(&BATTERY_PLUS)?, identify(&BATTERY_LOW)?)),
            None => None,
        };
        let button_identity = identify(&REPLACED_BUTTON)?;

        let mut rollback = SetupRollback {
            host: host.clone(),
            store: store.clone(),
            entry_id: config.entry_id.clone(),
            device_id: config.device_id.clone(),
            linked: false,
            previous: None,
            armed: true,
        };

        if device.is_some() {
            host.update_device(
                &config.device_id,
                DeviceUpdate::add_config_entry(&config.entry_id),
            )?;
            rollback.linked = true;
        } else {
            warn!(
                "Device {} for entry {} is not in the registry",
                config.device_id, config.entry_id
            );
        }

        {
            let store = store.lock();
            let previous = store.get_device(&config.device_id)?;
            store.update_device(&config.device_id, &config.metadata_update())?;
            rollback.previous = Some(previous);
        }

        let coordinator = Coordinator::new(
            config.device_id.clone(),
            store,
            options.clone(),
            events,
        );
        let mut started = StartedEntities {
            entities: Vec::new(),
            armed: true,
        };

        let type_sensor = TypeSensor::new(type_identity, host.clone(), coordinator.clone());
        started.push(type_sensor.clone());
        type_sensor.start()?;

        let last_replaced = match last_replaced_identity {
            Some(identity) => {
                let sensor = LastReplacedSensor::new(identity, host.clone(), coordinator.clone())?;
                started.push(sensor.clone());
                sensor.start()?;
                Some(sensor)
            }
            None => None,
        };

        let (battery_plus, battery_low) = match (upstream_identities, &config.source_entity_id) {
            (Some((plus_identity, low_identity)), Some(source)) => {
                let plus = BatteryPlusSensor::new(
                    plus_identity,
                    host.clone(),
                    coordinator.clone(),
                    options.clone(),
                    source.clone(),
                );
                started.push(plus.clone());
                plus.start()?;

                let low = BatteryLowSensor::new(low_identity, host.clone(), coordinator.clone());
                started.push(low.clone());
                low.start()?;
                (Some(plus), Some(low))
            }
            _ => (None, None),
        };

        let button = ReplacedButton::new(button_identity, host.clone(), coordinator.clone());
        started.push(button.clone());
        button.start();

        coordinator.refresh()?;

        let reconciler = IdentityReconciler::new(
            config.entry_id.clone(),
            config.device_id.clone(),
            config.source_entity_id.clone(),
        );

        info!(
            "Set up entry {} for device {} ({} entities)",
            config.entry_id,
            config.device_id,
            started.entities.len()
        );

        rollback.disarm();
        Ok(Self {
            entities: started.disarm(),
            config,
            host,
            coordinator,
            type_sensor,
            last_replaced,
            battery_plus,
            battery_low,
            button,
            reconciler,
            unloaded: false,
        })
    }

    pub fn entry_id(&self) -> &str {
        &self.config.entry_id
    }

    pub fn device_id(&self) -> &str {
        &self.config.device_id
    }

    pub fn config(&self) -> &EntryConfig {
        &self.config
    }

    pub fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }

    pub fn type_sensor(&self) -> &Arc<TypeSensor> {
        &self.type_sensor
    }

    pub fn last_replaced_sensor(&self) -> Option<&Arc<LastReplacedSensor>> {
        self.last_replaced.as_ref()
    }

    pub fn battery_plus_sensor(&self) -> Option<&Arc<BatteryPlusSensor>> {
        self.battery_plus.as_ref()
    }

    pub fn battery_low_sensor(&self) -> Option<&Arc<BatteryLowSensor>> {
        self.battery_low.as_ref()
    }

    pub fn replaced_button(&self) -> &Arc<ReplacedButton> {
        &self.button
    }

    /// Every running entity, in setup order.
    pub fn entities(&self) -> &[Arc<dyn DerivedSensor>] {
        &self.entities
    }

    pub fn binding(&self) -> &BindingState {
        self.reconciler.state()
    }

    /// Returns true if a registry event concerns this entry's upstream entity.
    pub fn tracks(&self, event: &RegistryEvent) -> bool {
        self.reconciler.tracks(event)
    }

    /// Feed a registry event to the reconciler.
    ///
    /// A device detach is carried out here. Teardown and reload are returned
    /// for the owner of the entry to perform.
    pub fn handle_registry_event(&mut self, event: &RegistryEvent) -> Result<ReconcileAction> {
        let action = self.reconciler.handle(&*self.host, event);

        if let ReconcileAction::DetachFromDevice { device_id } = &action {
            self.host.update_device(
                device_id,
                DeviceUpdate::remove_config_entry(&self.config.entry_id),
            )?;
        }
        Ok(action)
    }

    /// Record a battery replacement for this entry's device.
    pub fn record_replacement(&self, date: Date) -> Result<CoordinatorSnapshot> {
        self.coordinator.record_replacement(date)
    }

    /// Stop every entity. Safe to call more than once.
    pub fn unload(&mut self) {
        if self.unloaded {
            return;
        }
        self.unloaded = true;

        for entity in &self.entities {
            entity.stop();
        }
        info!("Unloaded entry {}", self.config.entry_id);
    }

    pub fn is_unloaded(&self) -> bool {
        self.unloaded
    }
}

impl Drop for BatteryNotesEntry {
    fn drop(&mut self) {
        self.unload();
    }
}

impl std::fmt::Debug for BatteryNotesEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatteryNotesEntry")
            .field("config", &self.config)
            .field("binding", self.reconciler.state())
            .field("unloaded", &self.unloaded)
            .finish_non_exhaustive()
    }
}
