//! Upstream identity reconciliation.
//!
//! One reconciler per configuration entry watches registry events for the
//! upstream entity and decides what the entry must do:
//!
//! | Event | Condition | Action |
//! |-------|-----------|--------|
//! | `remove` | | tear the entry down |
//! | `update` | `entity_id` changed | reload against the new id |
//! | `update` | `device_id` changed, entity now on another device | detach entry from its device |
//! | anything else | | nothing |
//!
//! A rename takes precedence over a device move in the same event. After a
//! teardown or reload decision the reconciler is retired: the entry it
//! belonged to is gone and a fresh one takes over.

use tracing::{debug, info};

use crate::host::{Host, RegistryAction, RegistryEvent};

/// Whether the reconciler is tracking an upstream entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingState {
    Unbound,
    Bound(String),
}

/// What the owning entry must do in response to an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileAction {
    None,
    /// Tear the entry down and forget its metadata.
    RemoveEntry,
    /// Recreate the entry against a renamed upstream entity.
    ReloadEntry { upstream_entity_id: String },
    /// Remove the entry from the device it was attached to.
    DetachFromDevice { device_id: String },
}

/// Reacts to registry lifecycle events for one entry's upstream entity.
#[derive(Debug, Clone)]
pub struct IdentityReconciler {
    entry_id: String,
    device_id: String,
    state: BindingState,
}

impl IdentityReconciler {
    /// Create a reconciler; bound if the entry has an upstream entity.
    pub fn new(
        entry_id: impl Into<String>,
        device_id: impl Into<String>,
        upstream_entity_id: Option<String>,
    ) -> Self {
        Self {
            entry_id: entry_id.into(),
            device_id: device_id.into(),
            state: match upstream_entity_id {
                Some(id) => BindingState::Bound(id),
                None => BindingState::Unbound,
            },
        }
    }

    pub fn state(&self) -> &BindingState {
        &self.state
    }

    /// Returns true if the event concerns the bound upstream entity.
    pub fn tracks(&self, event: &RegistryEvent) -> bool {
        match &self.state {
            BindingState::Bound(upstream) => {
                event.entity_id == *upstream
                    || event.old_entity_id.as_deref() == Some(upstream.as_str())
            }
            BindingState::Unbound => false,
        }
    }

    /// Decide how to react to a registry event.
    pub fn handle(&mut self, host: &dyn Host, event: &RegistryEvent) -> ReconcileAction {
        if !self.tracks(event) {
            return ReconcileAction::None;
        }

        match event.action {
            RegistryAction::Add => ReconcileAction::None,
            RegistryAction::Remove => {
                info!(
                    "Upstream {} removed, tearing down entry {}",
                    event.entity_id, self.entry_id
                );
                self.state = BindingState::Unbound;
                ReconcileAction::RemoveEntry
            }
            RegistryAction::Update if event.changed("entity_id") => {
                info!(
                    "Upstream renamed to {}, reloading entry {}",
                    event.entity_id, self.entry_id
                );
                self.state = BindingState::Unbound;
                ReconcileAction::ReloadEntry {
                    upstream_entity_id: event.entity_id.clone(),
                }
            }
            RegistryAction::Update if event.changed("device_id") => self.device_moved(host, event),
            RegistryAction::Update => ReconcileAction::None,
        }
    }

    fn device_moved(&self, host: &dyn Host, event: &RegistryEvent) -> ReconcileAction {
        let Some(entity) = host.get_entity(&event.entity_id) else {
            debug!("{} vanished before its device move was handled", event.entity_id);
            return ReconcileAction::None;
        };
        let Some(device) = host.get_device(&self.device_id) else {
            debug!("Device {} of entry {} is gone", self.device_id, self.entry_id);
            return ReconcileAction::None;
        };

        if entity.device_id.as_deref() == Some(device.id.as_str()) {
            return ReconcileAction::None;
        }

        info!(
            "{} moved off device {}, detaching entry {}",
            event.entity_id, device.id, self.entry_id
        );
        ReconcileAction::DetachFromDevice {
            device_id: device.id,
        }
    }
}
