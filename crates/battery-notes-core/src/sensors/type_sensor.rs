use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use crate::coordinator::{Coordinator, CoordinatorSnapshot, RefreshReason};
use crate::error::Result;
use crate::host::{SensorState, SharedHost, StateValue};
use crate::naming::EntityIdentity;

use super::{DerivedSensor, SensorBase, TYPE_SENSOR, to_attributes};

#[derive(Serialize)]
struct TypeAttributes<'a> {
    battery_quantity: u32,
    battery_type: &'a str,
}

/// Exposes the battery type and quantity as one display string.
///
/// Until the coordinator has refreshed, the state persisted before the last
/// restart is shown instead.
pub struct TypeSensor {
    base: SensorBase,
    restored: Mutex<Option<SensorState>>,
}

impl TypeSensor {
    pub fn new(identity: EntityIdentity, host: SharedHost, coordinator: Arc<Coordinator>) -> Arc<Self> {
        Arc::new(Self {
            base: SensorBase::new(identity, &TYPE_SENSOR, host, coordinator),
            restored: Mutex::new(None),
        })
    }

    /// Register with the coordinator and publish the first state.
    pub fn start(self: &Arc<Self>) -> Result<()> {
        if self.base.coordinator().snapshot().is_none() {
            let restored = self.base.host().last_state(&self.base.identity().entity_id);
            if restored.is_some() {
                debug!("Restoring last state of {}", self.base.identity().entity_id);
            }
            *self.restored.lock() = restored;
        }

        self.base.listen(self, |sensor: &Self, snapshot, reason| {
            if reason != RefreshReason::Telemetry {
                sensor.base.publish(sensor.render_snapshot(snapshot));
            }
        })?;

        self.base.publish(self.render());
        Ok(())
    }

    fn render_snapshot(&self, snapshot: &CoordinatorSnapshot) -> SensorState {
        self.base.state(
            StateValue::Text(snapshot.battery_type_and_quantity.clone()),
            true,
            to_attributes(&TypeAttributes {
                battery_quantity: snapshot.battery_quantity,
                battery_type: &snapshot.battery_type,
            }),
        )
    }
}

impl DerivedSensor for TypeSensor {
    fn identity(&self) -> &EntityIdentity {
        self.base.identity()
    }

    fn render(&self) -> SensorState {
        if let Some(snapshot) = self.base.coordinator().snapshot() {
            return self.render_snapshot(&snapshot);
        }

        match self.restored.lock().as_ref() {
            Some(restored) => self.base.state(
                restored.value.clone(),
                true,
                restored.attributes.clone(),
            ),
            None => self.base.state(StateValue::Unknown, true, Default::default()),
        }
    }

    fn stop(&self) {
        self.base.stop();
    }

    fn is_stopped(&self) -> bool {
        self.base.is_stopped()
    }
}
