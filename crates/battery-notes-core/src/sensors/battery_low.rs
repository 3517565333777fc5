use std::sync::Arc;

use battery_notes_types::Attributes;

use crate::coordinator::Coordinator;
use crate::error::Result;
use crate::host::{SensorState, SharedHost, StateValue};
use crate::naming::EntityIdentity;

use super::{BATTERY_LOW, DerivedSensor, SensorBase};

/// Binary sensor that is on while the battery is low.
pub struct BatteryLowSensor {
    base: SensorBase,
}

impl BatteryLowSensor {
    pub fn new(identity: EntityIdentity, host: SharedHost, coordinator: Arc<Coordinator>) -> Arc<Self> {
        Arc::new(Self {
            base: SensorBase::new(identity, &BATTERY_LOW, host, coordinator),
        })
    }

    pub fn start(self: &Arc<Self>) -> Result<()> {
        self.base.listen(self, |sensor: &Self, _snapshot, _reason| {
            sensor.base.publish(sensor.render());
        })?;
        self.base.publish(self.render());
        Ok(())
    }
}

impl DerivedSensor for BatteryLowSensor {
    fn identity(&self) -> &EntityIdentity {
        self.base.identity()
    }

    fn render(&self) -> SensorState {
        match self.base.coordinator().snapshot() {
            Some(snapshot) => self.base.state(
                StateValue::Bool(snapshot.battery_low),
                true,
                Attributes::new(),
            ),
            None => self.base.state(StateValue::Unknown, true, Attributes::new()),
        }
    }

    fn stop(&self) {
        self.base.stop();
    }

    fn is_stopped(&self) -> bool {
        self.base.is_stopped()
    }
}
