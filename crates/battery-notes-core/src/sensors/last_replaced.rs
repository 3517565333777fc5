use std::sync::Arc;

use parking_lot::Mutex;
use time::Date;

use battery_notes_types::{Attributes, day_start_utc};

use crate::coordinator::{Coordinator, RefreshReason};
use crate::error::Result;
use crate::host::{SensorState, SharedHost, StateValue};
use crate::naming::EntityIdentity;

use super::{DerivedSensor, LAST_REPLACED_SENSOR, SensorBase};

/// Exposes the day the batteries were last replaced, as midnight UTC.
///
/// Only metadata refreshes and replacements update it; telemetry does not.
pub struct LastReplacedSensor {
    base: SensorBase,
    last_replaced: Mutex<Option<Date>>,
}

impl LastReplacedSensor {
    /// Create the sensor, seeding it from the store.
    pub fn new(
        identity: EntityIdentity,
        host: SharedHost,
        coordinator: Arc<Coordinator>,
    ) -> Result<Arc<Self>> {
        let last_replaced = coordinator.stored_metadata()?.last_replaced;
        Ok(Arc::new(Self {
            base: SensorBase::new(identity, &LAST_REPLACED_SENSOR, host, coordinator),
            last_replaced: Mutex::new(last_replaced),
        }))
    }

    pub fn start(self: &Arc<Self>) -> Result<()> {
        self.base.listen(self, |sensor: &Self, snapshot, reason| match reason {
            RefreshReason::Refresh | RefreshReason::Replacement => {
                *sensor.last_replaced.lock() = snapshot.last_replaced;
                sensor.base.publish(sensor.render());
            }
            RefreshReason::Telemetry => {}
        })?;

        self.base.publish(self.render());
        Ok(())
    }

    /// The recorded replacement day.
    pub fn last_replaced(&self) -> Option<Date> {
        *self.last_replaced.lock()
    }
}

impl DerivedSensor for LastReplacedSensor {
    fn identity(&self) -> &EntityIdentity {
        self.base.identity()
    }

    fn render(&self) -> SensorState {
        let value = match self.last_replaced() {
            Some(date) => StateValue::Timestamp(day_start_utc(date)),
            None => StateValue::Unknown,
        };
        self.base.state(value, true, Attributes::new())
    }

    fn stop(&self) {
        self.base.stop();
    }

    fn is_stopped(&self) -> bool {
        self.base.is_stopped()
    }
}
