use std::sync::Arc;

use parking_lot::Mutex;
use time::{Date, OffsetDateTime};
use tracing::info;

use battery_notes_types::{Attributes, truncate_to_day};

use crate::coordinator::Coordinator;
use crate::error::Result;
use crate::host::{SensorState, SharedHost, StateValue};
use crate::naming::EntityIdentity;

use super::{DerivedSensor, REPLACED_BUTTON, SensorBase};

/// Button that records a battery replacement dated today (UTC).
pub struct ReplacedButton {
    base: SensorBase,
    last_pressed: Mutex<Option<OffsetDateTime>>,
}

impl ReplacedButton {
    pub fn new(identity: EntityIdentity, host: SharedHost, coordinator: Arc<Coordinator>) -> Arc<Self> {
        Arc::new(Self {
            base: SensorBase::new(identity, &REPLACED_BUTTON, host, coordinator),
            last_pressed: Mutex::new(None),
        })
    }

    pub fn start(&self) {
        let restored = self
            .base
            .host()
            .last_state(&self.base.identity().entity_id)
            .and_then(|state| state.value.as_timestamp());
        *self.last_pressed.lock() = restored;
        self.base.publish(self.render());
    }

    /// Record a replacement for today. Returns the recorded day.
    pub fn press(&self) -> Result<Date> {
        let now = OffsetDateTime::now_utc();
        let today = truncate_to_day(now);

        self.base.coordinator().record_replacement(today)?;
        info!("{} pressed", self.base.identity().entity_id);

        *self.last_pressed.lock() = Some(now);
        self.base.publish(self.render());
        Ok(today)
    }
}

impl DerivedSensor for ReplacedButton {
    fn identity(&self) -> &EntityIdentity {
        self.base.identity()
    }

    fn render(&self) -> SensorState {
        let value = match *self.last_pressed.lock() {
            Some(pressed) => StateValue::Timestamp(pressed),
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
