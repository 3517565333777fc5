use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, info, warn};

use battery_notes_types::{Attributes, TelemetryState, day_start_utc};

use crate::config::Options;
use crate::coordinator::{Coordinator, CoordinatorSnapshot, RefreshReason};
use crate::error::Result;
use crate::host::{EntityUpdate, HiddenBy, SensorState, SharedHost, StateCallback, StateValue};
use crate::mirror::{MirrorState, TelemetryMirror};
use crate::naming::EntityIdentity;
use crate::subscription::Subscription;

use super::{BATTERY_PLUS, DerivedSensor, SensorBase, to_attributes};

/// Coordinator-owned attributes. These win over upstream passthrough keys.
#[derive(Serialize)]
struct BatteryPlusAttributes<'a> {
    battery_quantity: u32,
    battery_type: &'a str,
    battery_type_and_quantity: &'a str,
    battery_low: bool,
    battery_low_threshold: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    battery_last_replaced: Option<String>,
}

/// Mirrors the upstream battery level, annotated with battery metadata.
pub struct BatteryPlusSensor {
    base: SensorBase,
    options: Options,
    upstream_entity_id: String,
    mirror: Mutex<TelemetryMirror>,
    upstream_name: Mutex<Option<String>>,
}

impl BatteryPlusSensor {
    pub fn new(
        identity: EntityIdentity,
        host: SharedHost,
        coordinator: Arc<Coordinator>,
        options: Options,
        upstream_entity_id: impl Into<String>,
    ) -> Arc<Self> {
        let mirror = TelemetryMirror::new(host.clone(), options.precision());
        Arc::new(Self {
            base: SensorBase::new(identity, &BATTERY_PLUS, host, coordinator),
            options,
            upstream_entity_id: upstream_entity_id.into(),
            mirror: Mutex::new(mirror),
            upstream_name: Mutex::new(None),
        })
    }

    /// Sync upstream visibility, register with the coordinator and attach the mirror.
    pub fn start(self: &Arc<Self>) -> Result<()> {
        self.sync_upstream_entity()?;

        self.base.listen(self, |sensor: &Self, _snapshot, reason| {
            // Telemetry fan-outs come from our own readings; we publish after those.
            if reason != RefreshReason::Telemetry {
                sensor.base.publish(sensor.render());
            }
        })?;

        let weak = Arc::downgrade(self);
        let callback: StateCallback = Arc::new(move |state| {
            if let Some(sensor) = weak.upgrade() {
                sensor.on_upstream_changed(state);
            }
        });

        let subscription =
            Subscription::subscribe(self.base.host(), &self.upstream_entity_id, callback);
        let reading = self.mirror.lock().attach_subscribed(subscription);
        self.base.coordinator().observe_reading(reading);
        self.base.publish(self.render());
        Ok(())
    }

    /// The upstream entity being mirrored.
    pub fn upstream_entity_id(&self) -> &str {
        &self.upstream_entity_id
    }

    /// Snapshot of the mirror state.
    pub fn mirror_state(&self) -> MirrorState {
        self.mirror.lock().state().clone()
    }

    fn on_upstream_changed(&self, state: Option<&TelemetryState>) {
        if self.base.is_stopped() {
            return;
        }

        let reading = self.mirror.lock().apply(state);
        self.base.coordinator().observe_reading(reading);
        self.base.publish(self.render());
    }

    /// One-time hide or un-hide of the upstream entity, and name copy.
    fn sync_upstream_entity(&self) -> Result<()> {
        let host = self.base.host();
        let Some(upstream) = host.get_entity(&self.upstream_entity_id) else {
            warn!(
                "Upstream entity {} is not in the registry",
                self.upstream_entity_id
            );
            return Ok(());
        };

        if self.options.hide_battery {
            if !upstream.is_hidden() {
                host.update_entity(
                    &self.upstream_entity_id,
                    EntityUpdate::hide(HiddenBy::Integration),
                )?;
                info!("Hid upstream entity {}", self.upstream_entity_id);
            }
        } else if upstream.hidden_by == Some(HiddenBy::Integration) {
            host.update_entity(&self.upstream_entity_id, EntityUpdate::unhide())?;
            info!("Un-hid upstream entity {}", self.upstream_entity_id);
        }

        if let Some(name) = upstream.name {
            debug!("Copying user name {:?} from {}", name, self.upstream_entity_id);
            *self.upstream_name.lock() = Some(name);
        }
        Ok(())
    }

    fn attributes(&self, mirror: &MirrorState, snapshot: Option<&CoordinatorSnapshot>) -> Attributes {
        let mut attributes = mirror.passthrough_attributes.clone();

        if let Some(snapshot) = snapshot {
            let battery_last_replaced = if self.options.enable_replaced {
                snapshot
                    .last_replaced
                    .and_then(|date| day_start_utc(date).format(&Rfc3339).ok())
            } else {
                None
            };

            attributes.extend(to_attributes(&BatteryPlusAttributes {
                battery_quantity: snapshot.battery_quantity,
                battery_type: &snapshot.battery_type,
                battery_type_and_quantity: &snapshot.battery_type_and_quantity,
                battery_low: snapshot.battery_low,
                battery_low_threshold: snapshot.battery_low_threshold,
                battery_last_replaced,
            }));
        }
        attributes
    }
}

impl DerivedSensor for BatteryPlusSensor {
    fn identity(&self) -> &EntityIdentity {
        self.base.identity()
    }

    fn render(&self) -> SensorState {
        let mirror = self.mirror_state();
        let snapshot = self.base.coordinator().snapshot();

        let value = match mirror.normalized_value {
            Some(level) => StateValue::Number(level),
            None => StateValue::Unknown,
        };
        let attributes = self.attributes(&mirror, snapshot.as_ref());

        let mut state = self.base.state(value, mirror.available, attributes);
        if let Some(name) = self.upstream_name.lock().as_ref() {
            state.name = format!("{}+", name);
        }
        state
    }

    fn stop(&self) {
        self.base.stop();
        self.mirror.lock().detach();
    }

    fn is_stopped(&self) -> bool {
        self.base.is_stopped()
    }
}
