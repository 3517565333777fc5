//! Upstream telemetry mirror.
//!
//! Tracks exactly one upstream entity at a time and normalizes its value.
//! Missing, sentinel and non-numeric values all collapse to "unavailable".

use tracing::debug;

use battery_notes_types::{Attributes, Precision, TelemetryState};

use crate::coordinator::TelemetryReading;
use crate::host::{SharedHost, StateCallback};
use crate::subscription::Subscription;

/// Attributes the mirror renders itself and never copies from upstream.
pub const MIRROR_OWNED_ATTRIBUTES: &[&str] = &[
    "unit_of_measurement",
    "device_class",
    "state_class",
    "friendly_name",
];

/// Current view of the upstream entity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MirrorState {
    pub upstream_entity_id: Option<String>,
    pub raw_value: Option<f64>,
    pub available: bool,
    pub normalized_value: Option<f64>,
    pub passthrough_attributes: Attributes,
    /// Low flag reported by a binary (`on`/`off`) upstream.
    pub low_flag: Option<bool>,
}

/// Mirrors one upstream telemetry entity.
pub struct TelemetryMirror {
    host: SharedHost,
    precision: Precision,
    subscription: Option<Subscription>,
    state: MirrorState,
}

impl TelemetryMirror {
    /// Create a detached mirror.
    pub fn new(host: SharedHost, precision: Precision) -> Self {
        Self {
            host,
            precision,
            subscription: None,
            state: MirrorState::default(),
        }
    }

    /// Point the mirror at `upstream_entity_id`.
    ///
    /// Any prior subscription is released first. The new subscription is
    /// taken before the initial read, so no change can fall between the two.
    pub fn attach(&mut self, upstream_entity_id: &str, callback: StateCallback) -> TelemetryReading {
        let subscription = Subscription::subscribe(&self.host, upstream_entity_id, callback);
        self.attach_subscribed(subscription)
    }

    /// Point the mirror at the entity `subscription` watches.
    ///
    /// Lets callers subscribe without holding a lock on the mirror, for hosts
    /// that deliver the current state from inside `subscribe`.
    pub fn attach_subscribed(&mut self, subscription: Subscription) -> TelemetryReading {
        self.detach();
        let upstream_entity_id = subscription.entity_id().to_string();
        self.state = MirrorState {
            upstream_entity_id: Some(upstream_entity_id.clone()),
            ..MirrorState::default()
        };

        self.subscription = Some(subscription);
        let current = self.host.get_state(&upstream_entity_id);
        self.apply(current.as_ref())
    }

    /// Apply an upstream state change.
    pub fn apply(&mut self, new_state: Option<&TelemetryState>) -> TelemetryReading {
        let upstream = self.state.upstream_entity_id.as_deref().unwrap_or("<detached>");

        let Some(new_state) = new_state else {
            debug!("{} has no state", upstream);
            self.mark_unavailable(None);
            return self.reading();
        };

        match new_state.numeric_value() {
            Some(raw) => {
                self.state.raw_value = Some(raw);
                self.state.normalized_value = Some(self.precision.round(raw));
                self.state.available = true;
                self.state.low_flag = None;
                self.state.passthrough_attributes = new_state
                    .attributes
                    .iter()
                    .filter(|(key, _)| !MIRROR_OWNED_ATTRIBUTES.contains(&key.as_str()))
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect();
            }
            None => {
                if !new_state.is_absent() && new_state.binary_value().is_none() {
                    debug!(
                        "Ignoring non-numeric state {:?} from {}",
                        new_state.value, upstream
                    );
                }
                self.mark_unavailable(new_state.binary_value());
            }
        }

        self.reading()
    }

    /// Release the subscription. Safe to call when already detached.
    pub fn detach(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.release();
        }
    }

    /// Returns true while subscribed to an upstream entity.
    pub fn is_attached(&self) -> bool {
        self.subscription
            .as_ref()
            .is_some_and(Subscription::is_active)
    }

    /// Current mirror state.
    pub fn state(&self) -> &MirrorState {
        &self.state
    }

    /// The reading to hand to the coordinator.
    pub fn reading(&self) -> TelemetryReading {
        TelemetryReading {
            level: self.state.normalized_value,
            low: self.state.low_flag,
        }
    }

    fn mark_unavailable(&mut self, low_flag: Option<bool>) {
        self.state.raw_value = None;
        self.state.normalized_value = None;
        self.state.available = false;
        self.state.low_flag = low_flag;
        self.state.passthrough_attributes.clear();
    }
}

impl std::fmt::Debug for TelemetryMirror {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryMirror")
            .field("precision", &self.precision)
            .field("subscription", &self.subscription)
            .field("state", &self.state)
            .finish()
    }
}

impl Drop for TelemetryMirror {
    fn drop(&mut self) {
        self.detach();
    }
}
