//! Domain events.
//!
//! Crossing events are broadcast fire-and-forget; nobody acknowledges them
//! and a send with no receivers is not an error.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Event type fired when a device's low state changes.
pub const EVENT_BATTERY_THRESHOLD: &str = "battery_notes_battery_threshold";

/// Event type fired when a level jump suggests new batteries.
pub const EVENT_BATTERY_INCREASED: &str = "battery_notes_battery_increased";

/// Events emitted by coordinators.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new event types
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum DomainEvent {
    /// The battery crossed its low threshold, in either direction.
    BatteryThreshold {
        device_id: String,
        battery_low: bool,
        battery_type_and_quantity: String,
    },
    /// The level rose by more than the increase threshold.
    BatteryIncreased {
        device_id: String,
        previous_level: f64,
        current_level: f64,
        battery_type_and_quantity: String,
    },
}

impl DomainEvent {
    /// Host event type name.
    pub fn event_type(&self) -> &'static str {
        match self {
            DomainEvent::BatteryThreshold { .. } => EVENT_BATTERY_THRESHOLD,
            DomainEvent::BatteryIncreased { .. } => EVENT_BATTERY_INCREASED,
        }
    }

    /// Device the event concerns.
    pub fn device_id(&self) -> &str {
        match self {
            DomainEvent::BatteryThreshold { device_id, .. }
            | DomainEvent::BatteryIncreased { device_id, .. } => device_id,
        }
    }
}

/// Sender for domain events.
pub type EventSender = broadcast::Sender<DomainEvent>;

/// Receiver for domain events.
pub type EventReceiver = broadcast::Receiver<DomainEvent>;

/// Broadcasts domain events to any number of receivers.
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    sender: EventSender,
}

impl EventDispatcher {
    /// Create a new event dispatcher.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events.
    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    /// Send an event.
    pub fn send(&self, event: DomainEvent) {
        // Ignore error if no receivers
        let _ = self.sender.send(event);
    }

    /// Get the number of active receivers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new(100)
    }
}
