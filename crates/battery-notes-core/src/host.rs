//! Contracts with the host platform.
//!
//! The sync engine never owns entity registries, state dispatch or restore
//! storage. It reaches them through these traits, implemented by the host
//! integration (and by [`crate::mock::MockHost`] in tests).
//!
//! All methods are synchronous. Implementations must not invoke a
//! [`StateCallback`] while holding a lock that the callback could need.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use battery_notes_types::{Attributes, TelemetryState};

use crate::error::Result;

/// Handle identifying one state subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

/// Callback invoked with an entity's new state, or `None` when it was removed.
pub type StateCallback = Arc<dyn Fn(Option<&TelemetryState>) + Send + Sync>;

/// Source of upstream entity states.
pub trait StateSource: Send + Sync {
    /// Current state of an entity, if it has one.
    fn get_state(&self, entity_id: &str) -> Option<TelemetryState>;

    /// Subscribe to state changes of an entity.
    ///
    /// Implementations may invoke `callback` with the current state before
    /// returning.
    fn subscribe(&self, entity_id: &str, callback: StateCallback) -> SubscriptionId;

    /// Release a subscription. Unknown ids are ignored.
    fn unsubscribe(&self, id: SubscriptionId);
}

/// The host's entity registry.
pub trait EntityRegistry: Send + Sync {
    /// Look up an entity by id.
    fn get_entity(&self, entity_id: &str) -> Option<RegistryEntry>;

    /// Apply an update to an entity.
    fn update_entity(&self, entity_id: &str, update: EntityUpdate) -> Result<RegistryEntry>;
}

/// The host's device registry.
pub trait DeviceRegistry: Send + Sync {
    /// Look up a device by id.
    fn get_device(&self, device_id: &str) -> Option<DeviceEntry>;

    /// Apply an update to a device.
    fn update_device(&self, device_id: &str, update: DeviceUpdate) -> Result<DeviceEntry>;
}

/// Output side: rendered sensor states and their restore cache.
pub trait StateSink: Send + Sync {
    /// Publish a rendered sensor state.
    fn publish(&self, state: SensorState);

    /// The state persisted for an entity before the last restart, if any.
    fn last_state(&self, entity_id: &str) -> Option<SensorState>;
}

/// Everything the engine needs from the host.
pub trait Host: StateSource + EntityRegistry + DeviceRegistry + StateSink {}

impl<T> Host for T where T: StateSource + EntityRegistry + DeviceRegistry + StateSink {}

/// Shared handle to the host.
pub type SharedHost = Arc<dyn Host>;

/// Who hid an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HiddenBy {
    User,
    Integration,
}

/// Display category of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityCategory {
    Config,
    Diagnostic,
}

/// An entity registry record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub entity_id: String,
    pub unique_id: Option<String>,
    /// Name set by the user, if any.
    pub name: Option<String>,
    pub device_id: Option<String>,
    pub hidden_by: Option<HiddenBy>,
}

impl RegistryEntry {
    /// Create a record for an entity id.
    pub fn new(entity_id: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            ..Self::default()
        }
    }

    /// Set the unique id.
    #[must_use]
    pub fn with_unique_id(mut self, unique_id: impl Into<String>) -> Self {
        self.unique_id = Some(unique_id.into());
        self
    }

    /// Set the owning device.
    #[must_use]
    pub fn with_device(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    /// Set the user-chosen name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Returns true if the entity is hidden.
    pub fn is_hidden(&self) -> bool {
        self.hidden_by.is_some()
    }
}

/// Partial update for an entity registry record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityUpdate {
    /// `Some(None)` un-hides the entity.
    pub hidden_by: Option<Option<HiddenBy>>,
    /// `Some(None)` clears the user-chosen name.
    pub name: Option<Option<String>>,
}

impl EntityUpdate {
    /// Hide an entity on behalf of `by`.
    pub fn hide(by: HiddenBy) -> Self {
        Self {
            hidden_by: Some(Some(by)),
            ..Self::default()
        }
    }

    /// Un-hide an entity.
    pub fn unhide() -> Self {
        Self {
            hidden_by: Some(None),
            ..Self::default()
        }
    }
}

/// A device registry record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEntry {
    pub id: String,
    pub name: Option<String>,
    pub name_by_user: Option<String>,
    pub connections: BTreeSet<(String, String)>,
    pub identifiers: BTreeSet<(String, String)>,
    pub config_entries: BTreeSet<String>,
}

impl DeviceEntry {
    /// Create a device record.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// The name shown to users: the user's override, else the device name.
    pub fn display_name(&self) -> Option<&str> {
        self.name_by_user.as_deref().or(self.name.as_deref())
    }
}

/// Partial update for a device registry record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceUpdate {
    pub add_config_entry_id: Option<String>,
    pub remove_config_entry_id: Option<String>,
}

impl DeviceUpdate {
    /// Associate a configuration entry with the device.
    pub fn add_config_entry(entry_id: impl Into<String>) -> Self {
        Self {
            add_config_entry_id: Some(entry_id.into()),
            ..Self::default()
        }
    }

    /// Remove a configuration entry from the device.
    pub fn remove_config_entry(entry_id: impl Into<String>) -> Self {
        Self {
            remove_config_entry_id: Some(entry_id.into()),
            ..Self::default()
        }
    }
}

/// Kind of entity registry change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryAction {
    Add,
    Remove,
    Update,
}

/// Entity registry lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEvent {
    pub action: RegistryAction,
    /// Entity id after the change.
    pub entity_id: String,
    /// Previous entity id, when the change renamed the entity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_entity_id: Option<String>,
    /// Names of the fields that changed (`entity_id`, `device_id`, ...).
    #[serde(default)]
    pub changes: BTreeSet<String>,
}

impl RegistryEvent {
    /// An entity was added.
    pub fn added(entity_id: impl Into<String>) -> Self {
        Self {
            action: RegistryAction::Add,
            entity_id: entity_id.into(),
            old_entity_id: None,
            changes: BTreeSet::new(),
        }
    }

    /// An entity was removed.
    pub fn removed(entity_id: impl Into<String>) -> Self {
        Self {
            action: RegistryAction::Remove,
            entity_id: entity_id.into(),
            old_entity_id: None,
            changes: BTreeSet::new(),
        }
    }

    /// An entity changed its id.
    pub fn renamed(old_entity_id: impl Into<String>, new_entity_id: impl Into<String>) -> Self {
        Self {
            action: RegistryAction::Update,
            entity_id: new_entity_id.into(),
            old_entity_id: Some(old_entity_id.into()),
            changes: BTreeSet::from(["entity_id".to_string()]),
        }
    }

    /// Some fields of an entity changed.
    pub fn updated<I, S>(entity_id: impl Into<String>, changes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            action: RegistryAction::Update,
            entity_id: entity_id.into(),
            old_entity_id: None,
            changes: changes.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns true if the named field changed.
    pub fn changed(&self, field: &str) -> bool {
        self.changes.contains(field)
    }
}

/// Value of a rendered sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum StateValue {
    Unknown,
    Text(String),
    Number(f64),
    Bool(bool),
    #[serde(with = "time::serde::rfc3339")]
    Timestamp(OffsetDateTime),
}

impl StateValue {
    /// The value as text, if it is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            StateValue::Text(text) => Some(text),
            _ => None,
        }
    }

    /// The value as a number, if it is one.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            StateValue::Number(number) => Some(*number),
            _ => None,
        }
    }

    /// The value as a flag, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            StateValue::Bool(flag) => Some(*flag),
            _ => None,
        }
    }

    /// The value as a timestamp, if it is one.
    pub fn as_timestamp(&self) -> Option<OffsetDateTime> {
        match self {
            StateValue::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }
}

impl fmt::Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateValue::Unknown => write!(f, "unknown"),
            StateValue::Text(text) => write!(f, "{}", text),
            StateValue::Number(number) => write!(f, "{}", number),
            StateValue::Bool(true) => write!(f, "on"),
            StateValue::Bool(false) => write!(f, "off"),
            StateValue::Timestamp(ts) => write!(f, "{}", ts),
        }
    }
}

/// A rendered derived-sensor state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorState {
    pub entity_id: String,
    pub unique_id: String,
    pub name: String,
    pub value: StateValue,
    pub available: bool,
    #[serde(default)]
    pub attributes: Attributes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_category: Option<EntityCategory>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_prefers_user_name() {
        let mut device = DeviceEntry::new("dev1", "Hue Dimmer");
        assert_eq!(device.display_name(), Some("Hue Dimmer"));
        device.name_by_user = Some("Hallway Switch".into());
        assert_eq!(device.display_name(), Some("Hallway Switch"));
    }

    #[test]
    fn test_renamed_event_carries_both_ids() {
        let event = RegistryEvent::renamed("sensor.old", "sensor.new");
        assert_eq!(event.action, RegistryAction::Update);
        assert_eq!(event.old_entity_id.as_deref(), Some("sensor.old"));
        assert!(event.changed("entity_id"));
        assert!(!event.changed("device_id"));
    }

    #[test]
    fn test_state_value_display() {
        assert_eq!(StateValue::Unknown.to_string(), "unknown");
        assert_eq!(StateValue::Number(87.5).to_string(), "87.5");
        assert_eq!(StateValue::Bool(true).to_string(), "on");
    }

    #[test]
    fn test_registry_event_json_shape() {
        let event = RegistryEvent::updated("sensor.remote_battery", ["device_id"]);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["action"], "update");
        assert_eq!(json["changes"][0], "device_id");
        assert!(json.get("old_entity_id").is_none());
    }
}
