//! The battery notes hub.
//!
//! [`BatteryNotes`] owns every loaded entry together with the shared host
//! handle, metadata store, options snapshot and event dispatcher. It is the
//! single place that sets entries up, tears them down and reacts to host
//! events.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use time::{Date, OffsetDateTime};
use tracing::{error, info, warn};

use battery_notes_core::host::DeviceUpdate;
use battery_notes_core::{
    BatteryNotesEntry, EntryConfig, EventDispatcher, EventReceiver, Options, ReconcileAction,
    RegistryEvent, SharedHost, SharedStore,
};
use battery_notes_store::Store;
use battery_notes_types::truncate_to_day;

use crate::config::Config;
use crate::error::{HubError, Result};

/// Owner of every loaded entry.
pub struct BatteryNotes {
    host: SharedHost,
    store: SharedStore,
    options: Options,
    events: EventDispatcher,
    entries: BTreeMap<String, BatteryNotesEntry>,
}

impl BatteryNotes {
    /// Create an empty hub.
    pub fn new(host: SharedHost, store: SharedStore, options: Options) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            host,
            store,
            options,
            events: EventDispatcher::default(),
            entries: BTreeMap::new(),
        })
    }

    /// Open the configured store and set up every configured entry.
    pub fn from_config(host: SharedHost, config: &Config) -> Result<Self> {
        let store = open_store(&config.storage.path)?;
        let mut hub = Self::new(host, store, config.options.clone())?;
        hub.setup_entries(config.entries.iter().cloned());
        Ok(hub)
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn events(&self) -> &EventDispatcher {
        &self.events
    }

    /// Subscribe to domain events.
    pub fn subscribe_events(&self) -> EventReceiver {
        self.events.subscribe()
    }

    pub fn entry(&self, entry_id: &str) -> Option<&BatteryNotesEntry> {
        self.entries.get(entry_id)
    }

    /// The entry attached to a device, if any.
    pub fn entry_for_device(&self, device_id: &str) -> Option<&BatteryNotesEntry> {
        self.entries
            .values()
            .find(|entry| entry.device_id() == device_id)
    }

    /// Ids of every loaded entry.
    pub fn entry_ids(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Set up one entry.
    pub fn setup_entry(&mut self, config: EntryConfig) -> Result<()> {
        if self.entries.contains_key(&config.entry_id) {
            return Err(HubError::DuplicateEntry(config.entry_id));
        }

        let entry_id = config.entry_id.clone();
        let entry = BatteryNotesEntry::setup(
            config,
            self.host.clone(),
            self.store.clone(),
            &self.options,
            self.events.clone(),
        )?;
        self.entries.insert(entry_id, entry);
        Ok(())
    }

    /// Set up several entries. A failing entry is logged and skipped.
    ///
    /// Returns the number of entries that were set up.
    pub fn setup_entries(&mut self, configs: impl IntoIterator<Item = EntryConfig>) -> usize {
        let mut loaded = 0;
        for config in configs {
            let entry_id = config.entry_id.clone();
            match self.setup_entry(config) {
                Ok(()) => loaded += 1,
                Err(e) => error!("Failed to set up entry {}: {}", entry_id, e),
            }
        }
        info!("Loaded {} entries", loaded);
        loaded
    }

    /// Unload an entry, keeping its stored metadata.
    ///
    /// Returns the configuration the entry was loaded with.
    pub fn unload_entry(&mut self, entry_id: &str) -> Result<EntryConfig> {
        let mut entry = self
            .entries
            .remove(entry_id)
            .ok_or_else(|| HubError::EntryNotFound(entry_id.to_string()))?;
        entry.unload();
        Ok(entry.config().clone())
    }

    /// Unload and set up an entry again with its current configuration.
    pub fn reload_entry(&mut self, entry_id: &str) -> Result<()> {
        let config = self.unload_entry(entry_id)?;
        self.setup_entry(config)
    }

    /// Unload an entry, detach it from its device and forget its metadata.
    ///
    /// The stored metadata is kept while another entry still uses the device.
    pub fn remove_entry(&mut self, entry_id: &str) -> Result<()> {
        let config = self.unload_entry(entry_id)?;

        if self.host.get_device(&config.device_id).is_some() {
            self.host.update_device(
                &config.device_id,
                DeviceUpdate::remove_config_entry(&config.entry_id),
            )?;
        }

        if self.entry_for_device(&config.device_id).is_none() {
            let deleted = self.store.lock().delete_device(&config.device_id)?;
            if deleted {
                info!("Deleted stored metadata for {}", config.device_id);
            }
        }

        info!("Removed entry {}", entry_id);
        Ok(())
    }

    /// Unload every entry.
    pub fn unload_all(&mut self) {
        for (_, mut entry) in std::mem::take(&mut self.entries) {
            entry.unload();
        }
    }

    /// Route a registry event to every entry tracking the affected entity.
    ///
    /// Each entry's action is carried out here. A failing action is logged
    /// and does not stop the remaining entries.
    pub fn handle_registry_event(&mut self, event: &RegistryEvent) -> Vec<(String, ReconcileAction)> {
        let tracking: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.tracks(event))
            .map(|(id, _)| id.clone())
            .collect();

        let mut actions = Vec::with_capacity(tracking.len());
        for entry_id in tracking {
            match self.apply_registry_event(&entry_id, event) {
                Ok(action) => actions.push((entry_id, action)),
                Err(e) => error!(
                    "Failed to handle {:?} of {} for entry {}: {}",
                    event.action, event.entity_id, entry_id, e
                ),
            }
        }
        actions
    }

    fn apply_registry_event(
        &mut self,
        entry_id: &str,
        event: &RegistryEvent,
    ) -> Result<ReconcileAction> {
        let entry = self
            .entries
            .get_mut(entry_id)
            .ok_or_else(|| HubError::EntryNotFound(entry_id.to_string()))?;
        let action = entry.handle_registry_event(event)?;

        match &action {
            ReconcileAction::RemoveEntry => self.remove_entry(entry_id)?,
            ReconcileAction::ReloadEntry { upstream_entity_id } => {
                let mut config = self.unload_entry(entry_id)?;
                config.source_entity_id = Some(upstream_entity_id.clone());
                self.setup_entry(config)?;
            }
            ReconcileAction::DetachFromDevice { .. } | ReconcileAction::None => {}
        }
        Ok(action)
    }

    /// Record a battery replacement for a device.
    ///
    /// The timestamp is truncated to its day in its own offset. Without one,
    /// today's UTC date is used. Returns the recorded day.
    pub fn set_battery_replaced(
        &self,
        device_id: &str,
        datetime: Option<OffsetDateTime>,
    ) -> Result<Date> {
        let entry = self
            .entry_for_device(device_id)
            .ok_or_else(|| HubError::DeviceNotConfigured(device_id.to_string()))?;

        let date = truncate_to_day(datetime.unwrap_or_else(OffsetDateTime::now_utc));
        entry.record_replacement(date)?;
        info!("Battery replaced on {} for {}", date, device_id);
        Ok(date)
    }

    /// Swap the options snapshot and reload every entry.
    pub fn update_options(&mut self, options: Options) -> Result<()> {
        options.validate()?;
        if options == self.options {
            return Ok(());
        }
        self.options = options;

        let mut configs = Vec::with_capacity(self.entries.len());
        for entry_id in self.entry_ids() {
            configs.push(self.unload_entry(&entry_id)?);
        }

        let total = configs.len();
        let loaded = self.setup_entries(configs);
        if loaded < total {
            warn!("{} entries failed to reload after options change", total - loaded);
        }
        Ok(())
    }
}

impl Drop for BatteryNotes {
    fn drop(&mut self) {
        self.unload_all();
    }
}

impl std::fmt::Debug for BatteryNotes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatteryNotes")
            .field("options", &self.options)
            .field("entries", &self.entries.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Open a metadata store for sharing between coordinators.
pub fn open_store<P: AsRef<Path>>(path: P) -> Result<SharedStore> {
    info!("Opening database at {:?}", path.as_ref());
    Ok(Arc::new(Mutex::new(Store::open(path)?)))
}

#[cfg(test)]
mod tests {
    use time::macros::{date, datetime};

    use battery_notes_core::host::{DeviceEntry, RegistryEntry};
    use battery_notes_core::{BindingState, DomainEvent, MockHost};

    use super::*;

    const UPSTREAM: &str = "sensor.remote_battery";

    fn mock_host() -> Arc<MockHost> {
        Arc::new(
            MockHost::new()
                .with_device(DeviceEntry::new("dev1", "Kitchen Remote"))
                .with_device(DeviceEntry::new("dev2", "Hall Sensor"))
                .with_entity(RegistryEntry::new(UPSTREAM).with_device("dev1")),
        )
    }

    fn hub(mock: &Arc<MockHost>) -> BatteryNotes {
        let host: SharedHost = mock.clone();
        let store = Arc::new(Mutex::new(Store::open_in_memory().unwrap()));
        BatteryNotes::new(host, store, Options::default()).unwrap()
    }

    fn entry(entry_id: &str, device_id: &str) -> EntryConfig {
        EntryConfig::new(entry_id, device_id).with_battery("AA", 2)
    }

    #[test]
    fn test_setup_entries_skips_failures() {
        let mock = mock_host();
        let mut hub = hub(&mock);

        let loaded = hub.setup_entries([
            entry("e1", "dev1").with_source(UPSTREAM),
            entry("e1", "dev1"),
            entry("", "dev2"),
            entry("e2", "dev2"),
        ]);

        assert_eq!(loaded, 2);
        assert_eq!(hub.entry_ids(), ["e1", "e2"]);
    }

    #[test]
    fn test_set_battery_replaced_truncates_in_own_offset() {
        let mock = mock_host();
        let mut hub = hub(&mock);
        hub.setup_entry(entry("e1", "dev1")).unwrap();

        let day = hub
            .set_battery_replaced("dev1", Some(datetime!(2024-06-01 23:30 -05:00)))
            .unwrap();
        assert_eq!(day, date!(2024 - 06 - 01));

        let stored = hub.store().lock().get_device("dev1").unwrap().unwrap();
        assert_eq!(stored.last_replaced, Some(date!(2024 - 06 - 01)));
    }

    #[test]
    fn test_set_battery_replaced_defaults_to_today() {
        let mock = mock_host();
        let mut hub = hub(&mock);
        hub.setup_entry(entry("e1", "dev1")).unwrap();

        let day = hub.set_battery_replaced("dev1", None).unwrap();
        assert_eq!(day, OffsetDateTime::now_utc().date());
    }

    #[test]
    fn test_set_battery_replaced_unknown_device() {
        let mock = mock_host();
        let hub = hub(&mock);
        assert!(matches!(
            hub.set_battery_replaced("dev9", None),
            Err(HubError::DeviceNotConfigured(_))
        ));
    }

    #[test]
    fn test_remove_entry_forgets_metadata() {
        let mock = mock_host();
        let mut hub = hub(&mock);
        hub.setup_entry(entry("e1", "dev1")).unwrap();
        assert!(mock.device("dev1").unwrap().config_entries.contains("e1"));

        hub.remove_entry("e1").unwrap();
        assert!(hub.is_empty());
        assert!(mock.device("dev1").unwrap().config_entries.is_empty());
        assert!(hub.store().lock().get_device("dev1").unwrap().is_none());
    }

    #[test]
    fn test_unload_entry_keeps_metadata() {
        let mock = mock_host();
        let mut hub = hub(&mock);
        hub.setup_entry(entry("e1", "dev1")).unwrap();

        let config = hub.unload_entry("e1").unwrap();
        assert_eq!(config.entry_id, "e1");
        assert!(hub.store().lock().get_device("dev1").unwrap().is_some());
        assert!(matches!(
            hub.unload_entry("e1"),
            Err(HubError::EntryNotFound(_))
        ));
    }

    #[test]
    fn test_upstream_removal_removes_entry() {
        let mock = mock_host();
        let mut hub = hub(&mock);
        hub.setup_entry(entry("e1", "dev1").with_source(UPSTREAM)).unwrap();
        hub.setup_entry(entry("e2", "dev2")).unwrap();

        let event = mock.remove_entity(UPSTREAM);
        let actions = hub.handle_registry_event(&event);

        assert_eq!(actions, [("e1".to_string(), ReconcileAction::RemoveEntry)]);
        assert_eq!(hub.entry_ids(), ["e2"]);
        assert_eq!(mock.subscription_count(), 0);
    }

    #[test]
    fn test_upstream_rename_reloads_entry() {
        let mock = mock_host();
        mock.set_value(UPSTREAM, "80");
        let mut hub = hub(&mock);
        hub.setup_entry(entry("e1", "dev1").with_source(UPSTREAM)).unwrap();
        hub.set_battery_replaced("dev1", Some(datetime!(2024-02-03 10:00 UTC)))
            .unwrap();

        let event = mock.rename_entity(UPSTREAM, "sensor.remote_level");
        hub.handle_registry_event(&event);

        let entry = hub.entry("e1").unwrap();
        assert_eq!(
            entry.binding(),
            &BindingState::Bound("sensor.remote_level".into())
        );
        assert_eq!(
            entry.last_replaced_sensor().unwrap().last_replaced(),
            Some(date!(2024 - 02 - 03))
        );
        assert_eq!(mock.subscription_count_for(UPSTREAM), 0);
        assert_eq!(mock.subscription_count_for("sensor.remote_level"), 1);
    }

    #[test]
    fn test_update_options_reloads_and_hides() {
        let mock = mock_host();
        let mut hub = hub(&mock);
        hub.setup_entry(entry("e1", "dev1").with_source(UPSTREAM)).unwrap();
        assert!(!mock.entity(UPSTREAM).unwrap().is_hidden());

        hub.update_options(Options {
            hide_battery: true,
            ..Options::default()
        })
        .unwrap();

        assert!(hub.options().hide_battery);
        assert!(mock.entity(UPSTREAM).unwrap().is_hidden());
        assert_eq!(hub.len(), 1);
        assert_eq!(mock.subscription_count(), 1);
    }

    #[test]
    fn test_update_options_rejects_invalid() {
        let mock = mock_host();
        let mut hub = hub(&mock);
        let err = hub
            .update_options(Options {
                default_battery_low_threshold: 120,
                ..Options::default()
            })
            .unwrap_err();
        assert!(matches!(err, HubError::Core(_)));
        assert_eq!(hub.options(), &Options::default());
    }

    #[test]
    fn test_domain_events_reach_subscribers() {
        let mock = mock_host();
        mock.set_value(UPSTREAM, "50");
        let mut hub = hub(&mock);
        let mut events = hub.subscribe_events();
        hub.setup_entry(entry("e1", "dev1").with_source(UPSTREAM)).unwrap();

        mock.set_value(UPSTREAM, "5");

        match events.try_recv().unwrap() {
            DomainEvent::BatteryThreshold {
                device_id,
                battery_low,
                ..
            } => {
                assert_eq!(device_id, "dev1");
                assert!(battery_low);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}
