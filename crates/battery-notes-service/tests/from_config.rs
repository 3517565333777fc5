//! Hub startup from a configuration file.

use std::sync::Arc;

use time::macros::date;

use battery_notes_core::host::{DeviceEntry, RegistryEntry};
use battery_notes_core::{MockHost, SharedHost, StateValue};
use battery_notes_service::{BatteryNotes, Config};
use battery_notes_store::Store;

fn write_config(dir: &std::path::Path) -> std::path::PathBuf {
    let db_path = dir.join("data").join("metadata.db");
    let config_path = dir.join("config.toml");
    let content = format!(
        r#"
[options]
hide_battery = true

[storage]
path = "{}"

[[entries]]
entry_id = "e1"
device_id = "dev1"
source_entity_id = "sensor.remote_battery"
battery_type = "CR2032"
battery_quantity = 1

[[entries]]
entry_id = "e2"
device_id = "dev2"
battery_type = "AA"
battery_quantity = 4
battery_low_threshold = 20
"#,
        db_path.display().to_string().replace('\\', "\\\\")
    );
    std::fs::write(&config_path, content).unwrap();
    config_path
}

fn mock_host() -> Arc<MockHost> {
    let mock = Arc::new(
        MockHost::new()
            .with_device(DeviceEntry::new("dev1", "Kitchen Remote"))
            .with_device(DeviceEntry::new("dev2", "Hall Sensor"))
            .with_entity(RegistryEntry::new("sensor.remote_battery").with_device("dev1")),
    );
    mock.set_value("sensor.remote_battery", "73");
    mock
}

#[test]
fn test_hub_loads_configured_entries() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load_validated(write_config(dir.path())).unwrap();
    let mock = mock_host();
    let host: SharedHost = mock.clone();

    let hub = BatteryNotes::from_config(host, &config).unwrap();

    assert_eq!(hub.entry_ids(), ["e1", "e2"]);
    assert!(mock.entity("sensor.remote_battery").unwrap().is_hidden());
    assert_eq!(
        mock.latest("sensor.kitchen_remote_battery_plus").unwrap().value,
        StateValue::Number(73.0)
    );
    assert_eq!(
        mock.latest("sensor.hall_sensor_battery_type").unwrap().value,
        StateValue::Text("4× AA".into())
    );
}

#[test]
fn test_metadata_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load_validated(write_config(dir.path())).unwrap();

    {
        let mock = mock_host();
        let host: SharedHost = mock.clone();
        let hub = BatteryNotes::from_config(host, &config).unwrap();
        hub.set_battery_replaced(
            "dev2",
            Some(time::macros::datetime!(2024-11-20 18:45 +01:00)),
        )
        .unwrap();
    }

    let store = Store::open(&config.storage.path).unwrap();
    let stored = store.get_device("dev2").unwrap().unwrap();
    assert_eq!(stored.battery_type, "AA");
    assert_eq!(stored.battery_low_threshold, Some(20));
    assert_eq!(stored.last_replaced, Some(date!(2024 - 11 - 20)));
    drop(store);

    let mock = mock_host();
    let host: SharedHost = mock.clone();
    let hub = BatteryNotes::from_config(host, &config).unwrap();
    let sensor = hub
        .entry("e2")
        .and_then(|entry| entry.last_replaced_sensor().cloned())
        .unwrap();
    assert_eq!(sensor.last_replaced(), Some(date!(2024 - 11 - 20)));
}
