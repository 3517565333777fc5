//! Service configuration.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use battery_notes_core::{EntryConfig, Options};
use battery_notes_types::MAX_THRESHOLD;

/// Service configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Integration options shared by every entry.
    pub options: Options,
    /// Storage settings.
    pub storage: StorageConfig,
    /// Configured entries.
    #[serde(default)]
    pub entries: Vec<EntryConfig>,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Save configuration to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        std::fs::write(path.as_ref(), content).map_err(|e| ConfigError::Write {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Validate the configuration and return any errors.
    ///
    /// This checks:
    /// - Both option thresholds are at most 100
    /// - Storage path is not empty
    /// - Entry and device ids are not empty
    /// - Per-entry low thresholds are at most 100
    /// - No duplicate entry ids or device ids
    ///
    /// # Example
    ///
    /// ```
    /// use battery_notes_service::Config;
    ///
    /// let config = Config::default();
    /// config.validate().expect("Default config should be valid");
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = validate_options(&self.options);
        errors.extend(self.storage.validate());

        let mut seen_entries = HashSet::new();
        let mut seen_devices = HashSet::new();
        for (i, entry) in self.entries.iter().enumerate() {
            let prefix = format!("entries[{}]", i);
            errors.extend(validate_entry(entry, &prefix));

            if !entry.entry_id.is_empty() && !seen_entries.insert(entry.entry_id.as_str()) {
                errors.push(ValidationError {
                    field: format!("{}.entry_id", prefix),
                    message: format!("duplicate entry id '{}'", entry.entry_id),
                });
            }
            if !entry.device_id.is_empty() && !seen_devices.insert(entry.device_id.as_str()) {
                errors.push(ValidationError {
                    field: format!("{}.device_id", prefix),
                    message: format!("device '{}' already has an entry", entry.device_id),
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Load and validate configuration from a file.
    pub fn load_validated<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }
}

fn validate_options(options: &Options) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    for (field, value) in [
        (
            "options.default_battery_low_threshold",
            options.default_battery_low_threshold,
        ),
        (
            "options.battery_increase_threshold",
            options.battery_increase_threshold,
        ),
    ] {
        if value > MAX_THRESHOLD {
            errors.push(ValidationError {
                field: field.to_string(),
                message: format!("{} is out of range (0-{})", value, MAX_THRESHOLD),
            });
        }
    }

    errors
}

fn validate_entry(entry: &EntryConfig, prefix: &str) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if entry.entry_id.is_empty() {
        errors.push(ValidationError {
            field: format!("{}.entry_id", prefix),
            message: "entry id cannot be empty".to_string(),
        });
    }
    if entry.device_id.is_empty() {
        errors.push(ValidationError {
            field: format!("{}.device_id", prefix),
            message: "device id cannot be empty".to_string(),
        });
    }
    if let Some(source) = &entry.source_entity_id
        && source.is_empty()
    {
        errors.push(ValidationError {
            field: format!("{}.source_entity_id", prefix),
            message: "source entity cannot be empty string (omit it instead)".to_string(),
        });
    }
    if let Some(threshold) = entry.battery_low_threshold
        && threshold > MAX_THRESHOLD
    {
        errors.push(ValidationError {
            field: format!("{}.battery_low_threshold", prefix),
            message: format!("{} is out of range (0-{})", threshold, MAX_THRESHOLD),
        });
    }

    errors
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file path.
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: battery_notes_store::default_db_path(),
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.path.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "storage.path".to_string(),
                message: "database path cannot be empty".to_string(),
            });
        }

        errors
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// A single validation error with context.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The field path (e.g., `storage.path` or `entries[0].device_id`).
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("battery-notes")
        .join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(err: ConfigError) -> Vec<String> {
        match err {
            ConfigError::Validation(errors) => errors.into_iter().map(|e| e.field).collect(),
            other => panic!("expected validation error, got {other}"),
        }
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.options.enable_replaced);
        assert!(!config.options.hide_battery);
        assert_eq!(config.options.default_battery_low_threshold, 10);
        assert_eq!(config.options.battery_increase_threshold, 25);
        assert!(config.entries.is_empty());
        assert_eq!(config.storage.path, battery_notes_store::default_db_path());
    }

    #[test]
    fn test_config_parse() {
        let toml = r#"
            [options]
            hide_battery = true
            battery_increase_threshold = 40

            [storage]
            path = "/var/lib/battery-notes/metadata.db"

            [[entries]]
            entry_id = "01HV"
            device_id = "a1b2c3"
            source_entity_id = "sensor.kitchen_remote_battery"
            battery_type = "CR2032"
            battery_quantity = 1
            battery_low_threshold = 15
        "#;
        let config: Config = toml::from_str(toml).unwrap();

        assert!(config.options.hide_battery);
        assert!(config.options.enable_replaced);
        assert_eq!(config.options.battery_increase_threshold, 40);
        assert_eq!(
            config.storage.path,
            PathBuf::from("/var/lib/battery-notes/metadata.db")
        );
        assert_eq!(config.entries.len(), 1);
        assert_eq!(
            config.entries[0].source_entity_id.as_deref(),
            Some("sensor.kitchen_remote_battery")
        );
        assert_eq!(config.entries[0].battery_low_threshold, Some(15));
        config.validate().unwrap();
    }

    #[test]
    fn test_entry_without_source() {
        let toml = r#"
            [[entries]]
            entry_id = "e1"
            device_id = "d1"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.entries[0].source_entity_id, None);
        assert_eq!(config.entries[0].battery_quantity, 0);
    }

    #[test]
    fn test_config_save_and_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.toml");

        let config = Config {
            options: Options {
                round_battery: true,
                ..Options::default()
            },
            storage: StorageConfig {
                path: PathBuf::from("/tmp/test.db"),
            },
            entries: vec![
                EntryConfig::new("e1", "d1")
                    .with_source("sensor.remote_battery")
                    .with_battery("AA", 4),
            ],
        };

        config.save(&config_path).unwrap();
        let loaded = Config::load_validated(&config_path).unwrap();

        assert!(loaded.options.round_battery);
        assert_eq!(loaded.storage.path, PathBuf::from("/tmp/test.db"));
        assert_eq!(loaded.entries, config.entries);
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load("/nonexistent/battery-notes.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_load_invalid_toml() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("bad.toml");
        std::fs::write(&path, "options = [").unwrap();
        assert!(matches!(
            Config::load(&path).unwrap_err(),
            ConfigError::Parse { .. }
        ));
    }

    #[test]
    fn test_validate_thresholds() {
        let config = Config {
            options: Options {
                default_battery_low_threshold: 101,
                battery_increase_threshold: 200,
                ..Options::default()
            },
            entries: vec![EntryConfig::new("e1", "d1").with_low_threshold(150)],
            ..Config::default()
        };

        assert_eq!(
            fields(config.validate().unwrap_err()),
            [
                "options.default_battery_low_threshold",
                "options.battery_increase_threshold",
                "entries[0].battery_low_threshold",
            ]
        );
    }

    #[test]
    fn test_validate_duplicates_and_empty_ids() {
        let config = Config {
            entries: vec![
                EntryConfig::new("e1", "d1"),
                EntryConfig::new("e1", "d2"),
                EntryConfig::new("e3", "d1"),
                EntryConfig::new("", ""),
            ],
            ..Config::default()
        };

        assert_eq!(
            fields(config.validate().unwrap_err()),
            [
                "entries[1].entry_id",
                "entries[2].device_id",
                "entries[3].entry_id",
                "entries[3].device_id",
            ]
        );
    }

    #[test]
    fn test_validate_empty_storage_path() {
        let config = Config {
            storage: StorageConfig {
                path: PathBuf::new(),
            },
            ..Config::default()
        };
        assert_eq!(fields(config.validate().unwrap_err()), ["storage.path"]);
    }

    #[test]
    fn test_validation_error_display() {
        let err = ConfigError::Validation(vec![ValidationError {
            field: "entries[0].device_id".to_string(),
            message: "device id cannot be empty".to_string(),
        }]);
        assert!(err.to_string().contains("  - entries[0].device_id: device id cannot be empty"));
    }
}
