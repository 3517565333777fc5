//! Main store implementation.

use std::path::Path;

use rusqlite::{Connection, OptionalExtension, Row};
use time::{Date, OffsetDateTime};
use tracing::{debug, info};

use battery_notes_types::{DeviceMetadata, MetadataUpdate, format_date, parse_date};

use crate::error::{Error, Result};
use crate::models::StoredMetadata;
use crate::schema;

/// SQLite-based store for per-device battery metadata.
///
/// Every write is committed before the call returns.
pub struct Store {
    conn: Connection,
}

/// Raw column values, decoded outside the rusqlite row closure.
struct MetadataRow {
    device_id: String,
    battery_type: String,
    battery_quantity: i64,
    battery_low_threshold: Option<i64>,
    last_replaced: Option<String>,
    updated_at: i64,
}

impl MetadataRow {
    const COLUMNS: &'static str = "device_id, battery_type, battery_quantity, \
         battery_low_threshold, last_replaced, updated_at";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            device_id: row.get(0)?,
            battery_type: row.get(1)?,
            battery_quantity: row.get(2)?,
            battery_low_threshold: row.get(3)?,
            last_replaced: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }

    fn into_stored(self) -> Result<StoredMetadata> {
        let battery_quantity =
            u32::try_from(self.battery_quantity).map_err(|_| Error::InvalidColumn {
                column: "battery_quantity",
                value: self.battery_quantity,
            })?;
        let battery_low_threshold = self
            .battery_low_threshold
            .map(|value| {
                u8::try_from(value).map_err(|_| Error::InvalidColumn {
                    column: "battery_low_threshold",
                    value,
                })
            })
            .transpose()?;
        let last_replaced = self.last_replaced.as_deref().map(parse_date).transpose()?;
        let updated_at = OffsetDateTime::from_unix_timestamp(self.updated_at).map_err(|_| {
            Error::InvalidColumn {
                column: "updated_at",
                value: self.updated_at,
            }
        })?;

        Ok(StoredMetadata {
            device_id: self.device_id,
            metadata: DeviceMetadata {
                battery_type: self.battery_type,
                battery_quantity,
                battery_low_threshold,
                last_replaced,
            },
            updated_at,
        })
    }
}

impl Store {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| Error::CreateDirectory {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        info!("Opening metadata database at {}", path.display());
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = FULL;",
        )?;

        schema::initialize(&conn)?;

        Ok(Self { conn })
    }

    /// Open the default database location.
    pub fn open_default() -> Result<Self> {
        Self::open(crate::default_db_path())
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    /// Get a device's metadata, or `None` if no record exists.
    pub fn get_device(&self, device_id: &str) -> Result<Option<DeviceMetadata>> {
        Ok(self
            .get_stored(device_id)?
            .map(|stored| stored.metadata))
    }

    /// Get a device's metadata, treating a missing record as all-defaults.
    pub fn get_device_or_default(&self, device_id: &str) -> Result<DeviceMetadata> {
        Ok(self.get_device(device_id)?.unwrap_or_default())
    }

    /// Get a device's record together with its write timestamp.
    pub fn get_stored(&self, device_id: &str) -> Result<Option<StoredMetadata>> {
        let sql = format!(
            "SELECT {} FROM devices WHERE device_id = ?",
            MetadataRow::COLUMNS
        );
        let row = self
            .conn
            .query_row(&sql, [device_id], MetadataRow::from_row)
            .optional()?;

        row.map(MetadataRow::into_stored).transpose()
    }

    /// Merge a partial update into a device's record and persist it.
    ///
    /// Creates the record if it does not exist yet. Returns the merged metadata.
    pub fn update_device(&self, device_id: &str, update: &MetadataUpdate) -> Result<DeviceMetadata> {
        update.validate()?;

        let current = self.get_device_or_default(device_id)?;
        let merged = update.apply_to(&current);
        self.write_device(device_id, &merged)?;

        debug!("Stored metadata for {}: {:?}", device_id, merged);
        Ok(merged)
    }

    /// Record the day a device's batteries were replaced.
    pub fn set_last_replaced(&self, device_id: &str, date: Date) -> Result<DeviceMetadata> {
        self.update_device(device_id, &MetadataUpdate::new().last_replaced(Some(date)))
    }

    /// Remove a device's record. Returns true if a record was deleted.
    pub fn delete_device(&self, device_id: &str) -> Result<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM devices WHERE device_id = ?", [device_id])?;

        if removed > 0 {
            info!("Deleted metadata for {}", device_id);
        }
        Ok(removed > 0)
    }

    /// List all stored devices, ordered by device id.
    pub fn list_devices(&self) -> Result<Vec<StoredMetadata>> {
        let sql = format!(
            "SELECT {} FROM devices ORDER BY device_id",
            MetadataRow::COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;

        let rows = stmt
            .query_map([], MetadataRow::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter().map(MetadataRow::into_stored).collect()
    }

    fn write_device(&self, device_id: &str, metadata: &DeviceMetadata) -> Result<()> {
        let now = OffsetDateTime::now_utc().unix_timestamp();

        self.conn.execute(
            "INSERT INTO devices
                (device_id, battery_type, battery_quantity, battery_low_threshold, last_replaced, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(device_id) DO UPDATE SET
                battery_type = ?2,
                battery_quantity = ?3,
                battery_low_threshold = ?4,
                last_replaced = ?5,
                updated_at = ?6",
            rusqlite::params![
                device_id,
                metadata.battery_type,
                i64::from(metadata.battery_quantity),
                metadata.battery_low_threshold.map(i64::from),
                metadata.last_replaced.map(format_date),
                now
            ],
        )?;

        Ok(())
    }
}
