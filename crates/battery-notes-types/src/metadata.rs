//! Per-device battery metadata and partial updates.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use time::Date;

use crate::error::{MetadataError, MetadataResult};

/// Global fallback for the low-battery threshold, in percent.
pub const DEFAULT_BATTERY_LOW_THRESHOLD: u8 = 10;

/// Global default for the jump (in percent) that counts as a battery increase.
pub const DEFAULT_BATTERY_INCREASE_THRESHOLD: u8 = 25;

/// Upper bound for any percentage threshold.
pub const MAX_THRESHOLD: u8 = 100;

/// Battery metadata recorded for a single device.
///
/// A missing record is equivalent to `DeviceMetadata::default()`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeviceMetadata {
    /// Free-form battery type, e.g. `"CR2032"`. May be empty.
    #[cfg_attr(feature = "serde", serde(default))]
    pub battery_type: String,
    /// Number of batteries the device takes.
    #[cfg_attr(feature = "serde", serde(default))]
    pub battery_quantity: u32,
    /// Device-specific low threshold in percent. `None` or `0` means the global default.
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub battery_low_threshold: Option<u8>,
    /// Day the batteries were last replaced.
    #[cfg_attr(
        feature = "serde",
        serde(default, with = "crate::date::serde_opt")
    )]
    pub last_replaced: Option<Date>,
}

impl DeviceMetadata {
    /// Create metadata with a battery type and quantity.
    pub fn new(battery_type: impl Into<String>, battery_quantity: u32) -> Self {
        Self {
            battery_type: battery_type.into(),
            battery_quantity,
            ..Self::default()
        }
    }

    /// Threshold to compare levels against, falling back to `default` when unset.
    #[must_use]
    pub fn effective_low_threshold(&self, default: u8) -> u8 {
        self.battery_low_threshold
            .filter(|threshold| *threshold > 0)
            .unwrap_or(default)
    }

    /// Display string combining quantity and type.
    #[must_use]
    pub fn battery_type_and_quantity(&self) -> String {
        battery_type_and_quantity(&self.battery_type, self.battery_quantity)
    }
}

/// Build the composite display string for a battery type and quantity.
///
/// The quantity segment (`"4×"`) is only rendered for more than one battery,
/// and an empty type leaves only the quantity segment.
///
/// # Examples
///
/// ```
/// use battery_notes_types::battery_type_and_quantity;
///
/// assert_eq!(battery_type_and_quantity("AA", 4), "4× AA");
/// assert_eq!(battery_type_and_quantity("CR2032", 1), "CR2032");
/// assert_eq!(battery_type_and_quantity("CR2032", 0), "CR2032");
/// assert_eq!(battery_type_and_quantity("", 2), "2×");
/// ```
#[must_use]
pub fn battery_type_and_quantity(battery_type: &str, quantity: u32) -> String {
    let battery_type = battery_type.trim();
    let mut rendered = if quantity > 1 {
        format!("{quantity}×")
    } else {
        String::new()
    };

    if !battery_type.is_empty() {
        if !rendered.is_empty() {
            rendered.push(' ');
        }
        rendered.push_str(battery_type);
    }

    rendered
}

/// A partial update to [`DeviceMetadata`].
///
/// Unset fields are left untouched. For nullable fields, `Some(None)` clears
/// the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataUpdate {
    pub battery_type: Option<String>,
    pub battery_quantity: Option<u32>,
    pub battery_low_threshold: Option<Option<u8>>,
    pub last_replaced: Option<Option<Date>>,
}

impl MetadataUpdate {
    /// Create an empty update.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the battery type.
    #[must_use]
    pub fn battery_type(mut self, battery_type: impl Into<String>) -> Self {
        self.battery_type = Some(battery_type.into());
        self
    }

    /// Set the battery quantity.
    #[must_use]
    pub fn battery_quantity(mut self, quantity: u32) -> Self {
        self.battery_quantity = Some(quantity);
        self
    }

    /// Set or clear the device-specific low threshold.
    #[must_use]
    pub fn battery_low_threshold(mut self, threshold: Option<u8>) -> Self {
        self.battery_low_threshold = Some(threshold);
        self
    }

    /// Set or clear the replacement date.
    #[must_use]
    pub fn last_replaced(mut self, date: Option<Date>) -> Self {
        self.last_replaced = Some(date);
        self
    }

    /// Returns true if the update would change nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.battery_type.is_none()
            && self.battery_quantity.is_none()
            && self.battery_low_threshold.is_none()
            && self.last_replaced.is_none()
    }

    /// Range-check the update.
    pub fn validate(&self) -> MetadataResult<()> {
        if let Some(Some(threshold)) = self.battery_low_threshold
            && threshold > MAX_THRESHOLD
        {
            return Err(MetadataError::ThresholdOutOfRange {
                field: "battery_low_threshold",
                value: u32::from(threshold),
            });
        }
        Ok(())
    }

    /// Merge the update over `current`, returning the new metadata.
    #[must_use]
    pub fn apply_to(&self, current: &DeviceMetadata) -> DeviceMetadata {
        DeviceMetadata {
            battery_type: self
                .battery_type
                .clone()
                .unwrap_or_else(|| current.battery_type.clone()),
            battery_quantity: self.battery_quantity.unwrap_or(current.battery_quantity),
            battery_low_threshold: self
                .battery_low_threshold
                .unwrap_or(current.battery_low_threshold),
            last_replaced: self.last_replaced.unwrap_or(current.last_replaced),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use time::macros::date;

    #[test]
    fn test_zero_or_one_quantity_has_no_segment() {
        assert_eq!(battery_type_and_quantity("AAA", 0), "AAA");
        assert_eq!(battery_type_and_quantity("AAA", 1), "AAA");
        assert_eq!(battery_type_and_quantity("", 0), "");
        assert_eq!(battery_type_and_quantity("", 1), "");
    }

    #[test]
    fn test_effective_threshold_falls_back() {
        let mut metadata = DeviceMetadata::new("AA", 2);
        assert_eq!(metadata.effective_low_threshold(10), 10);

        metadata.battery_low_threshold = Some(0);
        assert_eq!(metadata.effective_low_threshold(10), 10);

        metadata.battery_low_threshold = Some(35);
        assert_eq!(metadata.effective_low_threshold(10), 35);
    }

    #[test]
    fn test_update_merges_only_set_fields() {
        let current = DeviceMetadata {
            battery_type: "AA".into(),
            battery_quantity: 2,
            battery_low_threshold: Some(20),
            last_replaced: Some(date!(2024 - 01 - 01)),
        };

        let merged = MetadataUpdate::new().battery_quantity(4).apply_to(&current);
        assert_eq!(merged.battery_type, "AA");
        assert_eq!(merged.battery_quantity, 4);
        assert_eq!(merged.battery_low_threshold, Some(20));
        assert_eq!(merged.last_replaced, Some(date!(2024 - 01 - 01)));

        let cleared = MetadataUpdate::new()
            .battery_low_threshold(None)
            .last_replaced(None)
            .apply_to(&current);
        assert_eq!(cleared.battery_low_threshold, None);
        assert_eq!(cleared.last_replaced, None);
    }

    #[test]
    fn test_validate_rejects_threshold_over_100() {
        let err = MetadataUpdate::new()
            .battery_low_threshold(Some(101))
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("battery_low_threshold"));

        assert!(
            MetadataUpdate::new()
                .battery_low_threshold(Some(100))
                .validate()
                .is_ok()
        );
    }

    #[test]
    fn test_empty_update() {
        assert!(MetadataUpdate::new().is_empty());
        assert!(!MetadataUpdate::new().battery_type("AA").is_empty());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_metadata_serializes_date_as_calendar_day() {
        let metadata = DeviceMetadata {
            last_replaced: Some(date!(2024 - 02 - 29)),
            ..DeviceMetadata::new("CR2032", 1)
        };
        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json["last_replaced"], "2024-02-29");

        let back: DeviceMetadata = serde_json::from_value(json).unwrap();
        assert_eq!(back, metadata);
    }

    proptest! {
        #[test]
        fn prop_quantity_segment_only_above_one(battery_type in "[A-Z0-9]{0,8}", quantity in 0u32..20) {
            let rendered = battery_type_and_quantity(&battery_type, quantity);
            prop_assert_eq!(rendered.contains('×'), quantity > 1);
            if quantity <= 1 {
                prop_assert_eq!(rendered, battery_type);
            }
        }
    }
}
