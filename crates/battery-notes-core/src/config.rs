//! Global options snapshot.
//!
//! Options are read once and handed to each component at construction. A
//! change produces a new snapshot and a reload; nothing reads shared mutable
//! configuration per call.

use serde::{Deserialize, Serialize};

use battery_notes_types::{
    DEFAULT_BATTERY_INCREASE_THRESHOLD, DEFAULT_BATTERY_LOW_THRESHOLD, MAX_THRESHOLD, Precision,
};

use crate::error::{Error, Result};

/// Integration-wide options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Create the last-replaced sensor and expose the date on Battery+.
    pub enable_replaced: bool,
    /// Hide the upstream battery entity behind its Battery+ mirror.
    pub hide_battery: bool,
    /// Round mirrored levels to whole percent instead of one decimal.
    pub round_battery: bool,
    /// Low threshold used by devices without their own.
    pub default_battery_low_threshold: u8,
    /// Jump in percent between readings that counts as a battery increase.
    pub battery_increase_threshold: u8,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            enable_replaced: true,
            hide_battery: false,
            round_battery: false,
            default_battery_low_threshold: DEFAULT_BATTERY_LOW_THRESHOLD,
            battery_increase_threshold: DEFAULT_BATTERY_INCREASE_THRESHOLD,
        }
    }
}

impl Options {
    /// Precision applied to mirrored battery levels.
    pub fn precision(&self) -> Precision {
        if self.round_battery {
            Precision::Whole
        } else {
            Precision::Tenths
        }
    }

    /// Check threshold ranges.
    pub fn validate(&self) -> Result<()> {
        if self.default_battery_low_threshold > MAX_THRESHOLD {
            return Err(Error::invalid_config(format!(
                "default_battery_low_threshold must be at most {}, got {}",
                MAX_THRESHOLD, self.default_battery_low_threshold
            )));
        }
        if self.battery_increase_threshold > MAX_THRESHOLD {
            return Err(Error::invalid_config(format!(
                "battery_increase_threshold must be at most {}, got {}",
                MAX_THRESHOLD, self.battery_increase_threshold
            )));
        }
        Ok(())
    }
}
