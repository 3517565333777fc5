//! Upstream telemetry state and value normalization.

use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Attribute mapping attached to a state.
pub type Attributes = BTreeMap<String, serde_json::Value>;

/// Sentinel value for an entity that cannot currently report.
pub const STATE_UNAVAILABLE: &str = "unavailable";
/// Sentinel value for an entity whose state is not known.
pub const STATE_UNKNOWN: &str = "unknown";
/// Binary "on" state. For a battery-low binary sensor this means low.
pub const STATE_ON: &str = "on";
/// Binary "off" state.
pub const STATE_OFF: &str = "off";

/// A state reported by an upstream telemetry entity.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TelemetryState {
    /// Raw state text, if any.
    pub value: Option<String>,
    /// Extra attributes reported alongside the state.
    #[cfg_attr(feature = "serde", serde(default))]
    pub attributes: Attributes,
    /// Whether the upstream considers itself available.
    pub is_available: bool,
}

impl TelemetryState {
    /// An available state with the given raw value.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            attributes: Attributes::new(),
            is_available: true,
        }
    }

    /// A state flagged unavailable by the upstream.
    pub fn unavailable() -> Self {
        Self {
            value: Some(STATE_UNAVAILABLE.to_string()),
            attributes: Attributes::new(),
            is_available: false,
        }
    }

    /// Add an attribute.
    #[must_use]
    pub fn with_attribute(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Returns true if the state carries no usable value.
    #[must_use]
    pub fn is_absent(&self) -> bool {
        if !self.is_available {
            return true;
        }
        match self.value.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(value) => {
                value.eq_ignore_ascii_case(STATE_UNAVAILABLE)
                    || value.eq_ignore_ascii_case(STATE_UNKNOWN)
            }
        }
    }

    /// The value as a finite number, if it parses as one.
    #[must_use]
    pub fn numeric_value(&self) -> Option<f64> {
        if self.is_absent() {
            return None;
        }
        self.value
            .as_deref()
            .and_then(|value| value.trim().parse::<f64>().ok())
            .filter(|value| value.is_finite())
    }

    /// The value as a binary flag (`on` is true), if it is one.
    #[must_use]
    pub fn binary_value(&self) -> Option<bool> {
        if self.is_absent() {
            return None;
        }
        match self.value.as_deref().map(str::trim) {
            Some(value) if value.eq_ignore_ascii_case(STATE_ON) => Some(true),
            Some(value) if value.eq_ignore_ascii_case(STATE_OFF) => Some(false),
            _ => None,
        }
    }
}

/// Decimal precision applied to mirrored battery levels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Precision {
    /// Round to whole percent.
    Whole,
    /// Round to one decimal place.
    #[default]
    Tenths,
}

impl Precision {
    /// Number of decimal places.
    #[must_use]
    pub fn decimals(self) -> u32 {
        match self {
            Precision::Whole => 0,
            Precision::Tenths => 1,
        }
    }

    /// Round a value to this precision, halves away from zero.
    ///
    /// # Examples
    ///
    /// ```
    /// use battery_notes_types::Precision;
    ///
    /// assert_eq!(Precision::Whole.round(42.5), 43.0);
    /// assert_eq!(Precision::Tenths.round(42.46), 42.5);
    /// ```
    #[must_use]
    pub fn round(self, value: f64) -> f64 {
        match self {
            Precision::Whole => value.round(),
            Precision::Tenths => (value * 10.0).round() / 10.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinels_are_absent() {
        assert!(TelemetryState::new("unknown").is_absent());
        assert!(TelemetryState::new("Unavailable").is_absent());
        assert!(TelemetryState::new("").is_absent());
        assert!(TelemetryState::unavailable().is_absent());
        assert!(!TelemetryState::new("55").is_absent());
    }

    #[test]
    fn test_unavailable_flag_wins_over_value() {
        let state = TelemetryState {
            value: Some("80".into()),
            attributes: Attributes::new(),
            is_available: false,
        };
        assert_eq!(state.numeric_value(), None);
    }

    #[test]
    fn test_numeric_parsing() {
        assert_eq!(TelemetryState::new("87.25").numeric_value(), Some(87.25));
        assert_eq!(TelemetryState::new(" 12 ").numeric_value(), Some(12.0));
        assert_eq!(TelemetryState::new("Low").numeric_value(), None);
        assert_eq!(TelemetryState::new("NaN").numeric_value(), None);
        assert_eq!(TelemetryState::new("inf").numeric_value(), None);
    }

    #[test]
    fn test_binary_parsing() {
        assert_eq!(TelemetryState::new("on").binary_value(), Some(true));
        assert_eq!(TelemetryState::new("OFF").binary_value(), Some(false));
        assert_eq!(TelemetryState::new("50").binary_value(), None);
    }

    #[test]
    fn test_precision_rounding() {
        assert_eq!(Precision::Whole.round(87.4), 87.0);
        assert_eq!(Precision::Tenths.round(87.44), 87.4);
        assert_eq!(Precision::Tenths.round(100.0), 100.0);
        assert_eq!(Precision::Whole.decimals(), 0);
        assert_eq!(Precision::Tenths.decimals(), 1);
    }

    #[test]
    fn test_with_attribute() {
        let state = TelemetryState::new("40").with_attribute("voltage", 2.9);
        assert_eq!(state.attributes["voltage"], serde_json::json!(2.9));
    }
}
