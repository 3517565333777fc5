//! Day-precision date handling.
//!
//! Replacement dates are kept as calendar dates with no time-of-day so a
//! device moving between timezones never shifts the recorded day. Hosts that
//! expect a full timestamp get the date widened to midnight UTC.

use time::macros::format_description;
use time::{Date, OffsetDateTime};

use crate::error::{MetadataError, MetadataResult};

/// Format a date as `YYYY-MM-DD`.
#[must_use]
pub fn format_date(date: Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

/// Parse a `YYYY-MM-DD` date.
///
/// Older records stored a full datetime (`2024-01-15T10:20:30` or
/// `2024-01-15 10:20:30.123456`); those are accepted and the time portion is
/// discarded.
///
/// # Examples
///
/// ```
/// use battery_notes_types::parse_date;
///
/// let date = parse_date("2024-01-15").unwrap();
/// assert_eq!(parse_date("2024-01-15T23:59:00").unwrap(), date);
/// assert!(parse_date("15/01/2024").is_err());
/// ```
pub fn parse_date(input: &str) -> MetadataResult<Date> {
    let trimmed = input.trim();
    let invalid = || MetadataError::InvalidDate(input.to_string());

    let (head, rest) = if trimmed.len() > 10 {
        let head = trimmed.get(..10).ok_or_else(invalid)?;
        (head, &trimmed[10..])
    } else {
        (trimmed, "")
    };

    if !(rest.is_empty() || rest.starts_with('T') || rest.starts_with(' ')) {
        return Err(invalid());
    }

    let format = format_description!("[year]-[month]-[day]");
    Date::parse(head, format).map_err(|_| invalid())
}

/// Truncate a timestamp to its calendar day, in the timestamp's own offset.
#[must_use]
pub fn truncate_to_day(timestamp: OffsetDateTime) -> Date {
    timestamp.date()
}

/// Widen a date to a timestamp at 00:00 UTC.
#[must_use]
pub fn day_start_utc(date: Date) -> OffsetDateTime {
    date.midnight().assume_utc()
}

/// Serde adapter for `Option<Date>` fields stored as `YYYY-MM-DD` strings.
#[cfg(feature = "serde")]
pub mod serde_opt {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::Date;

    pub fn serialize<S: Serializer>(date: &Option<Date>, serializer: S) -> Result<S::Ok, S::Error> {
        match date {
            Some(date) => serializer.serialize_str(&super::format_date(*date)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Date>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        raw.map(|s| super::parse_date(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use time::macros::{date, datetime};

    #[test]
    fn test_format_date_pads_fields() {
        assert_eq!(format_date(date!(2024 - 03 - 07)), "2024-03-07");
    }

    #[test]
    fn test_parse_legacy_datetime_strings() {
        let expected = date!(2023 - 11 - 02);
        assert_eq!(parse_date("2023-11-02").unwrap(), expected);
        assert_eq!(parse_date("2023-11-02T08:15:00").unwrap(), expected);
        assert_eq!(parse_date("2023-11-02 08:15:00.123456").unwrap(), expected);
        assert_eq!(parse_date(" 2023-11-02 ").unwrap(), expected);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_date("").is_err());
        assert!(parse_date("yesterday").is_err());
        assert!(parse_date("2023-13-02").is_err());
        assert!(parse_date("2023-11-02X08").is_err());
    }

    #[test]
    fn test_truncate_uses_timestamp_offset() {
        let late = datetime!(2024-01-15 23:30 -05:00);
        assert_eq!(truncate_to_day(late), date!(2024 - 01 - 15));
    }

    #[test]
    fn test_day_start_is_utc_midnight() {
        let ts = day_start_utc(date!(2024 - 01 - 15));
        assert_eq!(ts, datetime!(2024-01-15 00:00 UTC));
    }

    proptest! {
        #[test]
        fn prop_truncated_date_survives_text_round_trip(secs in 0i64..4_102_444_800) {
            let ts = OffsetDateTime::from_unix_timestamp(secs).unwrap();
            let day = truncate_to_day(ts);
            prop_assert_eq!(parse_date(&format_date(day)).unwrap(), day);
            prop_assert_eq!(day_start_utc(day).date(), day);
        }
    }
}
