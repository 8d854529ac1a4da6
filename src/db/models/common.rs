//! Types shared across models.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// Dates are stored and exchanged as `YYYY-MM-DD`.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Wall-clock times are stored and exchanged as `HH:MM`.
pub const TIME_FORMAT: &str = "%H:%M";

/// Start/end wall-clock pair of an appointment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeRange {
    pub start: String,
    pub end: String,
}

impl TimeRange {
    /// Parse both ends and require `start < end`.
    pub fn parse(start: &str, end: &str) -> Result<Self, String> {
        let s = parse_time(start)?;
        let e = parse_time(end)?;
        if s >= e {
            return Err("start must be before end".to_string());
        }
        Ok(Self {
            start: s.format(TIME_FORMAT).to_string(),
            end: e.format(TIME_FORMAT).to_string(),
        })
    }
}

/// A named break in a technician's day (e.g. "lunch", 12:00-13:00).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BreakTime {
    pub name: String,
    pub start: String,
    pub end: String,
}

/// Helper to parse break times JSON from database
pub fn parse_break_times(json: Option<&str>) -> Vec<BreakTime> {
    json.and_then(|s| serde_json::from_str(s).ok())
        .unwrap_or_default()
}

/// Helper to serialize break times to JSON for database
pub fn serialize_break_times(breaks: &[BreakTime]) -> Option<String> {
    if breaks.is_empty() {
        None
    } else {
        serde_json::to_string(breaks).ok()
    }
}

pub fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|_| format!("'{}' is not a date (expected YYYY-MM-DD)", value))
}

pub fn parse_time(value: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(value.trim(), TIME_FORMAT)
        .map_err(|_| format!("'{}' is not a time (expected HH:MM)", value))
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Convert an SQLite integer flag to bool.
pub fn flag(value: i64) -> bool {
    value != 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_range_requires_start_before_end() {
        let range = TimeRange::parse("09:00", "10:30").unwrap();
        assert_eq!(range.start, "09:00");
        assert_eq!(range.end, "10:30");

        assert!(TimeRange::parse("10:30", "09:00").is_err());
        assert!(TimeRange::parse("10:00", "10:00").is_err());
    }

    #[test]
    fn test_time_range_normalizes_format() {
        let range = TimeRange::parse(" 9:05", "17:00 ").unwrap();
        assert_eq!(range.start, "09:05");
    }

    #[test]
    fn test_time_range_rejects_garbage() {
        assert!(TimeRange::parse("nine", "10:00").is_err());
        assert!(TimeRange::parse("09:00", "25:00").is_err());
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("2024-03-01").unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
        );
        assert!(parse_date("01/03/2024").is_err());
        assert!(parse_date("2024-02-30").is_err());
    }

    #[test]
    fn test_break_times_json() {
        let breaks = vec![BreakTime {
            name: "lunch".into(),
            start: "12:00".into(),
            end: "13:00".into(),
        }];
        let json = serialize_break_times(&breaks);
        assert_eq!(parse_break_times(json.as_deref()), breaks);
        assert_eq!(serialize_break_times(&[]), None);
        assert!(parse_break_times(Some("not json")).is_empty());
    }
}
