//! Database date/time string conventions.
//!
//! Dates travel to and from the database as compact digit strings:
//!
//! | format        | pattern          | example          |
//! |---------------|------------------|------------------|
//! | date only     | `YYYYMMDD`       | `20240131`       |
//! | time only     | `hhmmss` (24h)   | `235959`         |
//! | date and time | `YYYYMMDDhhmmss` | `20240131235959` |

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// Which part of a timestamp is relevant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateFormat {
    /// Only the calendar date.
    DateOnly,
    /// Only the time of day.
    TimeOnly,
    /// Date and time of day.
    DateAndTime,
}

impl DateFormat {
    /// The `chrono` format pattern for this format.
    #[must_use]
    pub fn pattern(&self) -> &'static str {
        match self {
            Self::DateOnly => "%Y%m%d",
            Self::TimeOnly => "%H%M%S",
            Self::DateAndTime => "%Y%m%d%H%M%S",
        }
    }

    /// Format a timestamp, keeping only the parts this format covers.
    #[must_use]
    pub fn format(&self, value: &NaiveDateTime) -> String {
        value.format(self.pattern()).to_string()
    }
}

/// Parse a `YYYYMMDD` string.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), DateFormat::DateOnly.pattern()).ok()
}

/// Parse an `hhmmss` string.
pub fn parse_time(text: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(text.trim(), DateFormat::TimeOnly.pattern()).ok()
}

/// Parse a `YYYYMMDDhhmmss` string.
pub fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text.trim(), DateFormat::DateAndTime.pattern()).ok()
}
