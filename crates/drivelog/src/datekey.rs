//! Calendar keys for grouping records by day and month.
//!
//! Keys are computed in the offset carried by each timestamp, so a record
//! made at 23:30 local time stays on that local day.

use std::str::FromStr;

use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::record::Timestamp;

/// A calendar day, displayed as `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct DayKey(NaiveDate);

/// A calendar month, displayed as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl DayKey {
    /// The calendar date.
    #[must_use]
    pub fn date(self) -> NaiveDate {
        self.0
    }

    /// The month this day belongs to.
    #[must_use]
    pub fn month(self) -> MonthKey {
        MonthKey {
            year: self.0.year(),
            month: self.0.month(),
        }
    }
}

impl From<NaiveDate> for DayKey {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}

impl MonthKey {
    /// Build a month key, rejecting months outside 1..=12.
    #[must_use]
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    /// Calendar year.
    #[must_use]
    pub fn year(self) -> i32 {
        self.year
    }

    /// Calendar month, 1-based.
    #[must_use]
    pub fn month(self) -> u32 {
        self.month
    }
}

impl std::fmt::Display for DayKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl std::fmt::Display for MonthKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Error returned when a key string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind} key '{input}'")]
pub struct KeyParseError {
    kind: &'static str,
    input: String,
}

impl FromStr for DayKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(Self)
            .map_err(|_| KeyParseError {
                kind: "day",
                input: s.to_string(),
            })
    }
}

impl FromStr for MonthKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || KeyParseError {
            kind: "month",
            input: s.to_string(),
        };
        let (year, month) = s.trim().split_once('-').ok_or_else(err)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(err());
        }
        let year = year.parse().map_err(|_| err())?;
        let month = month.parse().map_err(|_| err())?;
        Self::new(year, month).ok_or_else(err)
    }
}

impl From<DayKey> for String {
    fn from(key: DayKey) -> Self {
        key.to_string()
    }
}

impl From<MonthKey> for String {
    fn from(key: MonthKey) -> Self {
        key.to_string()
    }
}

impl TryFrom<String> for DayKey {
    type Error = KeyParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl TryFrom<String> for MonthKey {
    type Error = KeyParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Calendar day of a timestamp.
#[must_use]
pub fn day_key(timestamp: &Timestamp) -> DayKey {
    DayKey(timestamp.date_naive())
}

/// Calendar month of a timestamp.
#[must_use]
pub fn month_key(timestamp: &Timestamp) -> MonthKey {
    day_key(timestamp).month()
}

/// Human label for a day relative to `reference_now`.
///
/// Returns `Today`, `Yesterday`, or `YYYY/MM/DD (Www)`.
#[must_use]
pub fn format_day_label(day: DayKey, reference_now: &Timestamp) -> String {
    let today = day_key(reference_now).date();
    if day.date() == today {
        return "Today".to_string();
    }
    if today.checked_sub_days(Days::new(1)) == Some(day.date()) {
        return "Yesterday".to_string();
    }
    day.date().format("%Y/%m/%d (%a)").to_string()
}

/// Clock time of a timestamp as `HH:MM`.
#[must_use]
pub fn format_time(timestamp: &Timestamp) -> String {
    timestamp.format("%H:%M").to_string()
}
