//! Core record types for drivelog.
//!
//! This module defines the fundamental data structures for representing
//! driving-log entries and the raw drafts the view layer submits.

use std::str::FromStr;

use chrono::{DateTime, FixedOffset, Local};
use serde::{Deserialize, Serialize};

/// A point in time together with the UTC offset that was local when it was
/// recorded. Calendar keys are computed in that offset.
pub type Timestamp = DateTime<FixedOffset>;

/// Identifier of a stored record.
///
/// Ids generated by the store are sequential integers. Imported payloads may
/// carry opaque string ids, which are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    /// Store-generated sequential id.
    Seq(u64),
    /// Opaque id from an external source.
    Opaque(String),
}

impl RecordId {
    /// The sequential value, if this is a store-generated id.
    #[must_use]
    pub fn as_seq(&self) -> Option<u64> {
        match self {
            Self::Seq(n) => Some(*n),
            Self::Opaque(_) => None,
        }
    }

    /// Interpret id text. Canonical decimal text (`"7"`) is a sequential id;
    /// anything else, including `"007"` or `"+7"`, stays opaque.
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        match text.parse::<u64>() {
            Ok(n) if n.to_string() == text => Self::Seq(n),
            _ => Self::Opaque(text.to_string()),
        }
    }

    /// Fold opaque ids spelled as canonical decimals into [`RecordId::Seq`].
    ///
    /// After this every id has exactly one text form, which is what storage
    /// and the command line work with.
    #[must_use]
    pub fn canonical(self) -> Self {
        match self {
            Self::Opaque(text) => Self::from_text(&text),
            seq @ Self::Seq(_) => seq,
        }
    }

    /// An opaque id made only of whitespace carries no identity.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Seq(_) => false,
            Self::Opaque(s) => s.trim().is_empty(),
        }
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Seq(n) => write!(f, "{n}"),
            Self::Opaque(s) => write!(f, "{s}"),
        }
    }
}

impl FromStr for RecordId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_text(s.trim()))
    }
}

/// Optional numeric fields of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    /// Odometer reading or distance travelled.
    Mileage,
    /// Breath alcohol-check reading.
    AlcoholCheck,
    /// Fuel amount.
    FuelRecord,
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mileage => write!(f, "mileage"),
            Self::AlcoholCheck => write!(f, "alcohol check"),
            Self::FuelRecord => write!(f, "fuel record"),
        }
    }
}

/// A stored driving-log entry.
///
/// Records are created by the store after validation and never mutated in
/// place. Absent readings serialize as `null`, which keeps them distinct from
/// a zero reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Unique identifier, never reused.
    pub id: RecordId,

    /// When the trip entry was made.
    pub timestamp: Timestamp,

    /// Odometer reading or distance travelled.
    pub mileage: Option<f64>,

    /// Where the trip went. Never empty.
    pub destination: String,

    /// Alcohol-check reading.
    pub alcohol_check: Option<f64>,

    /// Fuel amount.
    pub fuel_record: Option<f64>,
}

/// Raw field values gathered by the view layer for a new record.
///
/// Numeric fields are kept as text; empty or whitespace-only text means the
/// field was left blank.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordDraft {
    /// Destination as typed.
    pub destination: String,
    /// Mileage as typed.
    pub mileage: Option<String>,
    /// Alcohol-check reading as typed.
    pub alcohol_check: Option<String>,
    /// Fuel amount as typed.
    pub fuel_record: Option<String>,
    /// Explicit timestamp; the store's clock is used when absent.
    pub timestamp: Option<Timestamp>,
}

impl RecordDraft {
    /// Start a draft with only a destination.
    #[must_use]
    pub fn new(destination: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            ..Self::default()
        }
    }

    /// Set the mileage text.
    #[must_use]
    pub fn mileage(mut self, value: impl Into<String>) -> Self {
        self.mileage = Some(value.into());
        self
    }

    /// Set the alcohol-check text.
    #[must_use]
    pub fn alcohol_check(mut self, value: impl Into<String>) -> Self {
        self.alcohol_check = Some(value.into());
        self
    }

    /// Set the fuel text.
    #[must_use]
    pub fn fuel_record(mut self, value: impl Into<String>) -> Self {
        self.fuel_record = Some(value.into());
        self
    }

    /// Pin the timestamp instead of reading the clock.
    #[must_use]
    pub fn at(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Raw text of one of the numeric fields.
    #[must_use]
    pub fn raw(&self, field: Field) -> Option<&str> {
        match field {
            Field::Mileage => self.mileage.as_deref(),
            Field::AlcoholCheck => self.alcohol_check.as_deref(),
            Field::FuelRecord => self.fuel_record.as_deref(),
        }
    }
}

/// Source of the current time.
pub trait Clock: std::fmt::Debug {
    /// The current time in the local offset.
    fn now(&self) -> Timestamp;
}

/// Wall clock in the system's local offset.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Local::now().fixed_offset()
    }
}

/// A clock that always returns the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub Timestamp);

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.0
    }
}
