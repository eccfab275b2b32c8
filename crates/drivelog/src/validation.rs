//! Validation rules for new records.
//!
//! Which fields are mandatory depends on whether the candidate would be the
//! first record of its calendar day. That relation is derived from the store
//! contents at call time and never cached.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::datekey::day_key;
use crate::error::ValidationError;
use crate::record::{Field, Record, RecordDraft, Timestamp};

/// Fields that become mandatory for the first record of a day.
///
/// Deployments disagree on the alcohol check, so both switches are
/// configuration. Fuel is never mandatory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FirstOfDayRules {
    /// Require mileage on the first record of a day.
    pub mileage: bool,
    /// Require an alcohol-check reading on the first record of a day.
    pub alcohol_check: bool,
}

impl Default for FirstOfDayRules {
    fn default() -> Self {
        Self {
            mileage: true,
            alcohol_check: false,
        }
    }
}

impl FirstOfDayRules {
    /// Whether `field` is mandatory on the first record of a day.
    #[must_use]
    pub fn requires(&self, field: Field) -> bool {
        match field {
            Field::Mileage => self.mileage,
            Field::AlcoholCheck => self.alcohol_check,
            Field::FuelRecord => false,
        }
    }
}

/// A draft that passed validation, with trimmed text and parsed numbers.
///
/// Id and timestamp are assigned by the store when it is inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidRecord {
    /// Trimmed, non-empty destination.
    pub destination: String,
    /// Parsed mileage.
    pub mileage: Option<f64>,
    /// Parsed alcohol-check reading.
    pub alcohol_check: Option<f64>,
    /// Parsed fuel amount.
    pub fuel_record: Option<f64>,
    /// Timestamp the record will carry.
    pub timestamp: Timestamp,
}

/// True iff no existing record falls on the candidate's calendar day.
#[must_use]
pub fn is_first_record_of_day(existing: &[Record], candidate: &Timestamp) -> bool {
    let day = day_key(candidate);
    !existing.iter().any(|r| day_key(&r.timestamp) == day)
}

/// Validate a draft against the current store contents.
///
/// `now` stands in for the timestamp when the draft does not carry one.
///
/// # Errors
///
/// Returns the first rule the draft breaks, checked in this order:
/// destination, numeric parsing, first-of-day mileage, first-of-day alcohol
/// check.
pub fn validate_candidate(
    existing: &[Record],
    draft: &RecordDraft,
    rules: &FirstOfDayRules,
    now: Timestamp,
) -> Result<ValidRecord, ValidationError> {
    let destination = draft.destination.trim();
    if destination.is_empty() {
        return Err(ValidationError::MissingDestination);
    }

    let mileage = parse_reading(draft, Field::Mileage)?;
    let alcohol_check = parse_reading(draft, Field::AlcoholCheck)?;
    let fuel_record = parse_reading(draft, Field::FuelRecord)?;

    let timestamp = draft.timestamp.unwrap_or(now);
    if is_first_record_of_day(existing, &timestamp) {
        trace!(day = %day_key(&timestamp), "candidate is first record of its day");
        if rules.requires(Field::Mileage) && mileage.is_none() {
            return Err(ValidationError::MissingMileage);
        }
        if rules.requires(Field::AlcoholCheck) && alcohol_check.is_none() {
            return Err(ValidationError::MissingAlcoholCheck);
        }
    }

    Ok(ValidRecord {
        destination: destination.to_string(),
        mileage,
        alcohol_check,
        fuel_record,
        timestamp,
    })
}

/// Parse one numeric field; blank text is treated as absent.
fn parse_reading(draft: &RecordDraft, field: Field) -> Result<Option<f64>, ValidationError> {
    let Some(raw) = draft.raw(field).map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    let value: f64 = raw
        .replace(',', "")
        .parse()
        .ok()
        .filter(|v: &f64| v.is_finite())
        .ok_or_else(|| ValidationError::InvalidNumber {
            field,
            value: raw.to_string(),
        })?;
    if value < 0.0 {
        return Err(ValidationError::NegativeReading { field });
    }
    Ok(Some(value))
}
