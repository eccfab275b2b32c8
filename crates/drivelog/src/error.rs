//! Error types for drivelog.
//!
//! The record engine reports recoverable failures as small value types
//! ([`ValidationError`], [`NotFoundError`], [`ParseError`]) so the view layer
//! can turn them into user-facing messages. Host-level failures (database,
//! configuration, I/O) are collected in the crate-wide [`Error`].

use std::path::PathBuf;
use thiserror::Error;

use crate::record::{Field, RecordId};

/// A candidate record was rejected by the validation rules.
///
/// No state is mutated when this is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Destination was empty after trimming.
    #[error("destination is required")]
    MissingDestination,

    /// The first record of a day must carry a mileage reading.
    #[error("mileage is required for the first record of the day")]
    MissingMileage,

    /// The first record of a day must carry an alcohol-check reading.
    #[error("alcohol check is required for the first record of the day")]
    MissingAlcoholCheck,

    /// A numeric field could not be parsed as a finite number.
    #[error("{field} must be a number, got '{value}'")]
    InvalidNumber {
        /// The offending field.
        field: Field,
        /// The raw input.
        value: String,
    },

    /// A numeric reading was below zero.
    #[error("{field} cannot be negative")]
    NegativeReading {
        /// The offending field.
        field: Field,
    },

    /// Every sequential id up to `u64::MAX` has been handed out or imported.
    #[error("no record ids left")]
    IdsExhausted,
}

/// Deletion targeted an id that is not in the store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("no record with id {id}")]
pub struct NotFoundError {
    /// The id that was requested.
    pub id: RecordId,
}

/// An import payload could not be turned into records.
///
/// The store is never touched when this is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The payload is not JSON, or its top level is not an array.
    #[error("malformed import payload: {cause}")]
    MalformedPayload {
        /// Human-readable cause.
        cause: String,
    },

    /// The payload contained no usable record.
    #[error("import contains no valid records ({skipped} entries skipped)")]
    EmptyOrAllInvalid {
        /// Number of entries that were rejected.
        skipped: usize,
    },

    /// The import source could not be read.
    #[error("failed to read import: {cause}")]
    Unreadable {
        /// Human-readable cause.
        cause: String,
    },
}

impl ParseError {
    /// Create a malformed-payload error.
    #[must_use]
    pub fn malformed(cause: impl Into<String>) -> Self {
        Self::MalformedPayload {
            cause: cause.into(),
        }
    }
}

/// The main error type for drivelog host operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    /// A stored row could not be decoded.
    #[error("corrupt record row {id}: {message}")]
    CorruptRow {
        /// Stored id of the row.
        id: String,
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === I/O Errors ===
    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for drivelog operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a corrupt-row error.
    #[must_use]
    pub fn corrupt_row(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CorruptRow {
            id: id.into(),
            message: message.into(),
        }
    }
}
