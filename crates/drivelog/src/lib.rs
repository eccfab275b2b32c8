//! `drivelog` - A personal driving-log record keeper
//!
//! This library provides the record engine behind the `drivelog` binary:
//! validated trip records, per-day and per-month views, JSON export and
//! deduplicating import, with destructive actions gated behind an explicit
//! confirmation. The engine is driven through [`DrivingLog::handle`] and never
//! touches files or the terminal itself; the [`storage`] and [`cli`] modules
//! are the host side.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod datekey;
pub mod engine;
pub mod error;
pub mod grouping;
pub mod logging;
pub mod record;
pub mod storage;
pub mod store;
pub mod transfer;
pub mod validation;

pub use config::Config;
pub use datekey::{DayKey, MonthKey};
pub use engine::{DrivingLog, Event, Input, LogView, PendingAction, PendingKind};
pub use error::{Error, NotFoundError, ParseError, Result, ValidationError};
pub use logging::init_logging;
pub use record::{Clock, Record, RecordDraft, RecordId, SystemClock, Timestamp};
pub use storage::{Snapshot, Storage, StorageStats};
pub use store::RecordStore;
pub use transfer::{FileSource, ImportSource, MergeOutcome, MergePolicy};
pub use validation::FirstOfDayRules;
