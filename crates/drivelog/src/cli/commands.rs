//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};
use chrono::DateTime;

use crate::datekey::MonthKey;
use crate::record::{RecordDraft, RecordId, Timestamp};

/// Add command arguments.
#[derive(Debug, Args)]
pub struct AddCommand {
    /// Where the trip went
    pub destination: String,

    /// Odometer reading or distance (required for the day's first record)
    #[arg(short, long)]
    pub mileage: Option<String>,

    /// Alcohol-check reading
    #[arg(short, long)]
    pub alcohol: Option<String>,

    /// Fuel amount
    #[arg(short, long)]
    pub fuel: Option<String>,

    /// Record time as RFC 3339 (defaults to now)
    #[arg(long, value_name = "TIMESTAMP", value_parser = parse_timestamp)]
    pub at: Option<Timestamp>,
}

impl AddCommand {
    /// Convert the arguments into a draft for the engine.
    #[must_use]
    pub fn to_draft(&self) -> RecordDraft {
        RecordDraft {
            destination: self.destination.clone(),
            mileage: self.mileage.clone(),
            alcohol_check: self.alcohol.clone(),
            fuel_record: self.fuel.clone(),
            timestamp: self.at,
        }
    }
}

/// Delete command arguments.
#[derive(Debug, Args)]
pub struct DeleteCommand {
    /// Id of the record to delete
    #[arg(value_parser = parse_record_id)]
    pub id: RecordId,
}

/// Clear command arguments.
#[derive(Debug, Args)]
pub struct ClearCommand {
    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

/// List command arguments.
#[derive(Debug, Args)]
pub struct ListCommand {
    /// Only show this month (YYYY-MM)
    #[arg(short, long, value_parser = parse_month)]
    pub month: Option<MonthKey>,

    /// List each day's records oldest first
    #[arg(long)]
    pub oldest_first: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "plain")]
    pub format: OutputFormat,
}

/// Months command arguments.
#[derive(Debug, Args)]
pub struct MonthsCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Export command arguments.
#[derive(Debug, Args)]
pub struct ExportCommand {
    /// Output file (defaults to a date-stamped name in the current directory, `-` for stdout)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

/// Import command arguments.
#[derive(Debug, Args)]
pub struct ImportCommand {
    /// File produced by `export`
    pub file: PathBuf,

    /// Replace all existing records instead of adding new ones
    #[arg(long)]
    pub replace: bool,

    /// Skip confirmation prompt when replacing
    #[arg(short, long)]
    pub yes: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Output format for commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Plain text output
    #[default]
    Plain,
    /// Formatted table
    Table,
    /// JSON output
    Json,
}

fn parse_timestamp(s: &str) -> Result<Timestamp, String> {
    DateTime::parse_from_rfc3339(s).map_err(|e| format!("expected RFC 3339 timestamp: {e}"))
}

fn parse_month(s: &str) -> Result<MonthKey, String> {
    s.parse().map_err(|e| format!("{e}, expected YYYY-MM"))
}

fn parse_record_id(s: &str) -> Result<RecordId, String> {
    let id: RecordId = s.parse().map_err(|e| format!("{e}"))?;
    if id.is_blank() {
        return Err("record id cannot be empty".to_string());
    }
    Ok(id)
}
