//! Command-line interface for drivelog.
//!
//! This module provides the CLI structure for the `drivelog` binary, which
//! plays the view-layer role for the record engine.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    AddCommand, ClearCommand, ConfigCommand, DeleteCommand, ExportCommand, ImportCommand,
    ListCommand, MonthsCommand, OutputFormat,
};

/// drivelog - Keep a personal driving log
///
/// Record trips with mileage, destination and optional alcohol-check and fuel
/// readings, then browse them by day and month.
#[derive(Debug, Parser)]
#[command(name = "drivelog")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Add a trip record
    Add(AddCommand),

    /// Delete a record by id
    Delete(DeleteCommand),

    /// Delete every record
    Clear(ClearCommand),

    /// List records grouped by day
    List(ListCommand),

    /// List months that have records
    Months(MonthsCommand),

    /// Export all records as JSON
    Export(ExportCommand),

    /// Import records from an export file
    Import(ImportCommand),

    /// Show storage status
    Status,

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Verbose,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }
}
