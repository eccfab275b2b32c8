//! `drivelog` - CLI for the driving-log engine
//!
//! This binary loads the configured database, turns each command into engine
//! inputs, renders the resulting events and saves the store afterwards.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::debug;

use drivelog::cli::{
    AddCommand, Cli, Command, ConfigCommand, ExportCommand, ImportCommand, ListCommand,
    OutputFormat,
};
use drivelog::datekey::format_time;
use drivelog::grouping::Chronology;
use drivelog::{
    init_logging, Config, DrivingLog, Event, FileSource, Input, LogView, MergeOutcome,
    MergePolicy, Record, RecordStore, Storage, SystemClock,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone())?;

    match cli.command {
        Command::Config(config_cmd) => handle_config(&config, config_cmd),
        Command::Status => handle_status(&config),
        command => {
            let mut session = Session::open(&config)?;
            session.run(command).await
        }
    }
}

/// An opened database plus the engine restored from it.
#[derive(Debug)]
struct Session {
    storage: Storage,
    log: DrivingLog,
}

impl Session {
    fn open(config: &Config) -> anyhow::Result<Self> {
        let storage = Storage::open(config.database_path())?;
        let snapshot = storage.load()?;
        debug!(
            "Loaded {} records from {}",
            snapshot.records.len(),
            storage.path().display()
        );

        let store = RecordStore::restore(
            snapshot.records,
            snapshot.next_id,
            config.rules.first_of_day,
            Box::new(SystemClock),
        );
        let log = DrivingLog::new(store).with_day_order(config.display.within_day());
        Ok(Self { storage, log })
    }

    async fn run(&mut self, command: Command) -> anyhow::Result<()> {
        match command {
            Command::Add(cmd) => self.add(&cmd),
            Command::Delete(cmd) => {
                let event = self.log.handle(Input::Delete(cmd.id));
                self.finish(event)
            }
            Command::Clear(cmd) => {
                let event = self.log.handle(Input::ClearAll);
                let event = self.resolve(event, cmd.yes)?;
                self.finish(event)
            }
            Command::List(cmd) => self.list(&cmd),
            Command::Months(cmd) => {
                let view = self.view();
                if cmd.json {
                    println!("{}", serde_json::to_string_pretty(&view.months)?);
                } else if view.months.is_empty() {
                    println!("No records.");
                } else {
                    for month in &view.months {
                        println!("{month}");
                    }
                }
                Ok(())
            }
            Command::Export(cmd) => self.export(&cmd).await,
            Command::Import(cmd) => self.import(&cmd).await,
            Command::Status | Command::Config(_) => Ok(()),
        }
    }

    fn add(&mut self, cmd: &AddCommand) -> anyhow::Result<()> {
        let event = self.log.handle(Input::Submit(cmd.to_draft()));
        self.finish(event)
    }

    fn list(&mut self, cmd: &ListCommand) -> anyhow::Result<()> {
        self.log.handle(Input::SelectMonth(cmd.month));
        if cmd.oldest_first {
            self.log.set_day_order(Chronology::Ascending);
        }
        let view = self.view();

        match cmd.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&view)?),
            OutputFormat::Plain => print_plain(&view),
            OutputFormat::Table => print_table(&view),
        }
        Ok(())
    }

    async fn export(&mut self, cmd: &ExportCommand) -> anyhow::Result<()> {
        let event = self.log.handle(Input::Export);
        let (contents, filename) = match event {
            Event::ExportReady { contents, filename } => (contents, filename),
            other => return self.finish(other),
        };

        match cmd.output.as_deref() {
            Some(path) if path.as_os_str() == "-" => println!("{contents}"),
            output => {
                let path = output.map_or_else(|| PathBuf::from(&filename), PathBuf::from);
                tokio::fs::write(&path, contents)
                    .await
                    .with_context(|| format!("failed to write {}", path.display()))?;
                println!(
                    "Exported {} records to {}",
                    self.log.store().len(),
                    path.display()
                );
            }
        }
        Ok(())
    }

    async fn import(&mut self, cmd: &ImportCommand) -> anyhow::Result<()> {
        let policy = if cmd.replace {
            MergePolicy::Replace
        } else {
            MergePolicy::AdditiveDedup
        };
        let source = FileSource::new(&cmd.file);
        let event = self.log.import_from(&source, policy).await;
        let event = self.resolve(event, cmd.yes)?;
        self.finish(event)
    }

    /// Answer a confirmation request from `--yes` or the terminal.
    fn resolve(&mut self, event: Event, yes: bool) -> anyhow::Result<Event> {
        let Event::ConfirmationRequired(kind) = event else {
            return Ok(event);
        };
        let input = if yes || prompt(&format!("Really {kind}?"))? {
            Input::Confirm
        } else {
            Input::Cancel
        };
        Ok(self.log.handle(input))
    }

    /// Persist the store, then report the event.
    fn finish(&mut self, event: Event) -> anyhow::Result<()> {
        let store = self.log.store();
        if self.storage.save(store.all(), store.next_id())? {
            debug!("Store saved");
        }
        report(&event)
    }

    fn view(&self) -> LogView {
        self.log.view(&self.log.store().now())
    }
}

/// Print an event; rejections become a non-zero exit.
fn report(event: &Event) -> anyhow::Result<()> {
    match event {
        Event::RecordAdded(record) => {
            println!(
                "Added #{} {} {}",
                record.id,
                record.timestamp.format("%Y-%m-%d %H:%M"),
                record.destination
            );
        }
        Event::RecordRemoved(id) => println!("Deleted #{id}"),
        Event::StoreCleared { removed } => println!("Cleared {removed} records."),
        Event::ImportMerged { outcome, policy } => match outcome {
            MergeOutcome::Added(n) => println!("Imported {n} new records ({policy})."),
            MergeOutcome::NothingNew => println!("No new records to import."),
            MergeOutcome::Replaced(n) => println!("Replaced all records with {n} imported."),
        },
        Event::Cancelled(kind) => println!("Cancelled: {kind}."),
        Event::FilterChanged(_) | Event::NothingPending => {}
        Event::ExportReady { filename, .. } => println!("Export ready: {filename}"),
        Event::ConfirmationRequired(kind) => println!("Confirmation required to {kind}."),
        Event::ValidationRejected(err) => bail!("{err}"),
        Event::NotFound(err) => bail!("{err}"),
        Event::ImportRejected(err) => bail!("{err}"),
        Event::ExportFailed { cause } => bail!("export failed: {cause}"),
    }
    Ok(())
}

fn prompt(question: &str) -> io::Result<bool> {
    print!("{question} [y/N] ");
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(
        answer.trim().to_ascii_lowercase().as_str(),
        "y" | "yes"
    ))
}

fn reading(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

fn describe(record: &Record) -> String {
    let mut parts = vec![record.destination.clone()];
    if let Some(mileage) = record.mileage {
        parts.push(format!("mileage {mileage}"));
    }
    if let Some(alcohol) = record.alcohol_check {
        parts.push(format!("alcohol {alcohol}"));
    }
    if let Some(fuel) = record.fuel_record {
        parts.push(format!("fuel {fuel}"));
    }
    parts.join("  ")
}

fn print_heading(view: &LogView) {
    match view.month {
        Some(month) => println!("{month}: {} records", view.count),
        None => println!("All months: {} records", view.count),
    }
}

fn print_plain(view: &LogView) {
    print_heading(view);
    if view.days.is_empty() {
        println!("No records.");
        return;
    }
    for day in &view.days {
        println!();
        println!("{}  (total {})", day.label, day.total_mileage);
        for record in &day.records {
            println!(
                "  {}  #{:<6} {}",
                format_time(&record.timestamp),
                record.id.to_string(),
                describe(record)
            );
        }
    }
}

fn print_table(view: &LogView) {
    print_heading(view);
    println!();
    println!(
        "{:<10}  {:<5}  {:<8}  {:<24}  {:>10}  {:>8}  {:>8}",
        "Date", "Time", "Id", "Destination", "Mileage", "Alcohol", "Fuel"
    );
    println!("{}", "-".repeat(83));
    for day in &view.days {
        for record in &day.records {
            println!(
                "{:<10}  {:<5}  {:<8}  {:<24}  {:>10}  {:>8}  {:>8}",
                day.day.to_string(),
                format_time(&record.timestamp),
                record.id.to_string(),
                record.destination,
                reading(record.mileage),
                reading(record.alcohol_check),
                reading(record.fuel_record)
            );
        }
    }
}

fn handle_status(config: &Config) -> anyhow::Result<()> {
    let storage = Storage::open(config.database_path())?;
    let stats = storage.stats()?;
    let stamp = |t: Option<drivelog::Timestamp>| {
        t.map_or_else(|| "-".to_string(), |t| t.format("%Y-%m-%d %H:%M").to_string())
    };

    println!("drivelog status");
    println!("---------------");
    println!("Database:      {}", storage.path().display());
    println!("Records:       {}", stats.total_records);
    println!("Oldest:        {}", stamp(stats.oldest_record));
    println!("Newest:        {}", stamp(stats.newest_record));
    println!("Size:          {} bytes", stats.db_size_bytes);
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                let rules = &config.rules.first_of_day;
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!();
                println!("[Rules: first record of the day]");
                println!("  Mileage required:   {}", rules.mileage);
                println!("  Alcohol required:   {}", rules.alcohol_check);
                println!();
                println!("[Display]");
                println!("  Newest first:       {}", config.display.newest_first);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => bail!("configuration error: {e}"),
            }
        }
    }
    Ok(())
}
