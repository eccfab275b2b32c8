//! Export snapshots and import merging.
//!
//! The portable format is a JSON array of flat objects with the fields
//! `id`, `timestamp`, `mileage`, `destination`, `alcoholCheck` and
//! `fuelRecord`. Absent readings are written as `null`.

use std::collections::HashSet;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::ParseError;
use crate::record::{Record, RecordId, Timestamp};

/// How imported records are combined with the existing ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Keep existing records, add imported records with unseen ids.
    AdditiveDedup,
    /// Discard existing records and adopt the imported set.
    Replace,
}

impl std::fmt::Display for MergePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AdditiveDedup => write!(f, "additive"),
            Self::Replace => write!(f, "replace"),
        }
    }
}

/// What a merge did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "count")]
pub enum MergeOutcome {
    /// This many imported records were new.
    Added(usize),
    /// Every imported id already existed.
    NothingNew,
    /// The store now holds exactly this many imported records.
    Replaced(usize),
}

impl MergeOutcome {
    /// Number of records that entered the store.
    #[must_use]
    pub fn count(self) -> usize {
        match self {
            Self::Added(n) | Self::Replaced(n) => n,
            Self::NothingNew => 0,
        }
    }
}

/// New store contents produced by [`merge_imported`].
#[derive(Debug, Clone, PartialEq)]
pub struct MergedResult {
    /// Records sorted by timestamp ascending.
    pub records: Vec<Record>,
    /// Summary for the caller.
    pub outcome: MergeOutcome,
    /// Imported records skipped because their id already existed.
    pub duplicates: usize,
    /// Next sequential id that cannot collide with any merged record.
    pub next_id: u64,
}

/// Serialize records as a pretty-printed JSON array, preserving order.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn export_snapshot(records: &[Record]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(records)
}

/// Date-stamped file name for an export made at `now`.
#[must_use]
pub fn suggested_filename(now: &Timestamp) -> String {
    format!("driving-log-{}.json", now.format("%Y-%m-%d"))
}

/// Entry of an import payload before validation.
///
/// Older exports called the timestamp `date`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRecord {
    id: Option<RecordId>,
    #[serde(alias = "date")]
    timestamp: Option<String>,
    mileage: Option<f64>,
    destination: Option<String>,
    alcohol_check: Option<f64>,
    fuel_record: Option<f64>,
}

impl RawRecord {
    /// Turn the entry into a record, or explain why it is unusable.
    fn into_record(self) -> Result<Record, &'static str> {
        let id = self
            .id
            .map(RecordId::canonical)
            .filter(|id| !id.is_blank())
            .ok_or("missing id")?;
        if id.as_seq() == Some(u64::MAX) {
            return Err("id leaves no room for new records");
        }
        let readings = [self.mileage, self.alcohol_check, self.fuel_record];
        if readings.into_iter().flatten().any(|v| v < 0.0) {
            return Err("negative reading");
        }
        let timestamp = self
            .timestamp
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s.trim()).ok())
            .ok_or("missing or invalid timestamp")?;
        let destination = self
            .destination
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .ok_or("missing destination")?;
        Ok(Record {
            id,
            timestamp,
            mileage: self.mileage,
            destination,
            alcohol_check: self.alcohol_check,
            fuel_record: self.fuel_record,
        })
    }
}

/// Parse an import payload into records.
///
/// Entries without a usable id, timestamp and destination, with a negative
/// reading, or with the sequential id `u64::MAX` are skipped with a warning.
/// Ids spelled as canonical decimal strings become sequential ids. When an id
/// occurs more than once, the first entry wins. Order is preserved.
///
/// # Errors
///
/// Returns [`ParseError::MalformedPayload`] if `raw` is not JSON or its top
/// level is not an array, and [`ParseError::EmptyOrAllInvalid`] if no entry is
/// usable.
pub fn parse_import_candidates(raw: &str) -> Result<Vec<Record>, ParseError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| ParseError::malformed(e.to_string()))?;
    let Value::Array(entries) = value else {
        return Err(ParseError::malformed("expected a JSON array of records"));
    };

    let mut seen = HashSet::new();
    let mut records = Vec::with_capacity(entries.len());
    let mut skipped = 0;

    for (index, entry) in entries.into_iter().enumerate() {
        let parsed = serde_json::from_value::<RawRecord>(entry)
            .map_err(|_| "wrong field types")
            .and_then(RawRecord::into_record);
        match parsed {
            Ok(record) if seen.insert(record.id.clone()) => records.push(record),
            Ok(record) => {
                debug!("Skipping entry {index}: repeated id {}", record.id);
                skipped += 1;
            }
            Err(reason) => {
                warn!("Skipping import entry {index}: {reason}");
                skipped += 1;
            }
        }
    }

    if records.is_empty() {
        return Err(ParseError::EmptyOrAllInvalid { skipped });
    }
    debug!("Parsed {} import candidates, skipped {}", records.len(), skipped);
    Ok(records)
}

/// Combine imported records with the existing ones.
///
/// The result is sorted by timestamp ascending and carries an id watermark
/// above every sequential id in either set, so later additions cannot reuse
/// an imported id.
#[must_use]
pub fn merge_imported(
    existing: &[Record],
    imported: Vec<Record>,
    policy: MergePolicy,
) -> MergedResult {
    let watermark = existing
        .iter()
        .chain(imported.iter())
        .filter_map(|r| r.id.as_seq())
        .max()
        // A saturated watermark makes `RecordStore::add` refuse new ids.
        .map_or(1, |max| max.saturating_add(1));

    let (mut records, outcome, duplicates) = match policy {
        MergePolicy::AdditiveDedup => {
            let mut known: HashSet<RecordId> = existing.iter().map(|r| r.id.clone()).collect();
            let mut records = existing.to_vec();
            let total = imported.len();
            records.extend(imported.into_iter().filter(|r| known.insert(r.id.clone())));
            let added = records.len() - existing.len();
            let outcome = if added == 0 {
                MergeOutcome::NothingNew
            } else {
                MergeOutcome::Added(added)
            };
            (records, outcome, total - added)
        }
        MergePolicy::Replace => {
            let mut known = HashSet::new();
            let records: Vec<Record> = imported
                .into_iter()
                .filter(|r| known.insert(r.id.clone()))
                .collect();
            let count = records.len();
            (records, MergeOutcome::Replaced(count), 0)
        }
    };

    records.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
    info!(
        "Merged import ({policy}): {:?}, {} duplicates skipped",
        outcome, duplicates
    );

    MergedResult {
        records,
        outcome,
        duplicates,
        next_id: watermark,
    }
}

/// Something that can deliver the raw text of an import.
///
/// Reading is the only asynchronous step of an import; parsing and merging
/// run synchronously once the content is available.
#[async_trait]
pub trait ImportSource: Send + Sync {
    /// Short description for logs and messages.
    fn describe(&self) -> String;

    /// Read the full payload.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::Unreadable`] if the content cannot be read.
    async fn read(&self) -> Result<String, ParseError>;
}

/// Import source backed by a file on disk.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    /// Read from `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ImportSource for FileSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn read(&self) -> Result<String, ParseError> {
        tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| ParseError::Unreadable {
                cause: format!("{}: {e}", self.path.display()),
            })
    }
}

/// Import source holding content already in memory.
#[derive(Debug, Clone)]
pub struct TextSource(pub String);

#[async_trait]
impl ImportSource for TextSource {
    fn describe(&self) -> String {
        format!("{} bytes of text", self.0.len())
    }

    async fn read(&self) -> Result<String, ParseError> {
        Ok(self.0.clone())
    }
}
