//! Host-side persistence for drivelog.
//!
//! The record engine works on an in-memory collection; this module is the
//! `SQLite`-backed host adapter that supplies the initial contents and writes
//! them back after a command. Saves replace the whole table in a single
//! transaction and are skipped when the snapshot fingerprint is unchanged.

pub mod schema;

use std::path::{Path, PathBuf};

use chrono::DateTime;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::record::{Record, RecordId, Timestamp};

/// Metadata key holding the next sequential id.
const NEXT_ID_KEY: &str = "next_id";

/// Metadata key holding the BLAKE3 fingerprint of the last saved snapshot.
const FINGERPRINT_KEY: &str = "snapshot_fingerprint";

/// Path reported for in-memory databases.
const IN_MEMORY: &str = ":memory:";

/// Records and id watermark as last saved.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Records in saved order.
    pub records: Vec<Record>,
    /// Next sequential id to hand out.
    pub next_id: u64,
}

/// `SQLite` database holding one driving log.
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl Storage {
    /// Open or create a database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;
        schema::initialize_schema(&conn)?;

        debug!("Opened database at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory database for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(IN_MEMORY),
            source,
        })?;
        schema::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(IN_MEMORY),
            conn,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load every record in saved order, with the id watermark.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row cannot be decoded.
    pub fn load(&self) -> Result<Snapshot> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT id, id_kind, timestamp, mileage, destination, alcohol_check, fuel_record
            FROM records ORDER BY position ASC
            ",
        )?;
        let records = stmt
            .query_map([], Self::row_to_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let next_id = self
            .get_metadata(NEXT_ID_KEY)?
            .map(|v| {
                v.parse::<u64>()
                    .map_err(|_| Error::corrupt_row(NEXT_ID_KEY, format!("bad watermark '{v}'")))
            })
            .transpose()?
            .unwrap_or(1);

        debug!("Loaded {} records, next id {}", records.len(), next_id);
        Ok(Snapshot { records, next_id })
    }

    /// Replace the stored records with `records`.
    ///
    /// Returns `false` when the contents already match and nothing was written.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails; the previous contents are
    /// kept in that case.
    pub fn save(&mut self, records: &[Record], next_id: u64) -> Result<bool> {
        let fingerprint = fingerprint(records, next_id)?;
        if self.get_metadata(FINGERPRINT_KEY)?.as_deref() == Some(fingerprint.as_str()) {
            trace!("Snapshot unchanged, skipping save");
            return Ok(false);
        }

        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM records", [])?;
        {
            let mut insert = tx.prepare(
                r"
                INSERT INTO records
                    (position, id, id_kind, timestamp, mileage, destination, alcohol_check, fuel_record)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ",
            )?;
            for (position, record) in (0_i64..).zip(records) {
                let kind = match record.id {
                    RecordId::Seq(_) => "seq",
                    RecordId::Opaque(_) => "opaque",
                };
                insert.execute(params![
                    position,
                    record.id.to_string(),
                    kind,
                    record.timestamp.to_rfc3339(),
                    record.mileage,
                    record.destination,
                    record.alcohol_check,
                    record.fuel_record,
                ])?;
            }
        }
        for (key, value) in [(NEXT_ID_KEY, next_id.to_string()), (FINGERPRINT_KEY, fingerprint)] {
            tx.execute(
                "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
                (key, value),
            )?;
        }
        tx.commit()?;

        debug!("Saved {} records to {}", records.len(), self.path.display());
        Ok(true)
    }

    /// Get database statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<StorageStats> {
        let total_records: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;

        // Rows are saved in timestamp order, so the ends of `position` are the extremes.
        let oldest = self.timestamp_at("ASC")?;
        let newest = self.timestamp_at("DESC")?;

        let db_size_bytes = if self.path.as_os_str() == IN_MEMORY {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StorageStats {
            total_records,
            oldest_record: oldest,
            newest_record: newest,
            db_size_bytes,
        })
    }

    fn timestamp_at(&self, order: &str) -> Result<Option<Timestamp>> {
        let text: Option<String> = self
            .conn
            .query_row(
                &format!("SELECT timestamp FROM records ORDER BY position {order} LIMIT 1"),
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(text.and_then(|s| DateTime::parse_from_rfc3339(&s).ok()))
    }

    fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM metadata WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Convert a database row to a Record.
    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<Record> {
        let id_text: String = row.get(0)?;
        let id_kind: String = row.get(1)?;
        let timestamp_text: String = row.get(2)?;

        let id = match id_kind.as_str() {
            "seq" => RecordId::Seq(
                id_text
                    .parse()
                    .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?,
            ),
            _ => RecordId::Opaque(id_text),
        };
        let timestamp = DateTime::parse_from_rfc3339(&timestamp_text)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;

        Ok(Record {
            id,
            timestamp,
            mileage: row.get(3)?,
            destination: row.get(4)?,
            alcohol_check: row.get(5)?,
            fuel_record: row.get(6)?,
        })
    }
}

/// BLAKE3 fingerprint of a snapshot.
fn fingerprint(records: &[Record], next_id: u64) -> Result<String> {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&serde_json::to_vec(records)?);
    hasher.update(&next_id.to_le_bytes());
    Ok(hasher.finalize().to_hex().to_string())
}

/// Statistics about the storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageStats {
    /// Total number of records stored.
    pub total_records: i64,
    /// Earliest stored timestamp.
    pub oldest_record: Option<Timestamp>,
    /// Latest stored timestamp.
    pub newest_record: Option<Timestamp>,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}
