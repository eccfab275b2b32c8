//! `SQLite` schema for the record table.
//!
//! The schema version lives in `PRAGMA user_version`.

use rusqlite::Connection;

use crate::error::{Error, Result};

/// Version written by [`initialize_schema`].
pub const CURRENT_VERSION: i32 = 1;

/// Records in store order. `position` preserves the engine's ordering,
/// `id_kind` tells sequential ids from opaque ones.
pub const CREATE_RECORDS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS records (
    position INTEGER PRIMARY KEY,
    id TEXT NOT NULL UNIQUE,
    id_kind TEXT NOT NULL CHECK (id_kind IN ('seq', 'opaque')),
    timestamp TEXT NOT NULL,
    mileage REAL,
    destination TEXT NOT NULL CHECK (length(destination) > 0),
    alcohol_check REAL,
    fuel_record REAL
)
";

/// Index for month and day range scans from external tools.
pub const CREATE_TIMESTAMP_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_records_timestamp ON records(timestamp)
";

/// Key/value pairs such as the id watermark.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_RECORDS_TABLE,
    CREATE_TIMESTAMP_INDEX,
    CREATE_METADATA_TABLE,
];

/// Create missing tables and stamp the schema version.
///
/// # Errors
///
/// Returns an error if a statement fails or the database was written by a
/// newer version of drivelog.
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if version > CURRENT_VERSION {
        return Err(Error::DatabaseMigration {
            message: format!(
                "database schema version {version} is newer than supported version {CURRENT_VERSION}"
            ),
        });
    }

    for statement in SCHEMA_STATEMENTS {
        conn.execute(statement, [])?;
    }
    if version < CURRENT_VERSION {
        conn.execute_batch(&format!("PRAGMA user_version = {CURRENT_VERSION}"))?;
    }
    Ok(())
}
