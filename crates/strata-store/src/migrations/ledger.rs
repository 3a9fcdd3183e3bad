//! Ledger table access
//!
//! One ledger table per migration stream:
//! `(identifier TEXT PRIMARY KEY, applied_at INTEGER, checksum TEXT)`.
//! `applied_at` holds Unix microseconds and is strictly increasing within
//! a table.

#![allow(clippy::result_large_err)]

use crate::errors::{from_rusqlite, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use strata_core::errors::{ExError, ExErrorKind, MigrationError};
use strata_core::model::{LedgerEntry, MigrationScript};

/// Default ledger table name for a single-stream setup
pub const DEFAULT_LEDGER_TABLE: &str = "schema_ledger";

const MAX_TABLE_NAME_LEN: usize = 63;

/// Handle on a named ledger table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ledger {
    table: String,
}

impl Ledger {
    /// Validate `table` as a plain SQL identifier
    pub fn new(table: &str) -> Result<Self> {
        let valid = !table.is_empty()
            && table.len() <= MAX_TABLE_NAME_LEN
            && table
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(MigrationError::InvalidLedgerTable {
                name: table.to_string(),
            }
            .into());
        }
        Ok(Self {
            table: table.to_string(),
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Companion table holding the advisory lock row
    pub fn lock_table(&self) -> String {
        format!("{}_lock", self.table)
    }

    /// Migration zero: create the ledger and lock tables if absent
    pub fn ensure(&self, conn: &Connection) -> Result<()> {
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS \"{ledger}\" (
                identifier TEXT PRIMARY KEY NOT NULL,
                applied_at INTEGER NOT NULL,
                checksum TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS \"{lock}\" (
                name TEXT PRIMARY KEY NOT NULL,
                holder TEXT NOT NULL,
                acquired_at INTEGER NOT NULL
            );",
            ledger = self.table,
            lock = self.lock_table(),
        ))
        .map_err(from_rusqlite)
    }

    /// Whether the ledger table has been created
    pub fn exists(&self, conn: &Connection) -> Result<bool> {
        table_exists(conn, &self.table)
    }

    /// All recorded entries, ordered by identifier
    pub fn entries(&self, conn: &Connection) -> Result<Vec<LedgerEntry>> {
        let mut stmt = conn
            .prepare(&format!(
                "SELECT identifier, applied_at, checksum FROM \"{}\" ORDER BY identifier",
                self.table
            ))
            .map_err(from_rusqlite)?;
        let rows: Vec<(String, i64, String)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
            .map_err(from_rusqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(from_rusqlite)?;

        rows.into_iter()
            .map(|(id, micros, checksum)| {
                let applied_at = micros_to_datetime(&id, micros)?;
                Ok(LedgerEntry::new(id, applied_at, checksum))
            })
            .collect()
    }

    /// Whether `id` has been recorded
    pub fn contains(&self, conn: &Connection, id: &str) -> Result<bool> {
        conn.query_row(
            &format!("SELECT 1 FROM \"{}\" WHERE identifier = ?1", self.table),
            [id],
            |_| Ok(()),
        )
        .optional()
        .map(|row| row.is_some())
        .map_err(from_rusqlite)
    }

    /// Insert the entry for `script`
    ///
    /// Must run inside the script's transaction. The raw rusqlite error is
    /// returned so the caller can tell a uniqueness conflict from other
    /// failures.
    pub fn record(
        &self,
        conn: &Connection,
        script: &MigrationScript,
    ) -> std::result::Result<LedgerEntry, rusqlite::Error> {
        let last: Option<i64> = conn.query_row(
            &format!("SELECT MAX(applied_at) FROM \"{}\"", self.table),
            [],
            |row| row.get(0),
        )?;
        let now = Utc::now().timestamp_micros();
        let applied_at = match last {
            Some(last) if last >= now => last + 1,
            _ => now,
        };

        conn.execute(
            &format!(
                "INSERT INTO \"{}\" (identifier, applied_at, checksum) VALUES (?1, ?2, ?3)",
                self.table
            ),
            rusqlite::params![script.id(), applied_at, script.checksum()],
        )?;

        let applied_at = DateTime::from_timestamp_micros(applied_at).unwrap_or_else(Utc::now);
        Ok(LedgerEntry::new(script.id(), applied_at, script.checksum()))
    }
}

pub(crate) fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    conn.query_row(
        "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |_| Ok(()),
    )
    .optional()
    .map(|row| row.is_some())
    .map_err(from_rusqlite)
}

fn micros_to_datetime(id: &str, micros: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros).ok_or_else(|| {
        ExError::new(ExErrorKind::Persistence)
            .with_op("read_ledger")
            .with_migration_id(id)
            .with_message(format!("applied_at out of range: {}", micros))
    })
}
