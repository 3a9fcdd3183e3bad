//! Database connection management
//!
//! Provides utilities for opening and configuring SQLite connections

#![allow(clippy::result_large_err)]

use crate::errors::{from_rusqlite, Result};
use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;

/// Default time a writer waits on a locked database before failing
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open a SQLite database at the given path
pub fn open<P: AsRef<Path>>(path: P) -> Result<Connection> {
    Connection::open(path).map_err(from_rusqlite)
}

/// Open an in-memory SQLite database (for testing)
pub fn open_in_memory() -> Result<Connection> {
    Connection::open_in_memory().map_err(from_rusqlite)
}

/// Open and configure in one step
pub fn open_configured<P: AsRef<Path>>(path: P, busy_timeout: Duration) -> Result<Connection> {
    let conn = open(path)?;
    configure(&conn, busy_timeout)?;
    Ok(conn)
}

/// Configure a connection for migration runs
///
/// Foreign keys on, WAL journal, and a busy timeout so a competing runner
/// waits for the write lock instead of failing with `SQLITE_BUSY`.
pub fn configure(conn: &Connection, busy_timeout: Duration) -> Result<()> {
    // First, so the journal mode switch below also waits out other writers
    conn.busy_timeout(busy_timeout).map_err(from_rusqlite)?;

    conn.pragma_update(None, "foreign_keys", "ON")
        .map_err(from_rusqlite)?;

    // journal_mode reports the resulting mode as a row
    let mode: String = conn
        .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
        .map_err(from_rusqlite)?;
    if !mode.eq_ignore_ascii_case("wal") {
        tracing::warn!(journal_mode = mode.as_str(), "database did not switch to WAL");
    }
    Ok(())
}
