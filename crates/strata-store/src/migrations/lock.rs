//! Advisory lock serializing runner instances
//!
//! SQLite has no named advisory locks, so the lock is a row in the ledger's
//! companion `<ledger>_lock` table. The row's primary key is the mutual
//! exclusion token: whoever inserts it holds the lock until they delete it.

#![allow(clippy::result_large_err)]

use crate::errors::{from_rusqlite, is_unique_violation, Result};
use crate::migrations::ledger::Ledger;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use std::time::{Duration, Instant};
use strata_core::errors::MigrationError;
use strata_core_types::RunId;

/// Default lock row name
pub const DEFAULT_LOCK_NAME: &str = "migrations";

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How to behave when another runner holds the lock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Poll until the lock frees up or the timeout elapses
    Wait(Duration),
    /// Fail with `LockContention` immediately
    NoWait,
    /// Do not take the lock; rely on the ledger's uniqueness constraint alone
    Disabled,
}

impl Default for LockMode {
    fn default() -> Self {
        LockMode::Wait(Duration::from_secs(30))
    }
}

/// Current lock holder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockHolder {
    pub holder: String,
    pub acquired_at: DateTime<Utc>,
}

/// Acquire the lock `name` for `run_id`
///
/// The ledger tables must exist. `LockMode::Disabled` is a no-op.
pub fn acquire(
    conn: &Connection,
    ledger: &Ledger,
    name: &str,
    run_id: &RunId,
    mode: LockMode,
) -> Result<()> {
    let deadline = match mode {
        LockMode::Disabled => return Ok(()),
        LockMode::NoWait => None,
        LockMode::Wait(timeout) => Some(Instant::now() + timeout),
    };

    loop {
        if try_acquire(conn, ledger, name, run_id)? {
            tracing::debug!(lock = name, run_id = %run_id, "migration lock acquired");
            return Ok(());
        }

        let expired = deadline.map_or(true, |d| Instant::now() >= d);
        if expired {
            let holder = holder(conn, ledger, name)?
                .map(|h| h.holder)
                .unwrap_or_else(|| "unknown".to_string());
            return Err(MigrationError::LockHeld {
                lock: name.to_string(),
                holder,
            }
            .into());
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

fn try_acquire(conn: &Connection, ledger: &Ledger, name: &str, run_id: &RunId) -> Result<bool> {
    let inserted = conn.execute(
        &format!(
            "INSERT INTO \"{}\" (name, holder, acquired_at) VALUES (?1, ?2, ?3)",
            ledger.lock_table()
        ),
        rusqlite::params![name, run_id.as_str(), Utc::now().timestamp_micros()],
    );
    match inserted {
        Ok(_) => Ok(true),
        Err(e) if is_unique_violation(&e) => Ok(false),
        Err(e) => Err(from_rusqlite(e)),
    }
}

/// Release the lock if `run_id` still holds it
pub fn release(conn: &Connection, ledger: &Ledger, name: &str, run_id: &RunId) -> Result<()> {
    let deleted = conn
        .execute(
            &format!(
                "DELETE FROM \"{}\" WHERE name = ?1 AND holder = ?2",
                ledger.lock_table()
            ),
            rusqlite::params![name, run_id.as_str()],
        )
        .map_err(from_rusqlite)?;
    if deleted == 0 {
        tracing::warn!(lock = name, run_id = %run_id, "migration lock was not held at release");
    }
    Ok(())
}

/// Who holds the lock, if anyone
pub fn holder(conn: &Connection, ledger: &Ledger, name: &str) -> Result<Option<LockHolder>> {
    if !crate::migrations::ledger::table_exists(conn, &ledger.lock_table())? {
        return Ok(None);
    }
    let row: Option<(String, i64)> = conn
        .query_row(
            &format!(
                "SELECT holder, acquired_at FROM \"{}\" WHERE name = ?1",
                ledger.lock_table()
            ),
            [name],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()
        .map_err(from_rusqlite)?;

    Ok(row.map(|(holder, micros)| LockHolder {
        holder,
        acquired_at: DateTime::from_timestamp_micros(micros).unwrap_or_default(),
    }))
}

/// Delete the lock row regardless of holder
///
/// For operators clearing a lock left by a crashed runner. Returns the
/// previous holder, if there was one.
pub fn force_release(conn: &Connection, ledger: &Ledger, name: &str) -> Result<Option<LockHolder>> {
    let previous = holder(conn, ledger, name)?;
    if previous.is_some() {
        conn.execute(
            &format!("DELETE FROM \"{}\" WHERE name = ?1", ledger.lock_table()),
            [name],
        )
        .map_err(from_rusqlite)?;
        tracing::warn!(lock = name, "migration lock force-released");
    }
    Ok(previous)
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::errors::ExErrorKind;

    fn setup() -> (Connection, Ledger) {
        let conn = Connection::open_in_memory().unwrap();
        let ledger = Ledger::new("schema_ledger").unwrap();
        ledger.ensure(&conn).unwrap();
        (conn, ledger)
    }

    #[test]
    fn test_acquire_and_release() {
        let (conn, ledger) = setup();
        let run = RunId::new();

        acquire(&conn, &ledger, DEFAULT_LOCK_NAME, &run, LockMode::NoWait).unwrap();
        let held = holder(&conn, &ledger, DEFAULT_LOCK_NAME).unwrap().unwrap();
        assert_eq!(held.holder, run.as_str());

        release(&conn, &ledger, DEFAULT_LOCK_NAME, &run).unwrap();
        assert!(holder(&conn, &ledger, DEFAULT_LOCK_NAME).unwrap().is_none());
    }

    #[test]
    fn test_no_wait_fails_fast_with_holder() {
        let (conn, ledger) = setup();
        let first = RunId::from_string("run-first".into());
        acquire(&conn, &ledger, DEFAULT_LOCK_NAME, &first, LockMode::NoWait).unwrap();

        let err = acquire(
            &conn,
            &ledger,
            DEFAULT_LOCK_NAME,
            &RunId::new(),
            LockMode::NoWait,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::LockContention);
        assert!(err.message().contains("run-first"));
    }

    #[test]
    fn test_wait_times_out() {
        let (conn, ledger) = setup();
        acquire(&conn, &ledger, DEFAULT_LOCK_NAME, &RunId::new(), LockMode::NoWait).unwrap();

        let started = Instant::now();
        let err = acquire(
            &conn,
            &ledger,
            DEFAULT_LOCK_NAME,
            &RunId::new(),
            LockMode::Wait(Duration::from_millis(120)),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::LockContention);
        assert!(started.elapsed() >= Duration::from_millis(120));
    }

    #[test]
    fn test_release_by_non_holder_keeps_lock() {
        let (conn, ledger) = setup();
        let owner = RunId::new();
        acquire(&conn, &ledger, DEFAULT_LOCK_NAME, &owner, LockMode::NoWait).unwrap();

        release(&conn, &ledger, DEFAULT_LOCK_NAME, &RunId::new()).unwrap();
        assert!(holder(&conn, &ledger, DEFAULT_LOCK_NAME).unwrap().is_some());
    }

    #[test]
    fn test_distinct_names_do_not_contend() {
        let (conn, ledger) = setup();
        acquire(&conn, &ledger, "a", &RunId::new(), LockMode::NoWait).unwrap();
        acquire(&conn, &ledger, "b", &RunId::new(), LockMode::NoWait).unwrap();
    }

    #[test]
    fn test_force_release() {
        let (conn, ledger) = setup();
        let stale = RunId::from_string("crashed-run".into());
        acquire(&conn, &ledger, DEFAULT_LOCK_NAME, &stale, LockMode::NoWait).unwrap();

        let previous = force_release(&conn, &ledger, DEFAULT_LOCK_NAME).unwrap().unwrap();
        assert_eq!(previous.holder, "crashed-run");
        assert!(force_release(&conn, &ledger, DEFAULT_LOCK_NAME).unwrap().is_none());
    }

    #[test]
    fn test_holder_without_tables() {
        let conn = Connection::open_in_memory().unwrap();
        let ledger = Ledger::new("schema_ledger").unwrap();
        assert!(holder(&conn, &ledger, DEFAULT_LOCK_NAME).unwrap().is_none());
    }
}
