//! Error handling for strata-store
//!
//! Wraps strata-core ExError with store-specific helpers

use rusqlite::ErrorCode;
use strata_core::errors::{ExError, ExErrorKind, MigrationError};

/// Result type alias using ExError
pub type Result<T> = std::result::Result<T, ExError>;

/// A script's statements (or its ledger insert) failed
pub fn script_failed(migration_id: &str, err: &rusqlite::Error) -> ExError {
    MigrationError::ScriptFailed {
        id: migration_id.to_string(),
        reason: err.to_string(),
    }
    .into()
}

/// Create a database error from rusqlite::Error
pub fn from_rusqlite(err: rusqlite::Error) -> ExError {
    ExError::new(ExErrorKind::Persistence)
        .with_op("sqlite")
        .with_message(err.to_string())
}

/// Create an IO error
pub fn io_error(operation: &str, err: std::io::Error) -> ExError {
    ExError::new(ExErrorKind::Io)
        .with_op(operation.to_string())
        .with_message(err.to_string())
}

/// Whether `err` is a PRIMARY KEY or UNIQUE constraint failure
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            e.code == ErrorCode::ConstraintViolation
                && matches!(
                    e.extended_code,
                    rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                        | rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                )
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_unique_violation_detected() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (id TEXT PRIMARY KEY); INSERT INTO t VALUES ('a');")
            .unwrap();
        let err = conn.execute("INSERT INTO t VALUES ('a')", []).unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[test]
    fn test_other_constraints_are_not_unique_violations() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (id TEXT NOT NULL);").unwrap();
        let err = conn.execute("INSERT INTO t VALUES (NULL)", []).unwrap_err();
        assert!(!is_unique_violation(&err));

        let syntax = conn.execute_batch("CREATE TABLEX t2 (id)").unwrap_err();
        assert!(!is_unique_violation(&syntax));
    }

    #[test]
    fn test_script_failed_names_migration() {
        let err = script_failed("002_create_patients", &rusqlite::Error::InvalidQuery);
        assert_eq!(err.kind(), ExErrorKind::Execution);
        assert_eq!(err.migration_id(), Some("002_create_patients"));
    }
}
