//! Strata Store - SQLite migration runner
//!
//! Provides:
//! - Connection setup (foreign keys, WAL, busy timeout)
//! - A ledger table per migration stream, guarded by an advisory lock row
//! - The runner applying scripts one immediate transaction at a time

pub mod db;
pub mod errors;
pub mod migrations;

// Re-export key types
pub use errors::Result;
pub use migrations::{apply_migrations, ApplyReport, RunnerConfig};
