//! Migration framework
//!
//! Provides:
//! - Migration runner with checksums, order policy and an advisory lock
//! - Idempotent, per-script transactional application
//! - Directory and embedded script sources
//! - Read-only status reporting

pub mod embedded;
mod ledger;
mod lock;
mod report;
mod runner;
mod source;

pub use ledger::{Ledger, DEFAULT_LEDGER_TABLE};
pub use lock::{LockHolder, LockMode, DEFAULT_LOCK_NAME};
pub use report::{ApplyReport, FailedMigration, MigrationState, MigrationStatus};
pub use runner::{
    apply_from_source, apply_migrations, force_unlock, lock_holder, migration_status,
    plan_migrations, RunnerConfig,
};
pub use source::{DirectorySource, EmbeddedSource, ScriptSource};
