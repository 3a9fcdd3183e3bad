//! Run results
//!
//! `ApplyReport` is what one `apply_migrations` call did; `MigrationStatus`
//! is a read-only view of one script against the ledger.

use chrono::{DateTime, Utc};
use strata_core::errors::{ExError, Result};
use strata_core_types::RunId;

/// The script that stopped a run, and why
#[derive(Debug, Clone)]
pub struct FailedMigration {
    pub id: String,
    pub error: ExError,
}

/// Outcome of one runner invocation
///
/// Every script of the input set lands in exactly one of `applied`,
/// `skipped`, `applied_elsewhere`, `failed` or `not_attempted`.
#[derive(Debug, Clone)]
#[must_use = "a report may carry a failed migration; check is_success() or call into_result()"]
pub struct ApplyReport {
    pub run_id: RunId,
    /// Nothing was executed or written; `applied` lists what would run
    pub dry_run: bool,
    /// Committed by this run, in apply order
    pub applied: Vec<String>,
    /// Already in the ledger when the run started
    pub skipped: Vec<String>,
    /// Recorded by a concurrent runner between planning and applying
    pub applied_elsewhere: Vec<String>,
    pub failed: Option<FailedMigration>,
    /// Ordered after the failed script, left pending
    pub not_attempted: Vec<String>,
    /// Ledger rows matching no known script
    pub unknown: Vec<String>,
}

impl ApplyReport {
    pub fn new(run_id: RunId, dry_run: bool) -> Self {
        Self {
            run_id,
            dry_run,
            applied: Vec::new(),
            skipped: Vec::new(),
            applied_elsewhere: Vec::new(),
            failed: None,
            not_attempted: Vec::new(),
            unknown: Vec::new(),
        }
    }

    /// True iff every pending script committed
    pub fn is_success(&self) -> bool {
        self.failed.is_none()
    }

    /// Turn a failed report into its execution error
    pub fn into_result(self) -> Result<ApplyReport> {
        match &self.failed {
            None => Ok(self),
            Some(failed) => Err(failed.error.clone().with_run_id(self.run_id.clone())),
        }
    }
}

/// Where one identifier stands against the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationState {
    Pending,
    Applied {
        applied_at: DateTime<Utc>,
        /// Body changed since it was recorded
        drifted: bool,
    },
    /// Recorded, but no script with this identifier is known
    Unknown { applied_at: DateTime<Utc> },
}

impl MigrationState {
    pub fn label(&self) -> &'static str {
        match self {
            MigrationState::Pending => "pending",
            MigrationState::Applied { drifted: false, .. } => "applied",
            MigrationState::Applied { drifted: true, .. } => "drifted",
            MigrationState::Unknown { .. } => "unknown",
        }
    }

    pub fn applied_at(&self) -> Option<DateTime<Utc>> {
        match self {
            MigrationState::Pending => None,
            MigrationState::Applied { applied_at, .. } | MigrationState::Unknown { applied_at } => {
                Some(*applied_at)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    pub id: String,
    pub state: MigrationState,
}
