//! Migration runner
//!
//! Applies pending scripts one transaction at a time, with checksums,
//! order policy, an advisory lock and idempotent re-runs.

#![allow(clippy::result_large_err)]

use crate::errors::{is_unique_violation, script_failed, Result};
use crate::migrations::ledger::{Ledger, DEFAULT_LEDGER_TABLE};
use crate::migrations::lock::{self, LockMode, DEFAULT_LOCK_NAME};
use crate::migrations::report::{ApplyReport, FailedMigration, MigrationState, MigrationStatus};
use crate::migrations::source::ScriptSource;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::time::Instant;
use strata_core::errors::ExError;
use strata_core::model::{LedgerEntry, MigrationScript, ScriptState};
use strata_core::plan::{validate_scripts, OrderPolicy, Plan};
use strata_core::{log_op_end, log_op_error, log_op_start, log_state_change};
use strata_core_types::RunId;

/// Knobs for one migration stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    pub ledger_table: String,
    pub lock_name: String,
    pub order_policy: OrderPolicy,
    pub verify_checksums: bool,
    pub lock: LockMode,
    pub dry_run: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            ledger_table: DEFAULT_LEDGER_TABLE.to_string(),
            lock_name: DEFAULT_LOCK_NAME.to_string(),
            order_policy: OrderPolicy::Strict,
            verify_checksums: true,
            lock: LockMode::default(),
            dry_run: false,
        }
    }
}

impl RunnerConfig {
    pub fn with_ledger_table(mut self, table: impl Into<String>) -> Self {
        self.ledger_table = table.into();
        self
    }

    pub fn with_lock_name(mut self, name: impl Into<String>) -> Self {
        self.lock_name = name.into();
        self
    }

    pub fn with_order_policy(mut self, policy: OrderPolicy) -> Self {
        self.order_policy = policy;
        self
    }

    pub fn with_verify_checksums(mut self, verify: bool) -> Self {
        self.verify_checksums = verify;
        self
    }

    pub fn with_lock(mut self, mode: LockMode) -> Self {
        self.lock = mode;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// What happened to one pending script
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScriptOutcome {
    Applied,
    AppliedElsewhere,
}

/// Apply all pending migrations to the database
///
/// Returns `Err` only for failures detected before any script runs
/// (configuration, drift, order, lock contention) or for ledger I/O. A
/// script that fails while executing is reported in `ApplyReport::failed`
/// with everything before it committed; use `into_result()` to treat that
/// as an error.
pub fn apply_migrations(
    conn: &mut Connection,
    scripts: Vec<MigrationScript>,
    config: &RunnerConfig,
) -> Result<ApplyReport> {
    let run_id = RunId::new();
    let started = Instant::now();
    log_op_start!(
        "apply_migrations",
        run_id = %run_id,
        ledger_table = config.ledger_table.as_str(),
        dry_run = config.dry_run
    );

    let result = run(conn, scripts, config, &run_id);
    let duration_ms = started.elapsed().as_millis() as u64;

    match result {
        Ok(report) => {
            if let Some(failed) = &report.failed {
                log_op_error!("apply_migrations", &failed.error, duration_ms = duration_ms, run_id = %run_id);
            } else {
                log_op_end!(
                    "apply_migrations",
                    duration_ms = duration_ms,
                    run_id = %run_id,
                    applied_count = report.applied.len()
                );
            }
            Ok(report)
        }
        Err(e) => {
            let e = e.with_run_id(run_id.clone());
            log_op_error!("apply_migrations", &e, duration_ms = duration_ms, run_id = %run_id);
            Err(e)
        }
    }
}

/// Load scripts from `source` and apply them
pub fn apply_from_source(
    conn: &mut Connection,
    source: &dyn ScriptSource,
    config: &RunnerConfig,
) -> Result<ApplyReport> {
    let scripts = source.load()?;
    apply_migrations(conn, scripts, config)
}

/// Compute what `apply_migrations` would do without executing or writing anything
pub fn plan_migrations(
    conn: &mut Connection,
    scripts: Vec<MigrationScript>,
    config: &RunnerConfig,
) -> Result<ApplyReport> {
    let config = config.clone().with_dry_run(true);
    apply_migrations(conn, scripts, &config)
}

fn run(
    conn: &mut Connection,
    scripts: Vec<MigrationScript>,
    config: &RunnerConfig,
    run_id: &RunId,
) -> Result<ApplyReport> {
    let scripts = validate_scripts(scripts)?;
    let ledger = Ledger::new(&config.ledger_table)?;
    let mut report = ApplyReport::new(run_id.clone(), config.dry_run);

    // Read-only pass first: drift and order violations must surface without
    // creating tables or taking the lock
    let entries = if ledger.exists(conn)? {
        ledger.entries(conn)?
    } else {
        Vec::new()
    };
    let plan = Plan::compute(&scripts, &entries);
    check_plan(&plan, config)?;

    if config.dry_run {
        fill_planned(&plan, &mut report);
        report.applied = plan.pending.iter().map(|s| s.id().to_string()).collect();
        return Ok(report);
    }

    ledger.ensure(conn)?;
    lock::acquire(conn, &ledger, &config.lock_name, run_id, config.lock)?;

    let outcome = apply_locked(conn, &ledger, &scripts, config, &mut report);

    if config.lock != LockMode::Disabled {
        // Committed scripts stay reported even if the lock row cannot be removed
        if let Err(e) = lock::release(conn, &ledger, &config.lock_name, run_id) {
            tracing::warn!(
                run_id = %run_id,
                error = %e,
                "failed to release migration lock; clear it with `strata unlock --force`"
            );
        }
    }

    outcome.map(|()| report)
}

fn check_plan(plan: &Plan<'_>, config: &RunnerConfig) -> Result<()> {
    if config.verify_checksums {
        plan.verify_checksums()?;
    }
    plan.check_order(config.order_policy)?;
    Ok(())
}

fn fill_planned(plan: &Plan<'_>, report: &mut ApplyReport) {
    report.skipped = plan.applied.iter().map(|(s, _)| s.id().to_string()).collect();
    report.unknown = plan.unknown.iter().map(|e| e.id.clone()).collect();
    for entry in &plan.unknown {
        tracing::warn!(
            migration_id = entry.id.as_str(),
            "ledger entry matches no known migration"
        );
    }
}

fn apply_locked(
    conn: &mut Connection,
    ledger: &Ledger,
    scripts: &[MigrationScript],
    config: &RunnerConfig,
    report: &mut ApplyReport,
) -> Result<()> {
    // Re-check under the lock; another runner may have moved the ledger on
    let entries = ledger.entries(conn)?;
    let plan = Plan::compute(scripts, &entries);
    check_plan(&plan, config)?;
    fill_planned(&plan, report);

    for late in plan.out_of_order() {
        tracing::info!(
            migration_id = late.id(),
            "applying migration out of order"
        );
    }

    let mut pending = plan.pending.iter();
    for script in pending.by_ref() {
        match apply_script(conn, ledger, script) {
            Ok(ScriptOutcome::Applied) => report.applied.push(script.id().to_string()),
            Ok(ScriptOutcome::AppliedElsewhere) => {
                report.applied_elsewhere.push(script.id().to_string())
            }
            Err(error) => {
                report.failed = Some(FailedMigration {
                    id: script.id().to_string(),
                    error,
                });
                break;
            }
        }
    }
    report.not_attempted = pending.map(|s| s.id().to_string()).collect();

    Ok(())
}

/// Apply one script in its own immediate transaction
///
/// The ledger is re-checked once the write lock is held, so a script that a
/// concurrent runner committed after planning is skipped, not re-executed.
fn apply_script(
    conn: &mut Connection,
    ledger: &Ledger,
    script: &MigrationScript,
) -> Result<ScriptOutcome> {
    let id = script.id();
    let started = Instant::now();

    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|e| script_failed(id, &e))?;

    if ledger.contains(&tx, id)? {
        tracing::info!(migration_id = id, "migration already applied by another runner");
        return Ok(ScriptOutcome::AppliedElsewhere);
    }

    let state = advance(id, ScriptState::Pending, ScriptState::Applying)?;
    log_op_start!("apply_migration", migration_id = id);

    let executed = execute_and_record(tx, ledger, script);

    let duration_ms = started.elapsed().as_millis() as u64;
    match executed {
        Ok(Some(entry)) => {
            advance(id, state, ScriptState::Applied)?;
            log_op_end!(
                "apply_migration",
                duration_ms = duration_ms,
                migration_id = id,
                checksum = entry.checksum.as_str()
            );
            Ok(ScriptOutcome::Applied)
        }
        Ok(None) => {
            tracing::info!(migration_id = id, "ledger conflict, migration applied by another runner");
            Ok(ScriptOutcome::AppliedElsewhere)
        }
        Err(e) => {
            advance(id, state, ScriptState::Failed)?;
            log_op_error!("apply_migration", &e, duration_ms = duration_ms);
            Err(e)
        }
    }
}

/// Run the body and insert the ledger row, committing only if both succeed
///
/// `Ok(None)` means the ledger insert hit a uniqueness conflict; the
/// transaction is rolled back on drop.
fn execute_and_record(
    tx: Transaction<'_>,
    ledger: &Ledger,
    script: &MigrationScript,
) -> Result<Option<LedgerEntry>> {
    let id = script.id();
    tx.execute_batch(script.body())
        .map_err(|e| script_failed(id, &e))?;

    match ledger.record(&tx, script) {
        Ok(entry) => {
            tx.commit().map_err(|e| script_failed(id, &e))?;
            Ok(Some(entry))
        }
        Err(e) if is_unique_violation(&e) => Ok(None),
        Err(e) => Err(script_failed(id, &e)),
    }
}

fn advance(id: &str, from: ScriptState, to: ScriptState) -> Result<ScriptState> {
    let next = from.transition(id, to).map_err(ExError::from)?;
    log_state_change!(id, from, next);
    Ok(next)
}

/// Where every known script stands, plus ledger rows no script matches
///
/// Read-only: a database without a ledger table reports everything pending.
pub fn migration_status(
    conn: &Connection,
    scripts: Vec<MigrationScript>,
    config: &RunnerConfig,
) -> Result<Vec<MigrationStatus>> {
    let scripts = validate_scripts(scripts)?;
    let ledger = Ledger::new(&config.ledger_table)?;
    let entries = if ledger.exists(conn)? {
        ledger.entries(conn)?
    } else {
        Vec::new()
    };
    let plan = Plan::compute(&scripts, &entries);

    let mut statuses: Vec<MigrationStatus> = plan
        .applied
        .iter()
        .map(|(script, entry)| MigrationStatus {
            id: script.id().to_string(),
            state: MigrationState::Applied {
                applied_at: entry.applied_at,
                drifted: !entry.matches(script.checksum()),
            },
        })
        .chain(plan.pending.iter().map(|script| MigrationStatus {
            id: script.id().to_string(),
            state: MigrationState::Pending,
        }))
        .chain(plan.unknown.iter().map(|entry| MigrationStatus {
            id: entry.id.clone(),
            state: MigrationState::Unknown {
                applied_at: entry.applied_at,
            },
        }))
        .collect();
    statuses.sort_by(|a, b| a.id.cmp(&b.id));

    Ok(statuses)
}

/// Clear a stale lock left by a crashed runner
pub fn force_unlock(conn: &Connection, config: &RunnerConfig) -> Result<Option<lock::LockHolder>> {
    let ledger = Ledger::new(&config.ledger_table)?;
    lock::force_release(conn, &ledger, &config.lock_name)
}

/// Current lock holder for a stream, if any
pub fn lock_holder(conn: &Connection, config: &RunnerConfig) -> Result<Option<lock::LockHolder>> {
    let ledger = Ledger::new(&config.ledger_table)?;
    lock::holder(conn, &ledger, &config.lock_name)
}
