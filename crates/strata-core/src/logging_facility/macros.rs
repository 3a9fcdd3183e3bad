//! Canonical logging macros
//!
//! These macros provide a structured, consistent way to log runner operations.
//! Every event carries `component`, `op` and `event`; callers append
//! `migration_id`, `run_id` and friends as extra fields.

/// Log the start of an operation
///
/// # Example
///
/// ```
/// # use strata_core::log_op_start;
/// log_op_start!("apply_migrations");
/// log_op_start!("apply_migration", migration_id = "001_create_doctors");
/// ```
#[macro_export]
macro_rules! log_op_start {
    ($op:expr) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::strata_core_types::schema::EVENT_START,
        );
    };
    ($op:expr, $($field:tt)*) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::strata_core_types::schema::EVENT_START,
            $($field)*
        );
    };
}

/// Log the successful end of an operation
///
/// # Example
///
/// ```
/// # use strata_core::log_op_end;
/// log_op_end!("apply_migrations", duration_ms = 42);
/// log_op_end!("apply_migrations", duration_ms = 42, applied_count = 3);
/// ```
#[macro_export]
macro_rules! log_op_end {
    ($op:expr, duration_ms = $duration:expr) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::strata_core_types::schema::EVENT_END,
            duration_ms = $duration,
        );
    };
    ($op:expr, duration_ms = $duration:expr, $($field:tt)*) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::strata_core_types::schema::EVENT_END,
            duration_ms = $duration,
            $($field)*
        );
    };
}

/// Log an operation error
///
/// Borrows the error; anything convertible into `ExError` by reference
/// (an `ExError` itself, or a cloned `MigrationError`) is accepted.
///
/// # Example
///
/// ```
/// # use strata_core::{log_op_error, errors::{ExError, MigrationError}};
/// let err: ExError = MigrationError::EmptyBody { id: "001_create_doctors".to_string() }.into();
/// log_op_error!("validate_scripts", &err, duration_ms = 10);
/// ```
#[macro_export]
macro_rules! log_op_error {
    ($op:expr, $err:expr, duration_ms = $duration:expr) => {{
        let ex_err: &$crate::errors::ExError = $err;
        tracing::error!(
            component = module_path!(),
            op = $op,
            event = $crate::strata_core_types::schema::EVENT_END_ERROR,
            duration_ms = $duration,
            err.kind = ?ex_err.kind(),
            err.code = ex_err.code(),
            migration_id = ex_err.migration_id().unwrap_or(""),
            message = ex_err.message(),
        );
    }};
    ($op:expr, $err:expr, duration_ms = $duration:expr, $($field:tt)*) => {{
        let ex_err: &$crate::errors::ExError = $err;
        tracing::error!(
            component = module_path!(),
            op = $op,
            event = $crate::strata_core_types::schema::EVENT_END_ERROR,
            duration_ms = $duration,
            err.kind = ?ex_err.kind(),
            err.code = ex_err.code(),
            migration_id = ex_err.migration_id().unwrap_or(""),
            message = ex_err.message(),
            $($field)*
        );
    }};
}

/// Log a per-script state transition
///
/// # Example
///
/// ```
/// # use strata_core::log_state_change;
/// # use strata_core::model::ScriptState;
/// log_state_change!("001_create_doctors", ScriptState::Pending, ScriptState::Applying);
/// ```
#[macro_export]
macro_rules! log_state_change {
    ($id:expr, $from:expr, $to:expr) => {
        tracing::debug!(
            component = module_path!(),
            op = "transition",
            migration_id = $id,
            from = %$from,
            to = %$to,
        );
    };
}
