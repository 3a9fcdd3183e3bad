//! Strata Core - migration domain model and planning
//!
//! This crate provides the engine-independent half of the migration runner:
//! - `MigrationScript`, `LedgerEntry` and the per-script `ScriptState` machine
//! - Script validation and ordering, drift detection, order policy (`plan`)
//! - The canonical error facility (`ExError`, `ExErrorKind`, `MigrationError`)
//! - The structured logging facility and its macros

pub mod checksum;
pub mod errors;
pub mod logging_facility;
pub mod model;
pub mod plan;

// Macros refer to schema constants through this path
pub use strata_core_types;

// Re-export commonly used types
pub use errors::{ExError, ExErrorKind, MigrationError, Result};
pub use model::{LedgerEntry, MigrationScript, ScriptState};
pub use plan::{validate_scripts, OrderPolicy, Plan};
