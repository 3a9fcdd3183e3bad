use strata_core_types::RunId;
use thiserror::Error;

/// Result type alias using the canonical ExError
pub type Result<T> = std::result::Result<T, ExError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Each kind maps to a stable error code that can be used for programmatic
/// error handling, testing and process exit reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Raised before any script executes
    /// Duplicate or malformed script identifiers, empty bodies, bad config
    Configuration,
    /// A pending script orders before an applied one under the strict policy
    OrderViolation,
    /// A recorded checksum no longer matches the script body
    DriftDetected,
    /// Another runner holds the advisory lock
    LockContention,

    // Raised while applying
    /// A script's statements failed against the engine
    Execution,

    // Integration/IO
    Io,
    Serialization,
    Persistence,

    // Internal
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::Configuration => "ERR_CONFIGURATION",
            ExErrorKind::OrderViolation => "ERR_ORDER_VIOLATION",
            ExErrorKind::DriftDetected => "ERR_DRIFT_DETECTED",
            ExErrorKind::LockContention => "ERR_LOCK_CONTENTION",
            ExErrorKind::Execution => "ERR_EXECUTION",
            ExErrorKind::Io => "ERR_IO",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Persistence => "ERR_PERSISTENCE",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }

    /// Whether a caller may reasonably retry the whole run unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(self, ExErrorKind::LockContention)
    }
}

/// Canonical structured error type
///
/// Carries classification fields for programmatic handling and the
/// offending migration identifier(s) for operators.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    migration_id: Option<String>,
    run_id: Option<RunId>,
    message: String,
    source: Option<Box<ExError>>,
    candidates: Option<Vec<String>>,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            migration_id: None,
            run_id: None,
            message: String::new(),
            source: None,
            candidates: None,
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add migration identifier context
    pub fn with_migration_id(mut self, id: impl Into<String>) -> Self {
        self.migration_id = Some(id.into());
        self
    }

    /// Add run ID context
    pub fn with_run_id(mut self, run_id: RunId) -> Self {
        self.run_id = Some(run_id);
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add source error
    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Add every offending identifier (used when a check fails for several scripts at once)
    pub fn with_candidates(mut self, ids: Vec<String>) -> Self {
        self.candidates = Some(ids);
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Get the operation context, if any
    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    /// Get the migration identifier, if any
    pub fn migration_id(&self) -> Option<&str> {
        self.migration_id.as_deref()
    }

    /// Get the run ID context, if any
    pub fn run_id(&self) -> Option<&RunId> {
        self.run_id.as_ref()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the source error, if any
    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }

    /// Get all offending identifiers, if any
    pub fn candidates(&self) -> Option<&[String]> {
        self.candidates.as_deref()
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(migration_id) = &self.migration_id {
            write!(f, " (migration_id: {})", migration_id)?;
        }
        if let Some(candidates) = &self.candidates {
            write!(f, " (migrations: {})", candidates.join(", "))?;
        }
        if let Some(source) = &self.source {
            write!(f, "; caused by {}", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

// ========== End Error Facility ==========

/// Domain failures raised while validating and planning a migration run
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MigrationError {
    /// Two or more scripts share an identifier
    #[error("Duplicate migration identifiers: {}", ids.join(", "))]
    DuplicateIdentifiers { ids: Vec<String> },

    /// Identifier does not follow `<digits>_<slug>`
    #[error("Malformed migration identifier '{id}': {reason}")]
    MalformedIdentifier { id: String, reason: String },

    /// Script body has no statements
    #[error("Migration {id} has an empty body")]
    EmptyBody { id: String },

    /// Script body is not valid UTF-8
    #[error("Migration {id} is not valid UTF-8")]
    InvalidEncoding { id: String },

    /// Ledger table name is not a plain SQL identifier
    #[error("Invalid ledger table name '{name}'")]
    InvalidLedgerTable { name: String },

    /// Recorded checksum differs from the current script body
    #[error("Migration {id} was modified after being applied: recorded checksum {recorded}, current {current}")]
    Drift {
        id: String,
        recorded: String,
        current: String,
    },

    /// Pending script orders before an applied one
    #[error("Migration {id} is pending but orders before already-applied migration {applied_after}")]
    OutOfOrder { id: String, applied_after: String },

    /// Advisory lock is held by another runner
    #[error("Migration lock '{lock}' is held by run {holder}")]
    LockHeld { lock: String, holder: String },

    /// A script's statements failed
    #[error("Migration {id} failed: {reason}")]
    ScriptFailed { id: String, reason: String },

    /// Illegal state machine transition
    #[error("Illegal state transition for migration {id}: {from} -> {to}")]
    IllegalTransition { id: String, from: String, to: String },
}

impl From<MigrationError> for ExError {
    fn from(err: MigrationError) -> Self {
        let message = err.to_string();
        match err {
            MigrationError::DuplicateIdentifiers { ids } => {
                ExError::new(ExErrorKind::Configuration)
                    .with_op("validate_scripts")
                    .with_message(message)
                    .with_candidates(ids)
            }
            MigrationError::MalformedIdentifier { id, .. }
            | MigrationError::EmptyBody { id }
            | MigrationError::InvalidEncoding { id } => ExError::new(ExErrorKind::Configuration)
                .with_op("validate_scripts")
                .with_migration_id(id)
                .with_message(message),
            MigrationError::InvalidLedgerTable { .. } => ExError::new(ExErrorKind::Configuration)
                .with_op("validate_config")
                .with_message(message),
            MigrationError::Drift { id, .. } => ExError::new(ExErrorKind::DriftDetected)
                .with_op("verify_checksums")
                .with_migration_id(id)
                .with_message(message),
            MigrationError::OutOfOrder { id, .. } => ExError::new(ExErrorKind::OrderViolation)
                .with_op("check_order")
                .with_migration_id(id)
                .with_message(message),
            MigrationError::LockHeld { .. } => ExError::new(ExErrorKind::LockContention)
                .with_op("acquire_lock")
                .with_message(message),
            MigrationError::ScriptFailed { id, .. } => ExError::new(ExErrorKind::Execution)
                .with_op("apply_migration")
                .with_migration_id(id)
                .with_message(message),
            MigrationError::IllegalTransition { id, .. } => ExError::new(ExErrorKind::Internal)
                .with_op("transition")
                .with_migration_id(id)
                .with_message(message),
        }
    }
}
