//! Per-script state machine
//!
//! `Pending → Applying → Applied` or `Pending → Applying → Failed`.
//! Both terminal states are final within a run; a failed script is retried
//! only by invoking the runner again.

use crate::errors::MigrationError;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptState {
    Pending,
    Applying,
    Applied,
    Failed,
}

impl ScriptState {
    /// Move to `to`, rejecting transitions the state machine does not allow
    pub fn transition(self, id: &str, to: ScriptState) -> Result<ScriptState, MigrationError> {
        use ScriptState::*;
        match (self, to) {
            (Pending, Applying) | (Applying, Applied) | (Applying, Failed) => Ok(to),
            (from, to) => Err(MigrationError::IllegalTransition {
                id: id.to_string(),
                from: from.to_string(),
                to: to.to_string(),
            }),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ScriptState::Applied | ScriptState::Failed)
    }
}

impl fmt::Display for ScriptState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScriptState::Pending => "pending",
            ScriptState::Applying => "applying",
            ScriptState::Applied => "applied",
            ScriptState::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let s = ScriptState::Pending;
        let s = s.transition("001_a", ScriptState::Applying).unwrap();
        let s = s.transition("001_a", ScriptState::Applied).unwrap();
        assert!(s.is_terminal());
    }

    #[test]
    fn test_failure_path() {
        let s = ScriptState::Applying
            .transition("001_a", ScriptState::Failed)
            .unwrap();
        assert_eq!(s, ScriptState::Failed);
    }

    #[test]
    fn test_no_retry_within_run() {
        let err = ScriptState::Applying
            .transition("001_a", ScriptState::Pending)
            .unwrap_err();
        assert!(matches!(err, MigrationError::IllegalTransition { .. }));
        assert!(ScriptState::Failed
            .transition("001_a", ScriptState::Applying)
            .is_err());
        assert!(ScriptState::Pending
            .transition("001_a", ScriptState::Applied)
            .is_err());
    }
}
