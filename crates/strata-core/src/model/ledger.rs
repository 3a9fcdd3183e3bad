//! Ledger entry model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One row of the ledger: proof that a migration was applied
///
/// Created exactly once per successfully applied script and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: String,
    pub applied_at: DateTime<Utc>,
    /// Checksum of the script body at apply time
    pub checksum: String,
}

impl LedgerEntry {
    pub fn new(id: impl Into<String>, applied_at: DateTime<Utc>, checksum: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            applied_at,
            checksum: checksum.into(),
        }
    }

    /// Whether the recorded checksum still matches `current`
    pub fn matches(&self, current: &str) -> bool {
        self.checksum == current
    }
}
