//! Migration planning
//!
//! Pure decisions made before any script executes: validating the script
//! set, ordering it, splitting it against the ledger, verifying checksums
//! and enforcing the order policy. Nothing here touches a database.

use crate::errors::MigrationError;
use crate::model::{validate_identifier, LedgerEntry, MigrationScript};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// How to treat a pending script that orders before an applied one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrderPolicy {
    /// Refuse to run: a gap behind the applied frontier is an error
    #[default]
    Strict,
    /// Apply the late script anyway
    AllowOutOfOrder,
}

/// Validate and sort a script set
///
/// Every identifier must be well formed, every body non-blank, and no
/// identifier may appear twice. Returns the scripts in ascending identifier
/// order regardless of discovery order.
pub fn validate_scripts(
    mut scripts: Vec<MigrationScript>,
) -> Result<Vec<MigrationScript>, MigrationError> {
    scripts.sort();

    for script in &scripts {
        validate_identifier(script.id())?;
    }

    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for script in &scripts {
        *counts.entry(script.id()).or_default() += 1;
    }
    let duplicates: Vec<String> = counts
        .into_iter()
        .filter(|(_, n)| *n > 1)
        .map(|(id, _)| id.to_string())
        .collect();
    if !duplicates.is_empty() {
        return Err(MigrationError::DuplicateIdentifiers { ids: duplicates });
    }

    if let Some(empty) = scripts.iter().find(|s| s.body().trim().is_empty()) {
        return Err(MigrationError::EmptyBody {
            id: empty.id().to_string(),
        });
    }

    Ok(scripts)
}

/// A script whose recorded checksum no longer matches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Drift {
    pub id: String,
    pub recorded: String,
    pub current: String,
}

impl From<Drift> for MigrationError {
    fn from(d: Drift) -> Self {
        MigrationError::Drift {
            id: d.id,
            recorded: d.recorded,
            current: d.current,
        }
    }
}

/// Scripts split against the ledger
#[derive(Debug)]
pub struct Plan<'a> {
    /// Not yet recorded, in apply order
    pub pending: Vec<&'a MigrationScript>,
    /// Recorded, paired with their ledger rows
    pub applied: Vec<(&'a MigrationScript, &'a LedgerEntry)>,
    /// Ledger rows with no matching script (another lineage or a deleted file)
    pub unknown: Vec<&'a LedgerEntry>,
}

impl<'a> Plan<'a> {
    /// Split `scripts` (already validated and sorted) against `ledger`
    pub fn compute(scripts: &'a [MigrationScript], ledger: &'a [LedgerEntry]) -> Self {
        let by_id: HashMap<&str, &LedgerEntry> =
            ledger.iter().map(|e| (e.id.as_str(), e)).collect();

        let mut pending = Vec::new();
        let mut applied = Vec::new();
        for script in scripts {
            match by_id.get(script.id()) {
                Some(entry) => applied.push((script, *entry)),
                None => pending.push(script),
            }
        }

        let mut unknown: Vec<&LedgerEntry> = ledger
            .iter()
            .filter(|e| !scripts.iter().any(|s| s.id() == e.id))
            .collect();
        unknown.sort_by(|a, b| a.id.cmp(&b.id));

        Self {
            pending,
            applied,
            unknown,
        }
    }

    /// Every applied script whose body changed since it was recorded
    pub fn drift(&self) -> Vec<Drift> {
        self.applied
            .iter()
            .filter(|(script, entry)| !entry.matches(script.checksum()))
            .map(|(script, entry)| Drift {
                id: script.id().to_string(),
                recorded: entry.checksum.clone(),
                current: script.checksum().to_string(),
            })
            .collect()
    }

    /// Fail on the first drifted script
    pub fn verify_checksums(&self) -> Result<(), MigrationError> {
        match self.drift().into_iter().next() {
            Some(drift) => Err(drift.into()),
            None => Ok(()),
        }
    }

    /// Enforce `policy` against the applied frontier
    ///
    /// Only scripts in this set count towards the frontier; unknown ledger
    /// rows belong to other lineages and are ignored.
    pub fn check_order(&self, policy: OrderPolicy) -> Result<(), MigrationError> {
        if policy == OrderPolicy::AllowOutOfOrder {
            return Ok(());
        }
        let Some(frontier) = self.applied.iter().map(|(s, _)| s.id()).max() else {
            return Ok(());
        };
        match self.pending.iter().find(|s| s.id() < frontier) {
            Some(late) => Err(MigrationError::OutOfOrder {
                id: late.id().to_string(),
                applied_after: frontier.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Scripts that sit behind the applied frontier (applied out of order if allowed)
    pub fn out_of_order(&self) -> Vec<&'a MigrationScript> {
        let Some(frontier) = self.applied.iter().map(|(s, _)| s.id()).max() else {
            return Vec::new();
        };
        self.pending
            .iter()
            .copied()
            .filter(|s| s.id() < frontier)
            .collect()
    }
}
