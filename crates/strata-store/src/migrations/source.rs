//! Script sources
//!
//! Where migration scripts come from: a directory of `.sql` files on disk,
//! or a static table compiled into the binary.

#![allow(clippy::result_large_err)]

use crate::errors::{io_error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use strata_core::errors::{ExError, ExErrorKind, MigrationError};
use strata_core::model::MigrationScript;

/// Anything that can produce a set of migration scripts
///
/// Order of the returned scripts is irrelevant: the runner sorts by
/// identifier before doing anything else.
pub trait ScriptSource {
    fn load(&self) -> Result<Vec<MigrationScript>>;
}

/// Every `*.sql` file directly under a directory
///
/// The identifier is the file stem (`001_create_doctors.sql` →
/// `001_create_doctors`). Subdirectories and other extensions are ignored.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ScriptSource for DirectorySource {
    fn load(&self) -> Result<Vec<MigrationScript>> {
        let entries = fs::read_dir(&self.dir).map_err(|e| {
            ExError::new(ExErrorKind::Io)
                .with_op("read_migrations_dir")
                .with_message(format!("cannot read {}: {}", self.dir.display(), e))
        })?;

        let mut scripts = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| io_error("read_migrations_dir", e))?.path();
            if !path.is_file() || path.extension().map_or(true, |ext| ext != "sql") {
                continue;
            }

            let id = path
                .file_stem()
                .and_then(|s| s.to_str())
                .ok_or_else(|| {
                    ExError::new(ExErrorKind::Configuration)
                        .with_op("load_scripts")
                        .with_message(format!("non UTF-8 file name: {}", path.display()))
                })?
                .to_string();

            let bytes = fs::read(&path).map_err(|e| io_error("read_migration", e))?;
            let body = String::from_utf8(bytes)
                .map_err(|_| ExError::from(MigrationError::InvalidEncoding { id: id.clone() }))?;

            scripts.push(MigrationScript::new(id, body));
        }

        scripts.sort();
        Ok(scripts)
    }
}

/// Scripts compiled into the binary as `(identifier, body)` pairs
#[derive(Debug, Clone, Copy)]
pub struct EmbeddedSource {
    scripts: &'static [(&'static str, &'static str)],
}

impl EmbeddedSource {
    pub const fn new(scripts: &'static [(&'static str, &'static str)]) -> Self {
        Self { scripts }
    }
}

impl ScriptSource for EmbeddedSource {
    fn load(&self) -> Result<Vec<MigrationScript>> {
        Ok(self
            .scripts
            .iter()
            .map(|(id, body)| MigrationScript::new(*id, *body))
            .collect())
    }
}
