//! `strata.toml` loading
//!
//! A config file names the database and one or more migration streams. Each
//! stream has its own scripts and its own ledger table, so unrelated schema
//! lineages never share an ordering.

use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use strata_core::errors::{ExError, ExErrorKind, Result};
use strata_core::OrderPolicy;
use strata_store::migrations::{
    embedded, DirectorySource, LockMode, RunnerConfig, ScriptSource, DEFAULT_LEDGER_TABLE,
};

pub const DEFAULT_CONFIG_FILE: &str = "strata.toml";
pub const DEFAULT_DATABASE: &str = "strata.db";
pub const DEFAULT_STREAM: &str = "default";
pub const DEFAULT_MIGRATIONS_DIR: &str = "migrations";

fn default_database() -> PathBuf {
    PathBuf::from(DEFAULT_DATABASE)
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_lock_timeout_ms() -> u64 {
    30_000
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StrataConfig {
    #[serde(default = "default_database")]
    pub database: PathBuf,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
    #[serde(default)]
    pub order_policy: OrderPolicy,
    #[serde(default = "default_true")]
    pub verify_checksums: bool,
    #[serde(default)]
    pub streams: Vec<StreamConfig>,
}

/// One migration lineage
///
/// Scripts come from exactly one of `dir` (a directory of `.sql` files) or
/// `bundled` (a script set compiled into the binary).
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StreamConfig {
    pub name: String,
    pub dir: Option<PathBuf>,
    pub bundled: Option<String>,
    pub ledger_table: Option<String>,
}

impl StreamConfig {
    fn default_stream() -> Self {
        Self {
            name: DEFAULT_STREAM.to_string(),
            dir: Some(PathBuf::from(DEFAULT_MIGRATIONS_DIR)),
            bundled: None,
            ledger_table: None,
        }
    }

    /// `schema_ledger` for the default stream, `schema_ledger_<name>` otherwise
    pub fn ledger_table(&self) -> String {
        match &self.ledger_table {
            Some(table) => table.clone(),
            None if self.name == DEFAULT_STREAM => DEFAULT_LEDGER_TABLE.to_string(),
            None => format!("{}_{}", DEFAULT_LEDGER_TABLE, self.name),
        }
    }

    pub fn source(&self) -> Result<Box<dyn ScriptSource>> {
        match (&self.dir, &self.bundled) {
            (Some(dir), None) => Ok(Box::new(DirectorySource::new(dir))),
            (None, Some(name)) => embedded::bundled(name)
                .map(|source| Box::new(source) as Box<dyn ScriptSource>)
                .ok_or_else(|| {
                    config_error(format!(
                        "stream '{}': no bundled migrations named '{}'",
                        self.name, name
                    ))
                }),
            _ => Err(config_error(format!(
                "stream '{}': set exactly one of 'dir' or 'bundled'",
                self.name
            ))),
        }
    }
}

impl Default for StrataConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
            busy_timeout_ms: default_busy_timeout_ms(),
            lock_timeout_ms: default_lock_timeout_ms(),
            order_policy: OrderPolicy::default(),
            verify_checksums: true,
            streams: vec![StreamConfig::default_stream()],
        }
    }
}

impl StrataConfig {
    /// Load the config file at `path`
    ///
    /// A missing file is only an error when `required` is set; otherwise the
    /// single default stream is used with paths relative to the working
    /// directory.
    pub fn load(path: &Path, required: bool) -> Result<Self> {
        if !path.exists() {
            if required {
                return Err(ExError::new(ExErrorKind::Io)
                    .with_op("load_config")
                    .with_message(format!("config file not found: {}", path.display())));
            }
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path).map_err(|e| {
            ExError::new(ExErrorKind::Io)
                .with_op("load_config")
                .with_message(format!("cannot read {}: {}", path.display(), e))
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        Self::parse(&text, base)
    }

    /// Parse config text, resolving relative paths against `base`
    pub fn parse(text: &str, base: &Path) -> Result<Self> {
        let mut config: StrataConfig = toml::from_str(text).map_err(|e| {
            ExError::new(ExErrorKind::Serialization)
                .with_op("parse_config")
                .with_message(e.to_string())
        })?;

        if config.streams.is_empty() {
            config.streams.push(StreamConfig::default_stream());
        }

        let mut seen = HashSet::new();
        let mut tables = HashSet::new();
        for stream in &config.streams {
            if !seen.insert(stream.name.as_str()) {
                return Err(config_error(format!(
                    "stream '{}' is defined twice",
                    stream.name
                )));
            }
            // SQLite table names are case-insensitive
            let table = stream.ledger_table();
            if !tables.insert(table.to_ascii_lowercase()) {
                return Err(config_error(format!(
                    "stream '{}' reuses ledger table '{}'",
                    stream.name, table
                )));
            }
        }

        config.database = base.join(&config.database);
        for stream in &mut config.streams {
            if let Some(dir) = &stream.dir {
                stream.dir = Some(base.join(dir));
            }
        }

        Ok(config)
    }

    /// Every stream, or only `name`
    pub fn streams(&self, name: Option<&str>) -> Result<Vec<&StreamConfig>> {
        match name {
            None => Ok(self.streams.iter().collect()),
            Some(name) => self
                .streams
                .iter()
                .find(|s| s.name == name)
                .map(|s| vec![s])
                .ok_or_else(|| {
                    let known: Vec<String> = self.streams.iter().map(|s| s.name.clone()).collect();
                    config_error(format!("unknown stream '{}'", name)).with_candidates(known)
                }),
        }
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Runner settings for `stream` before command-line overrides
    pub fn runner_config(&self, stream: &StreamConfig) -> RunnerConfig {
        RunnerConfig::default()
            .with_ledger_table(stream.ledger_table())
            .with_order_policy(self.order_policy)
            .with_verify_checksums(self.verify_checksums)
            .with_lock(LockMode::Wait(Duration::from_millis(self.lock_timeout_ms)))
    }
}

fn config_error(message: String) -> ExError {
    ExError::new(ExErrorKind::Configuration)
        .with_op("load_config")
        .with_message(message)
}
