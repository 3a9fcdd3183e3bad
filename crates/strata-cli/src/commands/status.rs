//! Status command

use crate::commands::open_for_reading;
use crate::config::StrataConfig;
use clap::Args;
use strata_core::errors::{ExError, ExErrorKind};
use strata_store::migrations::{migration_status, MigrationState};

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Only show this stream
    #[arg(long)]
    pub stream: Option<String>,
}

pub fn execute(args: StatusArgs, config: &StrataConfig) -> Result<(), Box<dyn std::error::Error>> {
    let streams = config.streams(args.stream.as_deref())?;
    let conn = open_for_reading(config)?;

    let mut drifted = Vec::new();
    for stream in streams {
        let scripts = stream.source()?.load()?;
        let runner = config.runner_config(stream);
        let statuses = migration_status(&conn, scripts, &runner)?;

        println!("{} ({})", stream.name, runner.ledger_table);
        for status in &statuses {
            let applied_at = status
                .state
                .applied_at()
                .map(|at| at.to_rfc3339())
                .unwrap_or_else(|| "-".to_string());
            println!("  {:<40} {:<8} {}", status.id, status.state.label(), applied_at);

            if matches!(status.state, MigrationState::Applied { drifted: true, .. }) {
                drifted.push(status.id.clone());
            }
        }
    }

    if drifted.is_empty() {
        return Ok(());
    }
    Err(ExError::new(ExErrorKind::DriftDetected)
        .with_op("status")
        .with_message(format!(
            "{} applied migration(s) changed since they were recorded",
            drifted.len()
        ))
        .with_candidates(drifted)
        .into())
}
