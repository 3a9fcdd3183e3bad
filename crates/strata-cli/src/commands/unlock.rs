//! Unlock command

use crate::commands::{database_exists, open_database};
use crate::config::StrataConfig;
use clap::Args;
use strata_store::migrations::{force_unlock, lock_holder};

#[derive(Debug, Args)]
pub struct UnlockArgs {
    /// Only unlock this stream
    #[arg(long)]
    pub stream: Option<String>,

    /// Delete the lock even though its holder may still be running
    #[arg(long)]
    pub force: bool,
}

pub fn execute(args: UnlockArgs, config: &StrataConfig) -> Result<(), Box<dyn std::error::Error>> {
    let streams = config.streams(args.stream.as_deref())?;
    if !database_exists(config) {
        println!("No database at {}; nothing to unlock", config.database.display());
        return Ok(());
    }
    let conn = open_database(config)?;

    for stream in streams {
        let runner = config.runner_config(stream);
        let Some(holder) = lock_holder(&conn, &runner)? else {
            println!("[{}] not locked", stream.name);
            continue;
        };

        if !args.force {
            return Err(format!(
                "[{}] locked by run {} since {}; re-run with --force if that run is dead",
                stream.name,
                holder.holder,
                holder.acquired_at.to_rfc3339()
            )
            .into());
        }

        if let Some(previous) = force_unlock(&conn, &runner)? {
            println!(
                "[{}] released lock held by run {} since {}",
                stream.name,
                previous.holder,
                previous.acquired_at.to_rfc3339()
            );
        }
    }

    Ok(())
}
