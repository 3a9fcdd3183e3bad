//! Strata CLI
//!
//! Command-line interface for applying and inspecting schema migrations

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use strata_core::logging_facility::{init, Profile};

mod commands;
mod config;

use config::StrataConfig;

#[derive(Debug, Parser)]
#[command(name = "strata")]
#[command(about = "Strata - Ordered, idempotent schema migrations", long_about = None)]
struct Cli {
    /// Config file (default: strata.toml, optional)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database path, overriding the config file
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Log format on stderr: dev or json
    #[arg(long, global = true, default_value = "dev")]
    log: Profile,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Apply pending migrations
    Apply(commands::apply::ApplyArgs),
    /// List migration status
    Status(commands::status::StatusArgs),
    /// Remove a stale migration lock
    Unlock(commands::unlock::UnlockArgs),
}

fn load_config(cli: &Cli) -> Result<StrataConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => StrataConfig::load(path, true)?,
        None => StrataConfig::load(Path::new(config::DEFAULT_CONFIG_FILE), false)?,
    };
    if let Some(db) = &cli.db {
        config.database = db.clone();
    }
    Ok(config)
}

fn main() {
    let cli = Cli::parse();
    init(cli.log);

    let result = load_config(&cli).and_then(|config| match cli.command {
        Commands::Apply(args) => commands::apply::execute(args, &config),
        Commands::Status(args) => commands::status::execute(args, &config),
        Commands::Unlock(args) => commands::unlock::execute(args, &config),
    });

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
