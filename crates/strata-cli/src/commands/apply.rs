//! Apply command

use crate::commands::{open_database, open_for_reading};
use crate::config::StrataConfig;
use clap::Args;
use strata_core::OrderPolicy;
use strata_store::migrations::{apply_migrations, plan_migrations, ApplyReport, LockMode};

#[derive(Debug, Args)]
pub struct ApplyArgs {
    /// Only apply this stream
    #[arg(long)]
    pub stream: Option<String>,

    /// Show what would be applied without touching the database
    #[arg(long)]
    pub dry_run: bool,

    /// Apply scripts that order before already-applied ones
    #[arg(long)]
    pub allow_out_of_order: bool,

    /// Skip checksum verification of applied scripts
    #[arg(long)]
    pub no_verify: bool,

    /// Fail immediately if another runner holds the lock
    #[arg(long)]
    pub no_wait: bool,
}

pub fn execute(args: ApplyArgs, config: &StrataConfig) -> Result<(), Box<dyn std::error::Error>> {
    let streams = config.streams(args.stream.as_deref())?;
    // A dry run must not create the file or switch its journal mode
    let mut conn = if args.dry_run {
        open_for_reading(config)?
    } else {
        open_database(config)?
    };

    for stream in streams {
        let scripts = stream.source()?.load()?;

        let mut runner = config.runner_config(stream);
        if args.allow_out_of_order {
            runner = runner.with_order_policy(OrderPolicy::AllowOutOfOrder);
        }
        if args.no_verify {
            runner = runner.with_verify_checksums(false);
        }
        if args.no_wait {
            runner = runner.with_lock(LockMode::NoWait);
        }

        tracing::debug!(stream = stream.name.as_str(), scripts = scripts.len(), "stream loaded");
        let report = if args.dry_run {
            plan_migrations(&mut conn, scripts, &runner)?
        } else {
            apply_migrations(&mut conn, scripts, &runner)?
        };

        print_report(&stream.name, &report);
        report.into_result()?;
    }

    Ok(())
}

fn print_report(stream: &str, report: &ApplyReport) {
    let verb = if report.dry_run { "would apply" } else { "applied" };
    for id in &report.applied {
        println!("[{}] {} {}", stream, verb, id);
    }
    for id in &report.applied_elsewhere {
        println!("[{}] applied by another runner {}", stream, id);
    }
    for id in &report.unknown {
        eprintln!("[{}] warning: ledger entry {} matches no known migration", stream, id);
    }
    if let Some(failed) = &report.failed {
        println!("[{}] failed {}", stream, failed.id);
        for id in &report.not_attempted {
            println!("[{}] not attempted {}", stream, id);
        }
    }

    println!(
        "[{}] {} {}, {} skipped{}",
        stream,
        report.applied.len(),
        if report.dry_run { "pending" } else { "applied" },
        report.skipped.len(),
        if report.dry_run { " (dry run, nothing written)" } else { "" }
    );
}
