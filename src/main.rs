mod cli;
mod output;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command, RunArgs};
use std::path::PathBuf;
use tidysweep::{Engine, PendingRecord};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);

    match cli.command {
        Command::Scan { run } => clean(&run, true, false, cli.quiet),
        Command::Clean {
            run,
            dry_run,
            force,
        } => clean(&run, dry_run, force, cli.quiet),
        Command::Pending { config, record } => pending(config, record),
    }
}

fn init_logging(quiet: bool, verbose: bool) {
    let default = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn clean(args: &RunArgs, dry_run: bool, force: bool, quiet: bool) -> Result<()> {
    let config = args.to_config(dry_run, force)?;
    let dry_run = config.dry_run;
    let engine = Engine::new(config).context("cannot start cleanup")?;

    if !quiet {
        output::print_banner(dry_run);
    }
    let handle = engine.spawn()?;
    if !quiet {
        for event in handle.events() {
            output::print_event(&event);
        }
    }
    let report = handle.join()?;
    output::print_report(&report);

    if let Some(path) = &args.json {
        let json = report.to_json().context("cannot serialize report")?;
        std::fs::write(path, json)
            .with_context(|| format!("cannot write report to {}", path.display()))?;
        output::print_info(&format!("Report written to {}", path.display()));
    }
    Ok(())
}

fn pending(config: Option<PathBuf>, record: Option<PathBuf>) -> Result<()> {
    let path = match record {
        Some(path) => path,
        None => cli::load_config(config.as_ref())?.pending_record_path()?,
    };
    let record = PendingRecord::load(&path)?;
    output::print_pending(&record);
    Ok(())
}
