use colored::Colorize;
use tidysweep::utils::{display_path, format_size};
use tidysweep::{
    Action, CategorySkip, DeletionOutcome, Event, PendingRecord, Report, SkipReason,
};

pub fn print_banner(dry_run: bool) {
    let mode = if dry_run { " (dry run)" } else { "" };
    println!(
        "{}",
        format!("tidysweep v{}{mode}", env!("CARGO_PKG_VERSION"))
            .bold()
            .cyan()
    );
    println!();
}

pub fn print_event(event: &Event) {
    let path = display_path(&event.path);
    match &event.action {
        Action::Filtered(SkipReason::Excluded) => {
            println!("  {} {}", "Excluded".dimmed(), path.dimmed())
        }
        // Too-young entries are the common case; not worth a line each.
        Action::Filtered(_) => {}
        Action::Executed(outcome) => print_outcome(&path, outcome),
        Action::Replayed(outcome) => {
            println!(
                "  {} {}  {}",
                "Replayed".green(),
                path.dimmed(),
                format_size(outcome.bytes_freed()).yellow()
            )
        }
    }
}

fn print_outcome(path: &str, outcome: &DeletionOutcome) {
    match outcome {
        DeletionOutcome::Deleted { bytes_freed } => println!(
            "  {} {}  {}",
            "Deleted".red(),
            path.dimmed(),
            format_size(*bytes_freed).yellow()
        ),
        DeletionOutcome::Deferred { bytes_freed, .. } => println!(
            "  {} {}  {}",
            "Locked, deferred".yellow(),
            path.dimmed(),
            format_size(*bytes_freed).yellow()
        ),
        DeletionOutcome::Failed { kind } => println!(
            "  {} {}: {}",
            "Failed".red().bold(),
            path.dimmed(),
            kind.label().red()
        ),
        DeletionOutcome::SkippedDryRun { would_free } => println!(
            "  {} {}  {}",
            "Would delete".cyan(),
            path.dimmed(),
            format_size(*would_free).yellow()
        ),
    }
}

pub fn print_report(report: &Report) {
    println!();
    println!("{}", "=== Summary ===".bold().white());
    for stats in report.per_category.values() {
        let label = stats.category.label();
        match stats.skip_reason {
            Some(CategorySkip::ElevationRequired) => {
                println!("  {:<28} {}", label, "[needs elevation]".dimmed())
            }
            Some(CategorySkip::Disabled) => {}
            None => {
                let c = &stats.counters;
                let size = if report.dry_run {
                    format_size(c.would_free_bytes)
                } else {
                    format_size(c.bytes_freed)
                };
                let mut line = format!("  {:<28} {:>10}", label, size.green());
                if c.deferred > 0 {
                    line.push_str(&format!("  {}", format!("{} deferred", c.deferred).yellow()));
                }
                if c.failed > 0 {
                    line.push_str(&format!("  {}", format!("{} failed", c.failed).red()));
                }
                println!("{line}");
            }
        }
    }
    println!("  {}", "─".repeat(45).dimmed());

    let totals = &report.totals;
    if report.dry_run {
        println!(
            "  {:<28} {}",
            "Total reclaimable:".bold(),
            format_size(totals.would_free_bytes).green().bold()
        );
        println!();
        println!(
            "{}",
            "This was a dry run. Run `tidysweep clean` to delete."
                .yellow()
                .bold()
        );
    } else {
        println!(
            "  {:<28} {}",
            "Total freed:".bold(),
            format_size(totals.bytes_freed + report.replayed_bytes())
                .green()
                .bold()
        );
        println!(
            "  {} files, {} folders deleted; {} deferred; {} failed",
            totals.files_deleted, totals.dirs_deleted, totals.deferred, totals.failed
        );
        if !report.replayed.is_empty() {
            println!(
                "  {} leftovers from the last run removed",
                report.replayed.len()
            );
        }
    }

    if totals.deferred > 0 {
        print_info("Locked entries will be retried on the next run. Use --force to close browsers first.");
    }
    if report.cancelled {
        print_warning("Run was cancelled; the figures above are partial.");
    }
    for error in report.errors.iter().take(10) {
        println!(
            "  {} {}: {}",
            error.error_kind.label().red(),
            display_path(&error.path).dimmed(),
            error.message
        );
    }
    if report.errors.len() > 10 {
        println!("  ... and {} more errors", report.errors.len() - 10);
    }
}

pub fn print_pending(record: &PendingRecord) {
    if record.is_empty() {
        print_info("No deletions pending.");
        return;
    }
    println!("{}", format!("=== {} pending ===", record.len()).bold().white());
    for entry in &record.entries {
        let category = entry.category.map(|c| c.label()).unwrap_or("-");
        println!(
            "  {}  {:<20} {}",
            entry.deferred_at.format("%Y-%m-%d %H:%M"),
            category,
            display_path(&entry.path).dimmed()
        );
    }
}

pub fn print_warning(msg: &str) {
    println!("{} {}", "Warning:".red().bold(), msg.red());
}

pub fn print_info(msg: &str) {
    println!("{} {}", "Info:".cyan().bold(), msg);
}
