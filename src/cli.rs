use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::collections::BTreeSet;
use std::path::PathBuf;
use tidysweep::{Category, EngineConfig};

#[derive(Parser)]
#[command(
    name = "tidysweep",
    about = "Clean temp files, recycle bins and browser caches",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Only print warnings and the summary
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log every candidate
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show what would be cleaned without deleting anything
    Scan {
        #[command(flatten)]
        run: RunArgs,
    },

    /// Delete what the scan finds
    Clean {
        #[command(flatten)]
        run: RunArgs,

        /// Report only, like `scan`
        #[arg(long)]
        dry_run: bool,

        /// Close browsers holding their files open before giving up on them
        #[arg(long)]
        force: bool,
    },

    /// List deletions deferred to the next run
    Pending {
        /// Config file naming the pending record location
        #[arg(long)]
        config: Option<PathBuf>,

        /// Pending record to read instead of the configured one
        #[arg(long)]
        record: Option<PathBuf>,
    },
}

#[derive(Args)]
pub struct RunArgs {
    /// Only touch entries last modified at least DAYS ago
    #[arg(long, value_name = "DAYS")]
    pub older_than: Option<f64>,

    /// Glob of paths to leave alone (repeatable)
    #[arg(long, value_name = "GLOB")]
    pub exclude: Vec<String>,

    /// Only run these categories (repeatable)
    #[arg(long, value_name = "NAME")]
    pub category: Vec<Category>,

    /// Skip every browser category
    #[arg(long)]
    pub no_browser: bool,

    /// The caller already runs elevated; enable system-wide categories
    #[arg(long)]
    pub elevated: bool,

    /// Process categories concurrently
    #[arg(long)]
    pub parallel: bool,

    /// Write the JSON report to this file
    #[arg(long, value_name = "PATH")]
    pub json: Option<PathBuf>,

    /// TOML config file; flags override it
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

pub fn load_config(path: Option<&PathBuf>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::from_toml_file(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

impl RunArgs {
    /// The config file, with command-line flags layered on top.
    pub fn to_config(&self, dry_run: bool, force: bool) -> Result<EngineConfig> {
        let mut config = load_config(self.config.as_ref())?;
        config.dry_run |= dry_run;
        config.force |= force;
        config.parallel |= self.parallel;
        config.elevated_all |= self.elevated;
        if let Some(days) = self.older_than {
            config.min_age_days = days;
        }
        config.exclude.extend(self.exclude.iter().cloned());

        if !self.category.is_empty() {
            config.categories = Some(self.category.iter().copied().collect());
        }
        if self.no_browser {
            let enabled: BTreeSet<Category> = Category::ALL
                .into_iter()
                .filter(|c| config.is_enabled(*c) && !c.is_browser())
                .collect();
            config.categories = Some(enabled);
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_clean_flags_reach_the_config() {
        let cli = parse(&[
            "tidysweep",
            "clean",
            "--force",
            "--older-than",
            "2",
            "--exclude",
            "*secret*",
            "--category",
            "user-temp",
            "--category",
            "chrome",
            "--no-browser",
        ]);
        let Command::Clean { run, dry_run, force } = cli.command else {
            panic!("expected clean");
        };
        let config = run.to_config(dry_run, force).unwrap();

        assert!(config.force);
        assert!(!config.dry_run);
        assert_eq!(config.min_age_days, 2.0);
        assert_eq!(config.exclude, vec!["*secret*".to_string()]);
        assert!(config.is_enabled(Category::UserTemp));
        assert!(!config.is_enabled(Category::Chrome));
    }

    #[test]
    fn test_scan_is_always_dry() {
        let cli = parse(&["tidysweep", "scan", "--elevated"]);
        let Command::Scan { run } = cli.command else {
            panic!("expected scan");
        };
        let config = run.to_config(true, false).unwrap();
        assert!(config.dry_run);
        assert!(config.has_elevation(Category::Prefetch));
    }

    #[test]
    fn test_unknown_category_is_rejected() {
        assert!(Cli::try_parse_from(["tidysweep", "scan", "--category", "downloads"]).is_err());
    }
}
