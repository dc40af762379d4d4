//! Per-category counters and the final run report.

use crate::candidate::{Candidate, Category, EntryKind};
use crate::config::EngineConfig;
use crate::error::ErrorKind;
use crate::executor::{DeletionOutcome, Execution};
use crate::filter::SkipReason;
use crate::scheduler::Replayed;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Counters {
    pub candidates_seen: u64,
    pub deleted: u64,
    pub deferred: u64,
    pub failed: u64,
    pub bytes_freed: u64,
    pub files_deleted: u64,
    pub dirs_deleted: u64,
    pub skipped_excluded: u64,
    pub skipped_age: u64,
    pub skipped_dry_run: u64,
    /// Bytes a dry run found; never mixed into `bytes_freed`.
    pub would_free_bytes: u64,
}

impl Counters {
    /// Candidates that never reached an actual deletion attempt.
    pub fn filtered(&self) -> u64 {
        self.skipped_excluded + self.skipped_age + self.skipped_dry_run
    }

    /// Every seen candidate is accounted for exactly once.
    pub fn is_balanced(&self) -> bool {
        self.deleted + self.deferred + self.failed + self.filtered() == self.candidates_seen
    }

    fn add(&mut self, other: &Counters) {
        self.candidates_seen += other.candidates_seen;
        self.deleted += other.deleted;
        self.deferred += other.deferred;
        self.failed += other.failed;
        self.bytes_freed += other.bytes_freed;
        self.files_deleted += other.files_deleted;
        self.dirs_deleted += other.dirs_deleted;
        self.skipped_excluded += other.skipped_excluded;
        self.skipped_age += other.skipped_age;
        self.skipped_dry_run += other.skipped_dry_run;
        self.would_free_bytes += other.would_free_bytes;
    }
}

/// Why a whole category was not processed. Not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CategorySkip {
    ElevationRequired,
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryStats {
    pub category: Category,
    #[serde(flatten)]
    pub counters: Counters,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<CategorySkip>,
}

impl CategoryStats {
    fn new(category: Category) -> Self {
        Self {
            category,
            counters: Counters::default(),
            skip_reason: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    pub category: Category,
    pub path: PathBuf,
    pub error_kind: ErrorKind,
    pub message: String,
}

/// A pending entry from an earlier run that was deleted at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayedEntry {
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    pub kind: EntryKind,
    pub bytes_freed: u64,
}

impl From<Replayed> for ReplayedEntry {
    fn from(replayed: Replayed) -> Self {
        Self {
            path: replayed.path,
            category: replayed.category,
            kind: if replayed.was_dir {
                EntryKind::Directory
            } else {
                EntryKind::File
            },
            bytes_freed: replayed.bytes_freed,
        }
    }
}

/// The options a run was started with, echoed into the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOptions {
    pub dry_run: bool,
    pub min_age_days: f64,
    pub exclude: Vec<String>,
    pub force: bool,
    pub parallel: bool,
    pub categories: Vec<Category>,
}

impl From<&EngineConfig> for RunOptions {
    fn from(config: &EngineConfig) -> Self {
        Self {
            dry_run: config.dry_run,
            min_age_days: config.min_age_days,
            exclude: config.exclude.clone(),
            force: config.force,
            parallel: config.parallel,
            categories: Category::ALL
                .into_iter()
                .filter(|c| config.is_enabled(*c))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub per_category: BTreeMap<Category, CategoryStats>,
    pub totals: Counters,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub dry_run: bool,
    pub cancelled: bool,
    pub options: RunOptions,
    /// Pending entries dropped at startup because they were already gone.
    pub reconciled: usize,
    pub replayed: Vec<ReplayedEntry>,
    pub errors: Vec<ErrorRecord>,
    pub diagnostics: Vec<String>,
}

impl Report {
    /// Totals equal the per-category sums and every category balances.
    pub fn is_consistent(&self) -> bool {
        let mut sum = Counters::default();
        for stats in self.per_category.values() {
            if !stats.counters.is_balanced() {
                return false;
            }
            sum.add(&stats.counters);
        }
        sum == self.totals && self.totals.is_balanced()
    }

    pub fn replayed_bytes(&self) -> u64 {
        self.replayed.iter().map(|r| r.bytes_freed).sum()
    }

    pub fn category(&self, category: Category) -> Option<&CategoryStats> {
        self.per_category.get(&category)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[derive(Default)]
struct State {
    per_category: BTreeMap<Category, CategoryStats>,
    totals: Counters,
    errors: Vec<ErrorRecord>,
    diagnostics: Vec<String>,
    replayed: Vec<ReplayedEntry>,
    reconciled: usize,
    cancelled: bool,
}

impl State {
    /// Apply `f` to one category and to the totals in the same step.
    fn bump(&mut self, category: Category, f: impl Fn(&mut Counters)) {
        let stats = self
            .per_category
            .entry(category)
            .or_insert_with(|| CategoryStats::new(category));
        f(&mut stats.counters);
        f(&mut self.totals);
    }
}

/// Collects outcomes from any number of category workers.
///
/// All updates go through one mutex, so a candidate's outcome lands in its
/// category and in the totals atomically and the report balances no matter
/// how workers interleave.
pub struct Aggregator {
    started_at: DateTime<Utc>,
    state: Mutex<State>,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl Aggregator {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            state: Mutex::new(State::default()),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make a category show up in the report even with zero candidates.
    pub fn register(&self, category: Category) {
        self.state()
            .per_category
            .entry(category)
            .or_insert_with(|| CategoryStats::new(category));
    }

    pub fn skip_category(&self, category: Category, reason: CategorySkip) {
        self.state()
            .per_category
            .entry(category)
            .or_insert_with(|| CategoryStats::new(category))
            .skip_reason = Some(reason);
    }

    pub fn record_filtered(&self, category: Category, reason: SkipReason) {
        self.state().bump(category, |c| {
            c.candidates_seen += 1;
            match reason {
                SkipReason::Excluded => c.skipped_excluded += 1,
                SkipReason::Age => c.skipped_age += 1,
                SkipReason::DryRun | SkipReason::None => c.skipped_dry_run += 1,
            }
        });
    }

    /// Count one executed candidate and keep whatever went wrong on the way.
    pub fn record(&self, category: Category, candidate: &Candidate, execution: &Execution) {
        let is_dir = candidate.is_dir();
        let mut state = self.state();
        state.bump(category, |c| {
            c.candidates_seen += 1;
            match execution.outcome {
                DeletionOutcome::Deleted { bytes_freed } => {
                    c.deleted += 1;
                    c.bytes_freed += bytes_freed;
                    if !is_dir {
                        c.files_deleted += 1;
                    } else if execution.root_removed {
                        c.dirs_deleted += 1;
                    }
                }
                DeletionOutcome::Deferred { bytes_freed, .. } => {
                    c.deferred += 1;
                    c.bytes_freed += bytes_freed;
                }
                DeletionOutcome::Failed { .. } => c.failed += 1,
                DeletionOutcome::SkippedDryRun { would_free } => {
                    c.skipped_dry_run += 1;
                    c.would_free_bytes += would_free;
                }
            }
        });

        if let DeletionOutcome::Failed { kind } = execution.outcome {
            if execution.issues.is_empty() {
                state.errors.push(ErrorRecord {
                    category,
                    path: candidate.path.clone(),
                    error_kind: kind,
                    message: kind.label().to_string(),
                });
            }
        }
        for issue in &execution.issues {
            state.errors.push(ErrorRecord {
                category,
                path: issue.path.clone(),
                error_kind: issue.kind,
                message: issue.message.clone(),
            });
        }
    }

    pub fn record_replayed(&self, replayed: Replayed) {
        self.state().replayed.push(replayed.into());
    }

    pub fn set_reconciled(&self, count: usize) {
        self.state().reconciled = count;
    }

    pub fn diagnostic(&self, message: impl Into<String>) {
        self.state().diagnostics.push(message.into());
    }

    pub fn mark_cancelled(&self) {
        self.state().cancelled = true;
    }

    /// Counters of one category as they stand right now.
    pub fn snapshot(&self, category: Category) -> Option<Counters> {
        self.state().per_category.get(&category).map(|s| s.counters)
    }

    /// Freeze everything into the report. Consumes the aggregator, so a run
    /// finalizes exactly once.
    pub fn finalize(self, options: RunOptions) -> Report {
        let started_at = self.started_at;
        let state = self.state.into_inner().unwrap_or_else(PoisonError::into_inner);
        Report {
            per_category: state.per_category,
            totals: state.totals,
            started_at,
            finished_at: Utc::now(),
            dry_run: options.dry_run,
            cancelled: state.cancelled,
            options,
            reconciled: state.reconciled,
            replayed: state.replayed,
            errors: state.errors,
            diagnostics: state.diagnostics,
        }
    }
}
