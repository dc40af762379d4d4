//! The orchestrator: replays leftovers from the last run, then walks every
//! category through discovery, filtering and deletion.

use crate::candidate::Category;
use crate::categories::{all_providers, TargetProvider};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::executor::{DeletionExecutor, DeletionOutcome, DeletionPolicy, FsRemover, Remover};
use crate::filter::{FilterPipeline, SkipReason};
use crate::locations::Locations;
use crate::process::{ProcessTerminator, SysinfoTerminator};
use crate::scheduler::{normalize_key, RebootScheduler};
use crate::stats::{Aggregator, CategorySkip, Report, RunOptions};
use rayon::prelude::*;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// Stops a run before its next candidate. The candidate in flight finishes.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Filtered(SkipReason),
    Executed(DeletionOutcome),
    /// Deleted at startup from the pending record.
    Replayed(DeletionOutcome),
}

/// One thing the engine did to one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub category: Category,
    pub path: PathBuf,
    pub action: Action,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Idle,
    Discovering,
    Filtering,
    Deleting,
    Skipped,
    Finalizing,
    Done,
}

impl Phase {
    fn can_advance_to(self, next: Phase) -> bool {
        use Phase::*;
        matches!(
            (self, next),
            (Idle, Discovering)
                | (Discovering, Filtering)
                | (Discovering, Skipped)
                | (Filtering, Deleting)
                | (Idle | Discovering | Filtering | Deleting | Skipped, Finalizing)
                | (Finalizing, Done)
        )
    }
}

/// Where one category is in its pass. Only ever moves forward.
struct CategoryRun {
    category: Category,
    phase: Phase,
}

impl CategoryRun {
    fn new(category: Category) -> Self {
        Self {
            category,
            phase: Phase::Idle,
        }
    }

    fn advance(&mut self, next: Phase) {
        if self.phase == next {
            return;
        }
        if !self.phase.can_advance_to(next) {
            warn!(category = %self.category, from = ?self.phase, to = ?next, "ignoring backward phase change");
            return;
        }
        debug!(category = %self.category, from = ?self.phase, to = ?next, "phase");
        self.phase = next;
    }
}

pub struct Engine {
    config: EngineConfig,
    filter: FilterPipeline,
    scheduler: RebootScheduler,
    locations: Locations,
    providers: Vec<Box<dyn TargetProvider>>,
    remover: Box<dyn Remover>,
    terminator: Box<dyn ProcessTerminator>,
    cancel: CancelToken,
    events: Option<Sender<Event>>,
}

impl Engine {
    /// Validate the configuration and open the pending record. Any problem
    /// here is reported before a single file is touched.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let filter = FilterPipeline::new(&config)?;
        let scheduler = RebootScheduler::open(config.pending_record_path()?)?;
        Ok(Self {
            config,
            filter,
            scheduler,
            locations: Locations::from_env(),
            providers: all_providers(),
            remover: Box::new(FsRemover),
            terminator: Box::new(SysinfoTerminator),
            cancel: CancelToken::new(),
            events: None,
        })
    }

    pub fn with_locations(mut self, locations: Locations) -> Self {
        self.locations = locations;
        self
    }

    pub fn with_remover(mut self, remover: impl Remover + 'static) -> Self {
        self.remover = Box::new(remover);
        self
    }

    pub fn with_terminator(mut self, terminator: impl ProcessTerminator + 'static) -> Self {
        self.terminator = Box::new(terminator);
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Run to completion on the calling thread.
    pub fn run(&self) -> Result<Report, EngineError> {
        let aggregator = Aggregator::new();
        info!(
            dry_run = self.config.dry_run,
            force = self.config.force,
            parallel = self.config.parallel,
            "cleanup run starting"
        );

        let pending = if self.config.dry_run {
            debug!("dry run, pending record left alone");
            HashSet::new()
        } else {
            self.replay_pending(&aggregator)?
        };

        let started = SystemTime::now();
        if self.config.parallel {
            self.providers
                .par_iter()
                .for_each(|provider| {
                    self.run_category(provider.as_ref(), &aggregator, &pending, started)
                });
        } else {
            for provider in &self.providers {
                self.run_category(provider.as_ref(), &aggregator, &pending, started);
            }
        }

        if self.cancel.is_cancelled() {
            warn!("run cancelled, report is partial");
            aggregator.mark_cancelled();
        }
        let report = aggregator.finalize(RunOptions::from(&self.config));
        info!(
            seen = report.totals.candidates_seen,
            deleted = report.totals.deleted,
            deferred = report.totals.deferred,
            failed = report.totals.failed,
            bytes_freed = report.totals.bytes_freed,
            "cleanup run finished"
        );
        Ok(report)
    }

    /// Run on a background thread, streaming events as they happen.
    pub fn spawn(mut self) -> Result<RunHandle, EngineError> {
        let (tx, rx) = mpsc::channel();
        self.events = Some(tx);
        let cancel = self.cancel.clone();
        let handle = thread::Builder::new()
            .name("tidysweep-run".to_string())
            .spawn(move || self.run())?;
        Ok(RunHandle {
            events: rx,
            handle,
            cancel,
        })
    }

    fn emit(&self, category: Category, path: PathBuf, action: Action) {
        if let Some(tx) = &self.events {
            // Nobody listening is fine.
            let _ = tx.send(Event {
                category,
                path,
                action,
            });
        }
    }

    /// Reconcile and replay the pending record. Returns the keys of entries
    /// that are still pending afterwards.
    fn replay_pending(&self, aggregator: &Aggregator) -> Result<HashSet<String>, EngineError> {
        let reconciled = self.scheduler.reconcile()?;
        aggregator.set_reconciled(reconciled);

        let replayed = self
            .scheduler
            .replay(self.remover.as_ref(), self.filter.matcher())?;
        for entry in replayed {
            if let Some(category) = entry.category {
                self.emit(
                    category,
                    entry.path.clone(),
                    Action::Replayed(DeletionOutcome::Deleted {
                        bytes_freed: entry.bytes_freed,
                    }),
                );
            }
            aggregator.record_replayed(entry);
        }

        Ok(self
            .scheduler
            .pending()?
            .entries
            .iter()
            .map(|e| normalize_key(&e.path))
            .collect())
    }

    fn skip_reason(&self, category: Category) -> Option<CategorySkip> {
        if !self.config.is_enabled(category) {
            return Some(CategorySkip::Disabled);
        }
        if category.requires_elevation() && !self.config.has_elevation(category) {
            return Some(CategorySkip::ElevationRequired);
        }
        None
    }

    fn run_category(
        &self,
        provider: &dyn TargetProvider,
        aggregator: &Aggregator,
        pending: &HashSet<String>,
        now: SystemTime,
    ) {
        let category = provider.category();
        let mut run = CategoryRun::new(category);
        aggregator.register(category);
        run.advance(Phase::Discovering);

        if let Some(reason) = self.skip_reason(category) {
            info!(%category, ?reason, "category skipped");
            aggregator.skip_category(category, reason);
            run.advance(Phase::Skipped);
            run.advance(Phase::Finalizing);
            run.advance(Phase::Done);
            return;
        }
        if self.cancel.is_cancelled() {
            run.advance(Phase::Finalizing);
            run.advance(Phase::Done);
            return;
        }

        let mut candidates = provider
            .enumerate(&self.locations)
            .with_exclusions(self.filter.matcher());
        let policy = DeletionPolicy {
            force: self.config.force,
            dry_run: self.config.dry_run,
            terminate_timeout: self.config.terminate_timeout(),
        };
        let executor = DeletionExecutor::new(
            policy,
            self.remover.as_ref(),
            self.terminator.as_ref(),
            &self.scheduler,
        )
        .with_exclusions(self.filter.matcher())
        .with_pending(pending);
        run.advance(Phase::Filtering);

        loop {
            if self.cancel.is_cancelled() {
                debug!(%category, "cancelled before next candidate");
                break;
            }
            let Some(candidate) = candidates.next() else {
                break;
            };

            let decision = self.filter.apply(&candidate, now);
            if !decision.proceed {
                debug!(%category, path = %candidate.path.display(), reason = ?decision.reason, "filtered");
                aggregator.record_filtered(category, decision.reason);
                self.emit(category, candidate.path, Action::Filtered(decision.reason));
                continue;
            }

            run.advance(Phase::Deleting);
            let execution = executor.execute(&candidate);
            match &execution.outcome {
                DeletionOutcome::Failed { kind } => {
                    warn!(%category, path = %candidate.path.display(), kind = kind.label(), "deletion failed")
                }
                outcome => {
                    debug!(%category, path = %candidate.path.display(), ?outcome, "executed")
                }
            }
            aggregator.record(category, &candidate, &execution);
            self.emit(category, candidate.path, Action::Executed(execution.outcome));
        }

        for message in candidates.take_diagnostics() {
            warn!(%category, "{message}");
            aggregator.diagnostic(format!("{category}: {message}"));
        }
        run.advance(Phase::Finalizing);

        if let Some(counters) = aggregator.snapshot(category) {
            info!(
                %category,
                seen = counters.candidates_seen,
                deleted = counters.deleted,
                deferred = counters.deferred,
                failed = counters.failed,
                bytes_freed = counters.bytes_freed,
                "category done"
            );
        }
        run.advance(Phase::Done);
    }
}

/// A run in progress on its own thread.
pub struct RunHandle {
    events: Receiver<Event>,
    handle: JoinHandle<Result<Report, EngineError>>,
    cancel: CancelToken,
}

impl RunHandle {
    /// Events in the order they happened. Ends when the run does.
    pub fn events(&self) -> mpsc::Iter<'_, Event> {
        self.events.iter()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the report. Unread events are discarded.
    pub fn join(self) -> Result<Report, EngineError> {
        drop(self.events);
        self.handle.join().map_err(|_| EngineError::WorkerPanicked)?
    }
}
