//! Cleanup engine for temp directories, recycle bins and browser stores.
//!
//! [`Engine::run`] discovers candidates per [`Category`], filters them by
//! exclusion and age, deletes what it can and defers locked entries to the
//! next run. Everything it did ends up in a [`Report`].

pub mod candidate;
pub mod categories;
pub mod config;
pub mod engine;
pub mod error;
pub mod exclude;
pub mod executor;
pub mod filter;
pub mod locations;
pub mod process;
pub mod scheduler;
pub mod stats;
pub mod utils;

pub use candidate::{Candidate, Category, EntryKind};
pub use config::EngineConfig;
pub use engine::{Action, CancelToken, Engine, Event, RunHandle};
pub use error::{EngineError, ErrorKind};
pub use exclude::ExclusionMatcher;
pub use executor::{DeferReason, DeletionOutcome, FsRemover, Remover};
pub use filter::{FilterDecision, FilterPipeline, SkipReason};
pub use locations::Locations;
pub use process::{ProcessTerminator, SysinfoTerminator, Termination};
pub use scheduler::{PendingRecord, RebootScheduler};
pub use stats::{CategorySkip, CategoryStats, Counters, Report};
