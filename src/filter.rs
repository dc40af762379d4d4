use crate::candidate::Candidate;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::exclude::ExclusionMatcher;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};

/// Why a candidate was held back, or `None` when it passed every check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    Age,
    Excluded,
    DryRun,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterDecision {
    /// Whether the candidate continues to the deletion step.
    pub proceed: bool,
    pub reason: SkipReason,
}

impl FilterDecision {
    fn pass() -> Self {
        Self {
            proceed: true,
            reason: SkipReason::None,
        }
    }

    fn hold(reason: SkipReason) -> Self {
        Self {
            proceed: false,
            reason,
        }
    }
}

/// Exclusion, then age, then the dry-run gate. The first failing check wins.
#[derive(Debug, Clone)]
pub struct FilterPipeline {
    matcher: ExclusionMatcher,
    min_age: Option<Duration>,
    dry_run: bool,
}

impl FilterPipeline {
    pub fn new(config: &EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            matcher: ExclusionMatcher::new(&config.exclude)?,
            min_age: config.min_age(),
            dry_run: config.dry_run,
        })
    }

    pub fn matcher(&self) -> &ExclusionMatcher {
        &self.matcher
    }

    pub fn apply(&self, candidate: &Candidate, now: SystemTime) -> FilterDecision {
        if self.matcher.is_excluded(&candidate.path) {
            return FilterDecision::hold(SkipReason::Excluded);
        }
        if !self.old_enough(candidate, now) {
            return FilterDecision::hold(SkipReason::Age);
        }
        if self.dry_run {
            // Still proceeds: the executor turns it into a SkippedDryRun outcome.
            return FilterDecision {
                proceed: true,
                reason: SkipReason::DryRun,
            };
        }
        FilterDecision::pass()
    }

    fn old_enough(&self, candidate: &Candidate, now: SystemTime) -> bool {
        let Some(min_age) = self.min_age else {
            return true;
        };
        // Unknown or future timestamps never count as old.
        match candidate.modified {
            Some(modified) => now
                .duration_since(modified)
                .map(|age| age >= min_age)
                .unwrap_or(false),
            None => false,
        }
    }
}
