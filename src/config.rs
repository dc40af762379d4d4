use crate::candidate::Category;
use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default wait for a terminated process to exit, per attempt.
const DEFAULT_TERMINATE_TIMEOUT_MS: u64 = 3000;

const RECORD_DIR: &str = "tidysweep";
const RECORD_FILE: &str = "pending-deletions.json";

/// Everything a run needs to know. Loadable from TOML; every field defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub dry_run: bool,
    /// Only delete entries last modified at least this many days ago.
    pub min_age_days: f64,
    pub exclude: Vec<String>,
    /// Terminate browsers holding locks before deferring.
    pub force: bool,
    /// `None` enables every category.
    pub categories: Option<BTreeSet<Category>>,
    /// Categories for which the caller has confirmed elevation.
    pub elevated: BTreeSet<Category>,
    pub elevated_all: bool,
    /// One worker per category instead of a sequential pass.
    pub parallel: bool,
    pub pending_record: Option<PathBuf>,
    pub terminate_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            min_age_days: 0.0,
            exclude: Vec::new(),
            force: false,
            categories: None,
            elevated: BTreeSet::new(),
            elevated_all: false,
            parallel: false,
            pending_record: None,
            terminate_timeout_ms: DEFAULT_TERMINATE_TIMEOUT_MS,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, EngineError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, EngineError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if !self.min_age_days.is_finite() || self.min_age_days < 0.0 {
            return Err(EngineError::Config(format!(
                "min_age_days must be a non-negative number, got {}",
                self.min_age_days
            )));
        }
        if self.terminate_timeout_ms == 0 {
            return Err(EngineError::Config(
                "terminate_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_enabled(&self, category: Category) -> bool {
        self.categories
            .as_ref()
            .map_or(true, |set| set.contains(&category))
    }

    pub fn has_elevation(&self, category: Category) -> bool {
        self.elevated_all || self.elevated.contains(&category)
    }

    /// `None` when the age filter is off.
    pub fn min_age(&self) -> Option<Duration> {
        if self.min_age_days > 0.0 && self.min_age_days.is_finite() {
            Some(Duration::from_secs_f64(self.min_age_days * 86_400.0))
        } else {
            None
        }
    }

    pub fn terminate_timeout(&self) -> Duration {
        Duration::from_millis(self.terminate_timeout_ms)
    }

    /// Where the pending-deletion record lives.
    pub fn pending_record_path(&self) -> Result<PathBuf, EngineError> {
        if let Some(path) = &self.pending_record {
            return Ok(path.clone());
        }
        dirs::data_local_dir()
            .map(|dir| dir.join(RECORD_DIR).join(RECORD_FILE))
            .ok_or_else(|| {
                EngineError::Config(
                    "cannot determine a location for the pending-deletion record".to_string(),
                )
            })
    }
}
