//! Exclusion pattern matching.
//!
//! Patterns are case-insensitive globs tested against the full absolute path
//! of an entry and of each of its ancestors, so excluding a directory also
//! protects everything below it.

use crate::error::EngineError;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::Path;

#[derive(Debug, Clone)]
pub struct ExclusionMatcher {
    glob_set: GlobSet,
    /// Raw pattern strings, deduplicated, in the order given.
    patterns: Vec<String>,
}

impl Default for ExclusionMatcher {
    fn default() -> Self {
        Self::empty()
    }
}

impl ExclusionMatcher {
    pub fn empty() -> Self {
        Self {
            glob_set: GlobSet::empty(),
            patterns: Vec::new(),
        }
    }

    /// Compile a list of patterns. An invalid glob is a configuration error.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, EngineError> {
        let mut builder = GlobSetBuilder::new();
        let mut pattern_list: Vec<String> = Vec::new();

        for pattern in patterns {
            let pattern = pattern.as_ref().trim();
            if pattern.is_empty() || pattern_list.iter().any(|p| p == pattern) {
                continue;
            }
            let glob = GlobBuilder::new(&normalize_pattern(pattern))
                .case_insensitive(true)
                .literal_separator(false)
                .build()
                .map_err(|source| EngineError::InvalidPattern {
                    pattern: pattern.to_string(),
                    source,
                })?;
            builder.add(glob);
            pattern_list.push(pattern.to_string());
        }

        let glob_set = builder.build().map_err(|source| EngineError::InvalidPattern {
            pattern: pattern_list.join(", "),
            source,
        })?;

        Ok(Self {
            glob_set,
            patterns: pattern_list,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// True if the path or any of its ancestors matches a pattern.
    pub fn is_excluded(&self, path: &Path) -> bool {
        if self.is_empty() {
            return false;
        }
        path.ancestors()
            .filter(|p| !p.as_os_str().is_empty())
            .any(|p| self.glob_set.is_match(normalize_path(p)))
    }
}

/// Forward slashes only, so one pattern works for both separator styles.
fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

// On Unix a backslash in a glob is an escape; on Windows it is a separator.
fn normalize_pattern(pattern: &str) -> String {
    if cfg!(windows) {
        pattern.replace('\\', "/")
    } else {
        pattern.to_string()
    }
}
