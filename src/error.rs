//! Error types for the cleanup engine.
//!
//! Two layers: [`EngineError`] aborts a run before any deletion begins, while
//! [`ErrorKind`] classifies per-candidate failures that only ever land in the
//! report.

use serde::{Deserialize, Serialize};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Startup and configuration failures.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("invalid exclusion pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("pending-deletion record {path} is corrupt: {reason}")]
    CorruptRecord { path: PathBuf, reason: String },

    #[error("cannot access pending-deletion record {path}: {source}")]
    RecordIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("cannot parse config file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("cleanup worker panicked")]
    WorkerPanicked,
}

/// Classification of a failure affecting a single candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    /// Held open by another process. Recoverable by force or defer.
    LockedResource,
    PermissionDenied,
    /// The entry vanished before we got to it.
    NotFound,
    /// Some entries below a directory could not be removed.
    PartialDirectoryFailure,
    Io,
}

impl ErrorKind {
    /// Map an OS error onto the engine's taxonomy.
    pub fn classify(err: &io::Error) -> Self {
        if let Some(code) = err.raw_os_error() {
            if is_lock_code(code) {
                return ErrorKind::LockedResource;
            }
        }
        match err.kind() {
            io::ErrorKind::NotFound => ErrorKind::NotFound,
            io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
            _ => ErrorKind::Io,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ErrorKind::LockedResource => "locked",
            ErrorKind::PermissionDenied => "permission denied",
            ErrorKind::NotFound => "not found",
            ErrorKind::PartialDirectoryFailure => "partial directory failure",
            ErrorKind::Io => "I/O error",
        }
    }
}

// ERROR_ACCESS_DENIED, ERROR_SHARING_VIOLATION, ERROR_LOCK_VIOLATION
#[cfg(windows)]
fn is_lock_code(code: i32) -> bool {
    matches!(code, 5 | 32 | 33)
}

#[cfg(unix)]
fn is_lock_code(code: i32) -> bool {
    code == libc::EBUSY || code == libc::ETXTBSY
}

#[cfg(not(any(unix, windows)))]
fn is_lock_code(_code: i32) -> bool {
    false
}
