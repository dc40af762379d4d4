//! Pending-deletion record for entries that were locked during a run.
//!
//! The record is a JSON file listing absolute paths, deduplicated
//! case-insensitively. Every change is a read-modify-write under an exclusive
//! lock on a sidecar `.lock` file, held only for the update itself.
//!
//! On Windows a deferred path is also handed to `MoveFileExW` with
//! `MOVEFILE_DELAY_UNTIL_REBOOT`. Elsewhere, or when that call is refused,
//! the next engine run replays the record before it enumerates anything.

use crate::candidate::Category;
use crate::error::{EngineError, ErrorKind};
use crate::exclude::ExclusionMatcher;
use crate::executor::{remove_tree, Remover};
use chrono::{DateTime, Utc};
use fd_lock::RwLock;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info, warn};

const RECORD_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingEntry {
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    pub deferred_at: DateTime<Utc>,
    /// The OS accepted the path for deletion at the next boot.
    #[serde(default)]
    pub at_boot: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingRecord {
    pub version: u32,
    pub entries: Vec<PendingEntry>,
}

impl Default for PendingRecord {
    fn default() -> Self {
        Self {
            version: RECORD_VERSION,
            entries: Vec::new(),
        }
    }
}

/// Key used for deduplication: forward slashes, no trailing separator, lowercase.
pub fn normalize_key(path: &Path) -> String {
    let text = path.to_string_lossy().replace('\\', "/");
    let trimmed = text.trim_end_matches('/');
    if trimmed.is_empty() {
        text.to_lowercase()
    } else {
        trimmed.to_lowercase()
    }
}

impl PendingRecord {
    /// Read a record. A missing or empty file is an empty record; anything
    /// unparsable is corrupt.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(EngineError::RecordIo {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let record: Self =
            serde_json::from_str(&content).map_err(|e| EngineError::CorruptRecord {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        if record.version != RECORD_VERSION {
            return Err(EngineError::CorruptRecord {
                path: path.to_path_buf(),
                reason: format!("unsupported record version {}", record.version),
            });
        }
        Ok(record)
    }

    /// Write through a temp file and rename so readers never see a torn file.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let tmp = path.with_extension("json.tmp");
        {
            let mut file = File::create(&tmp)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        let key = normalize_key(path);
        self.entries.iter().any(|e| normalize_key(&e.path) == key)
    }

    /// Returns false if the path was already pending.
    pub fn insert(&mut self, entry: PendingEntry) -> bool {
        if self.contains(&entry.path) {
            return false;
        }
        self.entries.push(entry);
        true
    }

    pub fn remove(&mut self, path: &Path) -> bool {
        let key = normalize_key(path);
        let before = self.entries.len();
        self.entries.retain(|e| normalize_key(&e.path) != key);
        self.entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A pending entry that the startup replay managed to delete.
#[derive(Debug, Clone, PartialEq)]
pub struct Replayed {
    pub path: PathBuf,
    pub category: Option<Category>,
    pub bytes_freed: u64,
    pub was_dir: bool,
}

pub struct RebootScheduler {
    record_path: PathBuf,
    lock_path: PathBuf,
    guard: Mutex<()>,
}

impl RebootScheduler {
    /// Open the record at `path`, failing if it exists but cannot be parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, EngineError> {
        let record_path = path.into();
        let lock_path = record_path.with_extension("lock");
        PendingRecord::load(&record_path)?;
        Ok(Self {
            record_path,
            lock_path,
            guard: Mutex::new(()),
        })
    }

    pub fn pending(&self) -> Result<PendingRecord, EngineError> {
        self.locked(|| PendingRecord::load(&self.record_path))
    }

    /// Remember `path` for deletion later. Deferring twice is a no-op.
    pub fn defer(&self, path: &Path, category: Option<Category>) -> Result<bool, EngineError> {
        let added = self.update(|record| {
            if record.contains(path) {
                return false;
            }
            let at_boot = match delete_at_boot(path) {
                Ok(()) => true,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "no boot-time delete, relying on replay");
                    false
                }
            };
            record.insert(PendingEntry {
                path: path.to_path_buf(),
                category,
                deferred_at: Utc::now(),
                at_boot,
            })
        })?;
        if added {
            info!(path = %path.display(), "deletion deferred");
        }
        Ok(added)
    }

    pub fn forget(&self, path: &Path) -> Result<bool, EngineError> {
        self.update(|record| record.remove(path))
    }

    /// Drop entries that no longer exist. Returns how many were dropped.
    pub fn reconcile(&self) -> Result<usize, EngineError> {
        let removed = self.update(|record| {
            let before = record.entries.len();
            record
                .entries
                .retain(|e| fs::symlink_metadata(&e.path).is_ok());
            before - record.entries.len()
        })?;
        if removed > 0 {
            info!(removed, "pending deletions already gone");
        }
        Ok(removed)
    }

    /// Try to delete every pending entry now. Deletion happens outside the
    /// lock; successes are then dropped from the record in one update.
    pub fn replay(
        &self,
        remover: &dyn Remover,
        exclusions: &ExclusionMatcher,
    ) -> Result<Vec<Replayed>, EngineError> {
        let snapshot = self.pending()?;
        let mut done = Vec::new();

        for entry in snapshot.entries {
            if exclusions.is_excluded(&entry.path) {
                debug!(path = %entry.path.display(), "pending entry excluded, leaving it");
                continue;
            }
            let was_dir = fs::symlink_metadata(&entry.path)
                .map(|m| m.is_dir())
                .unwrap_or(false);
            match remove_tree(remover, &entry.path) {
                Ok(bytes_freed) => done.push(Replayed {
                    path: entry.path,
                    category: entry.category,
                    bytes_freed,
                    was_dir,
                }),
                Err(e) if ErrorKind::classify(&e) == ErrorKind::NotFound => done.push(Replayed {
                    path: entry.path,
                    category: entry.category,
                    bytes_freed: 0,
                    was_dir,
                }),
                Err(e) => {
                    warn!(path = %entry.path.display(), error = %e, "pending entry still not deletable");
                }
            }
        }

        if !done.is_empty() {
            self.update(|record| {
                for replayed in &done {
                    record.remove(&replayed.path);
                }
                true
            })?;
            info!(count = done.len(), "pending deletions replayed");
        }
        Ok(done)
    }

    /// Run `f` against the current record under both the in-process guard
    /// and the file lock. The record is written back only when `f` says so.
    fn update<T, F>(&self, f: F) -> Result<T, EngineError>
    where
        F: FnOnce(&mut PendingRecord) -> T,
        T: Changed,
    {
        self.locked(|| {
            let mut record = PendingRecord::load(&self.record_path)?;
            let result = f(&mut record);
            if result.changed() {
                record
                    .save(&self.record_path)
                    .map_err(|source| EngineError::RecordIo {
                        path: self.record_path.clone(),
                        source,
                    })?;
            }
            Ok(result)
        })
    }

    /// Threads in this process queue on the mutex, other processes on the
    /// lock file.
    fn locked<T>(&self, f: impl FnOnce() -> Result<T, EngineError>) -> Result<T, EngineError> {
        let _guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        let lock_err = |source: io::Error| EngineError::RecordIo {
            path: self.lock_path.clone(),
            source,
        };
        let mut lock = RwLock::new(open_lock_file(&self.lock_path).map_err(lock_err)?);
        let _held = lock.write().map_err(lock_err)?;
        f()
    }
}

/// Whether an update closure modified the record.
trait Changed {
    fn changed(&self) -> bool;
}

impl Changed for bool {
    fn changed(&self) -> bool {
        *self
    }
}

impl Changed for usize {
    fn changed(&self) -> bool {
        *self > 0
    }
}

fn open_lock_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path)
}

#[cfg(windows)]
fn delete_at_boot(path: &Path) -> io::Result<()> {
    use std::os::windows::ffi::OsStrExt;
    use windows_sys::Win32::Storage::FileSystem::{MoveFileExW, MOVEFILE_DELAY_UNTIL_REBOOT};

    let wide: Vec<u16> = path
        .as_os_str()
        .encode_wide()
        .chain(std::iter::once(0))
        .collect();
    // SAFETY: `wide` is NUL-terminated and outlives the call. A null target
    // asks for deletion instead of a rename.
    let ok = unsafe { MoveFileExW(wide.as_ptr(), std::ptr::null(), MOVEFILE_DELAY_UNTIL_REBOOT) };
    if ok == 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(not(windows))]
fn delete_at_boot(_path: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "no delete-on-reboot primitive on this platform",
    ))
}
