//! Deletion of filtered candidates, with the locked-file fallback.
//!
//! A locked entry is retried once after closing the owning browser (force
//! mode, browser categories only) and otherwise handed to the reboot
//! scheduler. Directories are removed bottom-up and report one composite
//! outcome: any deferred entry makes the directory deferred, failures with
//! nothing removed make it failed, anything else counts as deleted with the
//! bytes actually freed.

use crate::candidate::{Candidate, Category};
use crate::error::ErrorKind;
use crate::exclude::ExclusionMatcher;
use crate::process::{ProcessTerminator, Termination};
use crate::scheduler::{normalize_key, RebootScheduler};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// How many times to close lock holders before the single retry.
const TERMINATE_ATTEMPTS: u32 = 2;

const TERMINATE_BACKOFF: Duration = Duration::from_millis(250);

/// Filesystem mutation used by the executor.
pub trait Remover: Send + Sync {
    fn remove_file(&self, path: &Path) -> io::Result<()>;
    /// Remove an empty directory.
    fn remove_dir(&self, path: &Path) -> io::Result<()>;
}

pub struct FsRemover;

impl Remover for FsRemover {
    /// Read-only files refuse deletion on Windows, so the attribute is
    /// cleared and the removal retried once.
    #[cfg(windows)]
    fn remove_file(&self, path: &Path) -> io::Result<()> {
        match fs::remove_file(path) {
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                let mut perms = fs::symlink_metadata(path)?.permissions();
                if !perms.readonly() {
                    return Err(e);
                }
                #[allow(clippy::permissions_set_readonly_false)]
                perms.set_readonly(false);
                fs::set_permissions(path, perms)?;
                fs::remove_file(path)
            }
            other => other,
        }
    }

    /// On Unix the file's own mode never blocks unlinking, and a denial
    /// comes from the parent directory. It is reported as is.
    #[cfg(not(windows))]
    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn remove_dir(&self, path: &Path) -> io::Result<()> {
        fs::remove_dir(path)
    }
}

/// Remove a file or a whole tree, returning the bytes freed. Stops at the
/// first error. Used for replaying pending entries.
pub fn remove_tree(remover: &dyn Remover, path: &Path) -> io::Result<u64> {
    let meta = fs::symlink_metadata(path)?;
    if !meta.is_dir() {
        remover.remove_file(path)?;
        return Ok(meta.len());
    }

    let mut freed = 0u64;
    for entry in WalkDir::new(path).follow_links(false).contents_first(true) {
        let entry = entry.map_err(io::Error::from)?;
        if entry.file_type().is_dir() {
            remover.remove_dir(entry.path())?;
        } else {
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            remover.remove_file(entry.path())?;
            freed += size;
        }
    }
    Ok(freed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeferReason {
    Locked,
}

/// What happened to one candidate that survived filtering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum DeletionOutcome {
    Deleted {
        bytes_freed: u64,
    },
    /// Left for the next boot or run. `bytes_freed` covers whatever part of a
    /// directory could be removed now.
    Deferred {
        reason: DeferReason,
        bytes_freed: u64,
    },
    Failed {
        kind: ErrorKind,
    },
    SkippedDryRun {
        would_free: u64,
    },
}

impl DeletionOutcome {
    pub fn bytes_freed(&self) -> u64 {
        match self {
            DeletionOutcome::Deleted { bytes_freed }
            | DeletionOutcome::Deferred { bytes_freed, .. } => *bytes_freed,
            _ => 0,
        }
    }
}

/// A failure on one path, inside or at the root of a candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub path: PathBuf,
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    pub outcome: DeletionOutcome,
    pub issues: Vec<Issue>,
    /// The candidate's own path is gone. False for a directory kept to hold
    /// entries that could not or must not be removed.
    pub root_removed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeletionPolicy {
    pub force: bool,
    pub dry_run: bool,
    /// Wait per termination attempt.
    pub terminate_timeout: Duration,
}

enum Removal {
    Removed,
    Vanished,
    Deferred,
    Failed(Issue),
}

/// Per-candidate state: the owning processes are closed at most once.
struct Attempt {
    category: Category,
    lock_sensitive: bool,
    holders_closed: bool,
}

pub struct DeletionExecutor<'a> {
    policy: DeletionPolicy,
    remover: &'a dyn Remover,
    terminator: &'a dyn ProcessTerminator,
    scheduler: &'a RebootScheduler,
    exclusions: Option<&'a ExclusionMatcher>,
    pending: Option<&'a HashSet<String>>,
}

impl<'a> DeletionExecutor<'a> {
    pub fn new(
        policy: DeletionPolicy,
        remover: &'a dyn Remover,
        terminator: &'a dyn ProcessTerminator,
        scheduler: &'a RebootScheduler,
    ) -> Self {
        Self {
            policy,
            remover,
            terminator,
            scheduler,
            exclusions: None,
            pending: None,
        }
    }

    /// Leave excluded entries found inside a directory candidate in place.
    pub fn with_exclusions(mut self, matcher: &'a ExclusionMatcher) -> Self {
        if !matcher.is_empty() {
            self.exclusions = Some(matcher);
        }
        self
    }

    /// Keys (see [`normalize_key`]) of paths still in the pending record.
    /// Deleting one of them also drops it from the record.
    pub fn with_pending(mut self, keys: &'a HashSet<String>) -> Self {
        if !keys.is_empty() {
            self.pending = Some(keys);
        }
        self
    }

    pub fn execute(&self, candidate: &Candidate) -> Execution {
        if self.policy.dry_run {
            return Execution {
                outcome: DeletionOutcome::SkippedDryRun {
                    would_free: candidate.size,
                },
                issues: Vec::new(),
                root_removed: false,
            };
        }

        let mut attempt = Attempt {
            category: candidate.category,
            lock_sensitive: candidate.lock_sensitive,
            holders_closed: false,
        };
        if candidate.is_dir() {
            return self.delete_tree(&candidate.path, &mut attempt);
        }

        let outcome = match self.remove_path(&candidate.path, false, &mut attempt) {
            Removal::Removed => DeletionOutcome::Deleted {
                bytes_freed: candidate.size,
            },
            // Someone else cleaned it up; already clean.
            Removal::Vanished => DeletionOutcome::Deleted { bytes_freed: 0 },
            Removal::Deferred => DeletionOutcome::Deferred {
                reason: DeferReason::Locked,
                bytes_freed: 0,
            },
            Removal::Failed(issue) => {
                return Execution {
                    outcome: DeletionOutcome::Failed { kind: issue.kind },
                    issues: vec![issue],
                    root_removed: false,
                }
            }
        };
        let root_removed = matches!(outcome, DeletionOutcome::Deleted { .. });
        Execution {
            outcome,
            issues: Vec::new(),
            root_removed,
        }
    }

    fn delete_tree(&self, root: &Path, attempt: &mut Attempt) -> Execution {
        let mut freed = 0u64;
        let mut removed_any = false;
        let mut deferred = false;
        let mut root_removed = false;
        let mut issues: Vec<Issue> = Vec::new();
        // Directories that must stay because something below them stayed.
        let mut blocked: HashSet<PathBuf> = HashSet::new();

        let walker = WalkDir::new(root)
            .follow_links(false)
            .contents_first(true)
            .sort_by_file_name();

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(err) => {
                    let path = err.path().unwrap_or(root).to_path_buf();
                    let io_err = io::Error::from(err);
                    let kind = ErrorKind::classify(&io_err);
                    if kind == ErrorKind::NotFound {
                        continue;
                    }
                    block_ancestors(&mut blocked, &path, root);
                    blocked.insert(path.clone());
                    issues.push(Issue {
                        path,
                        kind,
                        message: io_err.to_string(),
                    });
                    continue;
                }
            };

            let path = entry.path();
            let is_dir = entry.file_type().is_dir();
            if is_dir && blocked.contains(path) {
                continue;
            }
            if path != root && self.exclusions.is_some_and(|m| m.is_excluded(path)) {
                debug!(path = %path.display(), "excluded entry left in place");
                block_ancestors(&mut blocked, path, root);
                continue;
            }

            let size = if is_dir {
                0
            } else {
                entry.metadata().map(|m| m.len()).unwrap_or(0)
            };
            match self.remove_path(path, is_dir, attempt) {
                Removal::Removed => {
                    removed_any = true;
                    root_removed |= path == root;
                    freed += size;
                }
                Removal::Vanished => root_removed |= path == root,
                Removal::Deferred => {
                    deferred = true;
                    block_ancestors(&mut blocked, path, root);
                }
                Removal::Failed(issue) => {
                    block_ancestors(&mut blocked, path, root);
                    issues.push(issue);
                }
            }
        }

        let outcome = if deferred {
            DeletionOutcome::Deferred {
                reason: DeferReason::Locked,
                bytes_freed: freed,
            }
        } else if !issues.is_empty() && !removed_any {
            let kind = match issues.as_slice() {
                [only] => only.kind,
                _ => ErrorKind::PartialDirectoryFailure,
            };
            DeletionOutcome::Failed { kind }
        } else {
            DeletionOutcome::Deleted { bytes_freed: freed }
        };
        Execution {
            outcome,
            issues,
            root_removed,
        }
    }

    fn remove_once(&self, path: &Path, is_dir: bool) -> io::Result<()> {
        if is_dir {
            self.remover.remove_dir(path)
        } else {
            self.remover.remove_file(path)
        }
    }

    fn remove_path(&self, path: &Path, is_dir: bool, attempt: &mut Attempt) -> Removal {
        let removal = self.attempt_removal(path, is_dir, attempt);
        if matches!(removal, Removal::Removed | Removal::Vanished) {
            self.forget_if_pending(path);
        }
        removal
    }

    fn forget_if_pending(&self, path: &Path) {
        let Some(keys) = self.pending else {
            return;
        };
        if !keys.contains(&normalize_key(path)) {
            return;
        }
        if let Err(e) = self.scheduler.forget(path) {
            warn!(path = %path.display(), error = %e, "deleted but still listed as pending");
        }
    }

    fn attempt_removal(&self, path: &Path, is_dir: bool, attempt: &mut Attempt) -> Removal {
        let err = match self.remove_once(path, is_dir) {
            Ok(()) => return Removal::Removed,
            Err(e) => e,
        };
        match ErrorKind::classify(&err) {
            ErrorKind::NotFound => Removal::Vanished,
            ErrorKind::LockedResource => self.unlock_or_defer(path, is_dir, attempt),
            kind => Removal::Failed(Issue {
                path: path.to_path_buf(),
                kind,
                message: err.to_string(),
            }),
        }
    }

    fn unlock_or_defer(&self, path: &Path, is_dir: bool, attempt: &mut Attempt) -> Removal {
        if self.policy.force && attempt.lock_sensitive {
            if !attempt.holders_closed {
                self.close_holders(attempt.category);
                attempt.holders_closed = true;
            }
            match self.remove_once(path, is_dir) {
                Ok(()) => return Removal::Removed,
                Err(e) => match ErrorKind::classify(&e) {
                    ErrorKind::NotFound => return Removal::Vanished,
                    ErrorKind::LockedResource => {}
                    kind => {
                        return Removal::Failed(Issue {
                            path: path.to_path_buf(),
                            kind,
                            message: e.to_string(),
                        })
                    }
                },
            }
        }

        match self.scheduler.defer(path, Some(attempt.category)) {
            Ok(_) => {
                warn!(path = %path.display(), "locked, deferred");
                Removal::Deferred
            }
            Err(e) => Removal::Failed(Issue {
                path: path.to_path_buf(),
                kind: ErrorKind::Io,
                message: format!("could not defer locked entry: {e}"),
            }),
        }
    }

    /// Ask nicely first, then kill. Gives up after a bounded wait either way.
    fn close_holders(&self, category: Category) {
        let names = category.process_names();
        for attempt in 1..=TERMINATE_ATTEMPTS {
            let mode = if attempt == 1 {
                Termination::Graceful
            } else {
                Termination::Forceful
            };
            let remaining = self
                .terminator
                .terminate(names, mode, self.policy.terminate_timeout);
            if remaining == 0 {
                return;
            }
            debug!(%category, remaining, attempt, "lock holders still running");
            thread::sleep(TERMINATE_BACKOFF * attempt);
        }
    }
}

fn block_ancestors(blocked: &mut HashSet<PathBuf>, path: &Path, root: &Path) {
    for ancestor in path.ancestors().skip(1) {
        blocked.insert(ancestor.to_path_buf());
        if ancestor == root {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::EntryKind;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    fn busy() -> io::Error {
        #[cfg(unix)]
        return io::Error::from_raw_os_error(libc::EBUSY);
        #[cfg(not(unix))]
        return io::Error::from_raw_os_error(32);
    }

    /// Refuses to remove anything in its lock set.
    #[derive(Clone, Default)]
    struct LockingRemover {
        locked: Arc<Mutex<HashSet<PathBuf>>>,
    }

    impl LockingRemover {
        fn lock(&self, path: &Path) {
            self.locked.lock().unwrap().insert(path.to_path_buf());
        }
    }

    impl Remover for LockingRemover {
        fn remove_file(&self, path: &Path) -> io::Result<()> {
            if self.locked.lock().unwrap().contains(path) {
                return Err(busy());
            }
            fs::remove_file(path)
        }

        fn remove_dir(&self, path: &Path) -> io::Result<()> {
            if self.locked.lock().unwrap().contains(path) {
                return Err(busy());
            }
            fs::remove_dir(path)
        }
    }

    /// Releases every lock when asked to close processes.
    struct ReleasingTerminator {
        remover: LockingRemover,
        calls: AtomicUsize,
    }

    impl ProcessTerminator for ReleasingTerminator {
        fn terminate(&self, _names: &[&str], _mode: Termination, _timeout: Duration) -> usize {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.remover.locked.lock().unwrap().clear();
            0
        }
    }

    struct IdleTerminator;

    impl ProcessTerminator for IdleTerminator {
        fn terminate(&self, _names: &[&str], _mode: Termination, _timeout: Duration) -> usize {
            0
        }
    }

    fn policy(force: bool, dry_run: bool) -> DeletionPolicy {
        DeletionPolicy {
            force,
            dry_run,
            terminate_timeout: Duration::from_millis(10),
        }
    }

    fn file_candidate(path: &Path, category: Category) -> Candidate {
        Candidate {
            path: path.to_path_buf(),
            kind: EntryKind::File,
            size: fs::metadata(path).map(|m| m.len()).unwrap_or(0),
            modified: None,
            category,
            lock_sensitive: category.is_browser(),
        }
    }

    fn dir_candidate(path: &Path) -> Candidate {
        Candidate {
            path: path.to_path_buf(),
            kind: EntryKind::Directory,
            size: crate::utils::measure_dir(path, None).bytes,
            modified: None,
            category: Category::UserTemp,
            lock_sensitive: false,
        }
    }

    fn scheduler(temp: &TempDir) -> RebootScheduler {
        RebootScheduler::open(temp.path().join("pending.json")).unwrap()
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("a.tmp");
        fs::write(&file, vec![0u8; 42]).unwrap();
        let scheduler = scheduler(&temp);

        let executor = DeletionExecutor::new(policy(false, true), &FsRemover, &IdleTerminator, &scheduler);
        let execution = executor.execute(&file_candidate(&file, Category::UserTemp));

        assert_eq!(execution.outcome, DeletionOutcome::SkippedDryRun { would_free: 42 });
        assert!(file.exists());
    }

    #[test]
    fn test_plain_delete_frees_candidate_size() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("a.tmp");
        fs::write(&file, vec![0u8; 42]).unwrap();
        let scheduler = scheduler(&temp);

        let executor = DeletionExecutor::new(policy(false, false), &FsRemover, &IdleTerminator, &scheduler);
        let execution = executor.execute(&file_candidate(&file, Category::UserTemp));

        assert_eq!(execution.outcome, DeletionOutcome::Deleted { bytes_freed: 42 });
        assert!(!file.exists());
    }

    #[test]
    fn test_vanished_file_counts_as_clean() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("gone.tmp");
        let scheduler = scheduler(&temp);

        let executor = DeletionExecutor::new(policy(false, false), &FsRemover, &IdleTerminator, &scheduler);
        let execution = executor.execute(&file_candidate(&file, Category::UserTemp));

        assert_eq!(execution.outcome, DeletionOutcome::Deleted { bytes_freed: 0 });
        assert!(execution.issues.is_empty());
    }

    #[test]
    fn test_locked_without_force_is_deferred() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("History");
        fs::write(&file, b"h").unwrap();
        let scheduler = scheduler(&temp);
        let remover = LockingRemover::default();
        remover.lock(&file);
        let terminator = ReleasingTerminator {
            remover: remover.clone(),
            calls: AtomicUsize::new(0),
        };

        let executor = DeletionExecutor::new(policy(false, false), &remover, &terminator, &scheduler);
        let execution = executor.execute(&file_candidate(&file, Category::Chrome));

        assert_eq!(
            execution.outcome,
            DeletionOutcome::Deferred {
                reason: DeferReason::Locked,
                bytes_freed: 0
            }
        );
        assert_eq!(terminator.calls.load(Ordering::SeqCst), 0);
        assert!(scheduler.pending().unwrap().contains(&file));
    }

    #[test]
    fn test_force_closes_browser_and_retries() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("History");
        fs::write(&file, vec![0u8; 7]).unwrap();
        let scheduler = scheduler(&temp);
        let remover = LockingRemover::default();
        remover.lock(&file);
        let terminator = ReleasingTerminator {
            remover: remover.clone(),
            calls: AtomicUsize::new(0),
        };

        let executor = DeletionExecutor::new(policy(true, false), &remover, &terminator, &scheduler);
        let execution = executor.execute(&file_candidate(&file, Category::Chrome));

        assert_eq!(execution.outcome, DeletionOutcome::Deleted { bytes_freed: 7 });
        assert_eq!(terminator.calls.load(Ordering::SeqCst), 1);
        assert!(scheduler.pending().unwrap().is_empty());
    }

    #[test]
    fn test_deleting_a_pending_path_drops_it_from_the_record() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("History");
        fs::write(&file, vec![0u8; 3]).unwrap();
        let scheduler = scheduler(&temp);
        scheduler.defer(&file, Some(Category::Chrome)).unwrap();
        let keys: HashSet<String> = [normalize_key(&file)].into_iter().collect();

        let executor = DeletionExecutor::new(policy(false, false), &FsRemover, &IdleTerminator, &scheduler)
            .with_pending(&keys);
        let execution = executor.execute(&file_candidate(&file, Category::Chrome));

        assert_eq!(execution.outcome, DeletionOutcome::Deleted { bytes_freed: 3 });
        assert!(scheduler.pending().unwrap().is_empty());
    }

    #[test]
    fn test_force_does_not_kill_for_temp_files() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("busy.tmp");
        fs::write(&file, b"b").unwrap();
        let scheduler = scheduler(&temp);
        let remover = LockingRemover::default();
        remover.lock(&file);
        let terminator = ReleasingTerminator {
            remover: remover.clone(),
            calls: AtomicUsize::new(0),
        };

        let executor = DeletionExecutor::new(policy(true, false), &remover, &terminator, &scheduler);
        let execution = executor.execute(&file_candidate(&file, Category::UserTemp));

        assert!(matches!(execution.outcome, DeletionOutcome::Deferred { .. }));
        assert_eq!(terminator.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unresponsive_holder_ends_in_defer() {
        struct Stubborn;
        impl ProcessTerminator for Stubborn {
            fn terminate(&self, _: &[&str], _: Termination, _: Duration) -> usize {
                1
            }
        }

        let temp = TempDir::new().unwrap();
        let file = temp.path().join("places.sqlite");
        fs::write(&file, b"p").unwrap();
        let scheduler = scheduler(&temp);
        let remover = LockingRemover::default();
        remover.lock(&file);

        let executor = DeletionExecutor::new(policy(true, false), &remover, &Stubborn, &scheduler);
        let execution = executor.execute(&file_candidate(&file, Category::Firefox));

        assert!(matches!(execution.outcome, DeletionOutcome::Deferred { .. }));
        assert!(file.exists());
    }

    #[test]
    fn test_directory_with_locked_file_is_deferred_with_partial_bytes() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("work");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("a"), vec![0u8; 100]).unwrap();
        fs::write(dir.join("b"), vec![0u8; 200]).unwrap();
        fs::write(dir.join("c"), vec![0u8; 400]).unwrap();
        let scheduler = scheduler(&temp);
        let remover = LockingRemover::default();
        remover.lock(&dir.join("b"));

        let executor = DeletionExecutor::new(policy(false, false), &remover, &IdleTerminator, &scheduler);
        let execution = executor.execute(&dir_candidate(&dir));

        assert_eq!(
            execution.outcome,
            DeletionOutcome::Deferred {
                reason: DeferReason::Locked,
                bytes_freed: 500
            }
        );
        assert!(execution.issues.is_empty());
        assert!(dir.join("b").exists());
        assert!(!dir.join("a").exists());

        let record = scheduler.pending().unwrap();
        assert_eq!(record.len(), 1);
        assert!(record.contains(&dir.join("b")));
    }

    #[test]
    fn test_excluded_entries_inside_directory_survive() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("work");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("keep-secret.txt"), vec![0u8; 10]).unwrap();
        fs::write(dir.join("junk"), vec![0u8; 20]).unwrap();
        let scheduler = scheduler(&temp);
        let matcher = ExclusionMatcher::new(&["*secret*"]).unwrap();

        let executor = DeletionExecutor::new(policy(false, false), &FsRemover, &IdleTerminator, &scheduler)
            .with_exclusions(&matcher);
        let execution = executor.execute(&dir_candidate(&dir));

        assert_eq!(execution.outcome, DeletionOutcome::Deleted { bytes_freed: 20 });
        assert!(!execution.root_removed);
        assert!(dir.join("keep-secret.txt").exists());
    }

    #[test]
    fn test_fully_removed_directory_reports_its_root_gone() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("work");
        fs::create_dir_all(dir.join("nested")).unwrap();
        fs::write(dir.join("nested/junk"), vec![0u8; 20]).unwrap();
        let scheduler = scheduler(&temp);

        let executor = DeletionExecutor::new(policy(false, false), &FsRemover, &IdleTerminator, &scheduler);
        let execution = executor.execute(&dir_candidate(&dir));

        assert_eq!(execution.outcome, DeletionOutcome::Deleted { bytes_freed: 20 });
        assert!(execution.root_removed);
        assert!(!dir.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_read_only_file_mode_is_left_alone_on_unix() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("frozen");
        fs::create_dir(&dir).unwrap();
        let file = dir.join("ro.txt");
        fs::write(&file, b"x").unwrap();
        fs::set_permissions(&file, fs::Permissions::from_mode(0o444)).unwrap();
        fs::set_permissions(&dir, fs::Permissions::from_mode(0o555)).unwrap();

        if fs::write(dir.join("canary"), b"").is_ok() {
            // Root ignores permission bits, nothing to observe there.
            fs::set_permissions(&dir, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let err = FsRemover.remove_file(&file).unwrap_err();
        let mode = fs::metadata(&file).unwrap().permissions().mode() & 0o777;
        fs::set_permissions(&dir, fs::Permissions::from_mode(0o755)).unwrap();

        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
        assert_eq!(mode, 0o444);
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_subtree_with_nothing_removed_fails() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("work");
        let sealed = dir.join("sealed");
        fs::create_dir_all(&sealed).unwrap();
        fs::write(sealed.join("inner"), b"x").unwrap();
        fs::set_permissions(&sealed, fs::Permissions::from_mode(0o000)).unwrap();

        // Root ignores permission bits, nothing to observe there.
        if fs::read_dir(&sealed).is_ok() {
            fs::set_permissions(&sealed, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let scheduler = scheduler(&temp);
        let executor = DeletionExecutor::new(policy(false, false), &FsRemover, &IdleTerminator, &scheduler);
        let execution = executor.execute(&dir_candidate(&dir));
        fs::set_permissions(&sealed, fs::Permissions::from_mode(0o755)).unwrap();

        assert!(matches!(execution.outcome, DeletionOutcome::Failed { .. }));
        assert!(!execution.issues.is_empty());
        assert!(dir.exists());
    }
}
