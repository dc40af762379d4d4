use super::Target;
use crate::candidate::{Candidate, Category, EntryKind};
use crate::exclude::ExclusionMatcher;
use crate::utils::{self, DirId};
use std::collections::HashSet;
use std::fs::{self, Metadata};
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Lazy walk over one category's targets.
///
/// Children of a root are produced in file-name order so repeated runs over
/// an unchanged tree see the same sequence. A root reached twice (e.g. `%TEMP%`
/// and `%TMP%` naming the same directory) is walked once.
pub struct Enumeration {
    category: Category,
    targets: std::vec::IntoIter<Target>,
    current: Option<walkdir::IntoIter>,
    visited: HashSet<DirId>,
    protected: &'static [&'static str],
    lock_sensitive: bool,
    exclusions: Option<ExclusionMatcher>,
    diagnostics: Vec<String>,
}

impl Enumeration {
    pub fn new(
        category: Category,
        targets: Vec<Target>,
        protected: &'static [&'static str],
        lock_sensitive: bool,
    ) -> Self {
        Self {
            category,
            targets: targets.into_iter(),
            current: None,
            visited: HashSet::new(),
            protected,
            lock_sensitive,
            exclusions: None,
            diagnostics: Vec::new(),
        }
    }

    /// Excluded candidates are still produced, but excluded directories are
    /// not walked for sizing.
    pub fn with_exclusions(mut self, matcher: &ExclusionMatcher) -> Self {
        if !matcher.is_empty() {
            self.exclusions = Some(matcher.clone());
        }
        self
    }

    /// Non-fatal problems met so far (cycles, unreadable roots).
    pub fn take_diagnostics(&mut self) -> Vec<String> {
        std::mem::take(&mut self.diagnostics)
    }

    fn open_root(&mut self, dir: &Path) {
        // Roots are followed even when they are links; only their children are not.
        let meta = match fs::metadata(dir) {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return,
            Err(e) => {
                self.diagnostics
                    .push(format!("cannot read {}: {e}", dir.display()));
                return;
            }
        };
        if !meta.is_dir() {
            return;
        }
        if !self.visited.insert(DirId::of(dir, &meta)) {
            debug!(category = %self.category, root = %dir.display(), "root already walked");
            return;
        }
        self.current = Some(
            WalkDir::new(dir)
                .min_depth(1)
                .max_depth(1)
                .follow_links(false)
                .sort_by_file_name()
                .into_iter(),
        );
    }

    fn candidate(&mut self, path: PathBuf, meta: &Metadata) -> Option<Candidate> {
        let name = path.file_name()?.to_string_lossy().to_string();
        if self
            .protected
            .iter()
            .any(|p| p.eq_ignore_ascii_case(&name))
        {
            return None;
        }

        let modified = meta.modified().ok();
        if !meta.is_dir() {
            return Some(Candidate {
                path,
                kind: EntryKind::File,
                size: meta.len(),
                modified,
                category: self.category,
                lock_sensitive: self.lock_sensitive,
            });
        }

        if self
            .exclusions
            .as_ref()
            .is_some_and(|m| m.is_excluded(&path))
        {
            return Some(Candidate {
                path,
                kind: EntryKind::Directory,
                size: 0,
                modified,
                category: self.category,
                lock_sensitive: self.lock_sensitive,
            });
        }

        if !self.visited.insert(DirId::of(&path, meta)) {
            self.diagnostics.push(format!(
                "directory cycle at {}, not descending",
                path.display()
            ));
            return None;
        }

        let size = utils::measure_dir(&path, self.exclusions.as_ref());
        self.diagnostics.extend(size.diagnostics);
        Some(Candidate {
            path,
            kind: EntryKind::Directory,
            size: size.bytes,
            modified,
            category: self.category,
            // A partial sum means the executor must not trust the size.
            lock_sensitive: self.lock_sensitive || !size.complete,
        })
    }
}

impl Iterator for Enumeration {
    type Item = Candidate;

    fn next(&mut self) -> Option<Candidate> {
        loop {
            if let Some(walker) = self.current.as_mut() {
                match walker.next() {
                    Some(Ok(entry)) => {
                        let meta = match entry.metadata() {
                            Ok(m) => m,
                            Err(e) => {
                                self.diagnostics.push(format!(
                                    "cannot stat {}: {e}",
                                    entry.path().display()
                                ));
                                continue;
                            }
                        };
                        if let Some(candidate) = self.candidate(entry.into_path(), &meta) {
                            return Some(candidate);
                        }
                        continue;
                    }
                    Some(Err(e)) => {
                        self.diagnostics.push(format!("enumeration error: {e}"));
                        continue;
                    }
                    None => self.current = None,
                }
            }

            match self.targets.next()? {
                Target::Contents(dir) => self.open_root(&dir),
                Target::Entry(path) => match fs::symlink_metadata(&path) {
                    Ok(meta) => {
                        if let Some(candidate) = self.candidate(path, &meta) {
                            return Some(candidate);
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => self
                        .diagnostics
                        .push(format!("cannot stat {}: {e}", path.display())),
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn names(candidates: &[Candidate]) -> Vec<String> {
        candidates
            .iter()
            .map(|c| c.path.file_name().unwrap().to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn test_missing_root_yields_nothing() {
        let temp = TempDir::new().unwrap();
        let targets = vec![Target::Contents(temp.path().join("absent"))];
        let mut walk = Enumeration::new(Category::UserTemp, targets, &[], false);

        assert!(walk.next().is_none());
        assert!(walk.take_diagnostics().is_empty());
    }

    #[test]
    fn test_children_in_name_order_with_dir_sizes() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("b.tmp"), vec![0u8; 20]).unwrap();
        fs::write(temp.path().join("a.tmp"), vec![0u8; 10]).unwrap();
        fs::create_dir(temp.path().join("c")).unwrap();
        fs::write(temp.path().join("c/inner"), vec![0u8; 30]).unwrap();

        let targets = vec![Target::Contents(temp.path().to_path_buf())];
        let found: Vec<Candidate> =
            Enumeration::new(Category::UserTemp, targets, &[], false).collect();

        assert_eq!(names(&found), vec!["a.tmp", "b.tmp", "c"]);
        assert_eq!(found[2].kind, EntryKind::Directory);
        assert_eq!(found[2].size, 30);
        assert!(found.iter().all(|c| !c.lock_sensitive));
    }

    #[test]
    fn test_same_root_twice_is_walked_once() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("x"), b"x").unwrap();

        let root = temp.path().to_path_buf();
        let targets = vec![Target::Contents(root.clone()), Target::Contents(root)];
        let found: Vec<Candidate> =
            Enumeration::new(Category::UserTemp, targets, &[], false).collect();

        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_protected_names_and_entries() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("Layout.ini"), b"keep").unwrap();
        fs::write(temp.path().join("APP.pf"), b"go").unwrap();
        fs::write(temp.path().join("History"), b"h").unwrap();

        let targets = vec![
            Target::Contents(temp.path().to_path_buf()),
            Target::Entry(temp.path().join("missing")),
        ];
        let found: Vec<Candidate> =
            Enumeration::new(Category::Prefetch, targets, &["layout.ini"], false).collect();
        assert_eq!(names(&found), vec!["APP.pf", "History"]);
    }

    #[test]
    fn test_browser_candidates_are_lock_sensitive() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("History"), b"h").unwrap();

        let targets = vec![Target::Entry(temp.path().join("History"))];
        let found: Vec<Candidate> =
            Enumeration::new(Category::Chrome, targets, &[], true).collect();
        assert_eq!(found.len(), 1);
        assert!(found[0].lock_sensitive);
    }

    #[cfg(unix)]
    #[test]
    fn test_partially_sized_directory_is_lock_sensitive() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let sealed = temp.path().join("work/sealed");
        fs::create_dir_all(&sealed).unwrap();
        fs::write(temp.path().join("work/open.bin"), vec![0u8; 10]).unwrap();
        fs::write(sealed.join("hidden.bin"), vec![0u8; 10]).unwrap();
        fs::set_permissions(&sealed, fs::Permissions::from_mode(0o000)).unwrap();
        if fs::read_dir(&sealed).is_ok() {
            // Running as root; permissions are not enforced.
            fs::set_permissions(&sealed, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let targets = vec![Target::Contents(temp.path().to_path_buf())];
        let mut walk = Enumeration::new(Category::UserTemp, targets, &[], false);
        let found: Vec<Candidate> = walk.by_ref().collect();
        let diagnostics = walk.take_diagnostics();
        fs::set_permissions(&sealed, fs::Permissions::from_mode(0o755)).unwrap();

        assert_eq!(names(&found), vec!["work"]);
        assert_eq!(found[0].size, 10);
        assert!(found[0].lock_sensitive);
        assert!(!diagnostics.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_root_is_a_diagnostic() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let root = temp.path().join("root");
        fs::create_dir(&root).unwrap();
        fs::write(root.join("a.tmp"), b"a").unwrap();
        fs::set_permissions(&root, fs::Permissions::from_mode(0o000)).unwrap();
        if fs::read_dir(&root).is_ok() {
            fs::set_permissions(&root, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let targets = vec![Target::Contents(root.clone())];
        let mut walk = Enumeration::new(Category::UserTemp, targets, &[], false);
        let found: Vec<Candidate> = walk.by_ref().collect();
        let diagnostics = walk.take_diagnostics();
        fs::set_permissions(&root, fs::Permissions::from_mode(0o755)).unwrap();

        assert!(found.is_empty());
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].starts_with("enumeration error"));
    }

    #[test]
    fn test_excluded_descendants_are_not_sized() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("work")).unwrap();
        fs::write(temp.path().join("work/junk"), vec![0u8; 20]).unwrap();
        fs::write(temp.path().join("work/keep-secret.txt"), vec![0u8; 10]).unwrap();

        let matcher = ExclusionMatcher::new(&["*secret*"]).unwrap();
        let targets = vec![Target::Contents(temp.path().to_path_buf())];
        let found: Vec<Candidate> = Enumeration::new(Category::UserTemp, targets, &[], false)
            .with_exclusions(&matcher)
            .collect();
        assert_eq!(found[0].size, 20);
    }
}
