use crate::exclude::ExclusionMatcher;
use std::collections::HashSet;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Identity of a directory, used to spot the same directory reached twice.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DirId {
    Inode { dev: u64, ino: u64 },
    Path(PathBuf),
}

impl DirId {
    #[cfg(unix)]
    pub fn of(_path: &Path, meta: &Metadata) -> Self {
        use std::os::unix::fs::MetadataExt;
        DirId::Inode {
            dev: meta.dev(),
            ino: meta.ino(),
        }
    }

    #[cfg(not(unix))]
    pub fn of(path: &Path, _meta: &Metadata) -> Self {
        DirId::Path(std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf()))
    }
}

/// Result of summing a directory tree.
#[derive(Debug, Default)]
pub struct DirSize {
    pub bytes: u64,
    /// False if any part of the tree could not be read.
    pub complete: bool,
    pub diagnostics: Vec<String>,
}

/// Compute total size of a directory recursively without following links.
/// A directory seen twice (bind mounts, junctions) is not descended again.
/// Excluded entries are left out, since deletion leaves them in place.
pub fn measure_dir(path: &Path, exclusions: Option<&ExclusionMatcher>) -> DirSize {
    let mut size = DirSize {
        complete: true,
        ..Default::default()
    };
    let mut visited: HashSet<DirId> = HashSet::new();
    let mut walker = WalkDir::new(path).follow_links(false).into_iter();

    while let Some(entry) = walker.next() {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                size.complete = false;
                size.diagnostics.push(format!("incomplete size: {e}"));
                continue;
            }
        };
        let is_dir = entry.file_type().is_dir();
        if entry.depth() > 0 && exclusions.is_some_and(|m| m.is_excluded(entry.path())) {
            if is_dir {
                walker.skip_current_dir();
            }
            continue;
        }
        let meta = match entry.metadata() {
            Ok(m) => m,
            Err(e) => {
                size.complete = false;
                size.diagnostics.push(format!("incomplete size: {e}"));
                continue;
            }
        };
        if is_dir {
            if !visited.insert(DirId::of(entry.path(), &meta)) {
                size.diagnostics.push(format!(
                    "directory cycle at {}, not descending",
                    entry.path().display()
                ));
                walker.skip_current_dir();
            }
        } else {
            size.bytes += meta.len();
        }
    }

    size
}

/// Format byte count as human-readable string.
pub fn format_size(bytes: u64) -> String {
    if bytes >= 1_099_511_627_776 {
        format!("{:.2} TB", bytes as f64 / 1_099_511_627_776.0)
    } else if bytes >= 1_073_741_824 {
        format!("{:.2} GB", bytes as f64 / 1_073_741_824.0)
    } else if bytes >= 1_048_576 {
        format!("{:.2} MB", bytes as f64 / 1_048_576.0)
    } else if bytes >= 1_024 {
        format!("{:.2} KB", bytes as f64 / 1_024.0)
    } else {
        format!("{} B", bytes)
    }
}

/// Shorten a path for display by replacing home dir with ~.
pub fn display_path(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(relative) = path.strip_prefix(&home) {
            return format!("~/{}", relative.display());
        }
    }
    path.display().to_string()
}
