//! Recycle bin discovery. Each platform keeps deleted items somewhere
//! different; all of that stays in here.

use super::{Target, TargetProvider};
use crate::candidate::Category;
use crate::locations::Locations;
use std::path::PathBuf;

pub struct RecycleBin;

impl TargetProvider for RecycleBin {
    fn category(&self) -> Category {
        Category::RecycleBin
    }

    fn targets(&self, locations: &Locations) -> Vec<Target> {
        locations
            .recycle_bins
            .iter()
            .cloned()
            .map(Target::Contents)
            .collect()
    }
}

/// Every per-user `$Recycle.Bin\<SID>` folder on every mounted drive.
#[cfg(windows)]
pub fn system_bins() -> Vec<PathBuf> {
    let mut bins = Vec::new();
    for letter in b'A'..=b'Z' {
        let root = PathBuf::from(format!("{}:\\$Recycle.Bin", letter as char));
        let Ok(read_dir) = std::fs::read_dir(&root) else {
            continue;
        };
        let mut sids: Vec<PathBuf> = read_dir
            .flatten()
            .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .map(|e| e.path())
            .collect();
        sids.sort();
        bins.extend(sids);
    }
    bins
}

#[cfg(target_os = "macos")]
pub fn system_bins() -> Vec<PathBuf> {
    dirs::home_dir()
        .map(|home| vec![home.join(".Trash")])
        .unwrap_or_default()
}

/// The freedesktop.org trash: payloads in `files`, metadata in `info`.
#[cfg(all(unix, not(target_os = "macos")))]
pub fn system_bins() -> Vec<PathBuf> {
    dirs::data_local_dir()
        .map(|data| {
            let trash = data.join("Trash");
            vec![trash.join("files"), trash.join("info")]
        })
        .unwrap_or_default()
}

#[cfg(not(any(unix, windows)))]
pub fn system_bins() -> Vec<PathBuf> {
    Vec::new()
}
