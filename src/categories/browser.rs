use super::{Target, TargetProvider};
use crate::candidate::Category;
use crate::locations::Locations;
use std::path::{Path, PathBuf};

/// Per-profile cache directories; their contents are emptied.
const CHROMIUM_CACHE_DIRS: &[&str] = &[
    "Cache",
    "Code Cache",
    "GPUCache",
    "Service Worker",
    "DawnCache",
    "ShaderCache",
    "GrShaderCache",
    "Media Cache",
];

/// Per-profile history stores; removed outright.
const CHROMIUM_HISTORY_FILES: &[&str] = &[
    "History",
    "History-journal",
    "History Provider Cache",
    "Network Action Predictor",
    "Top Sites",
    "Shortcuts",
    "Visited Links",
    "Favicons",
    "Web Data",
];

const FIREFOX_CACHE_DIRS: &[&str] = &["cache2", "startupCache"];

const FIREFOX_HISTORY_FILES: &[&str] = &[
    "places.sqlite",
    "places.sqlite-wal",
    "places.sqlite-shm",
    "formhistory.sqlite",
    "formhistory.sqlite-wal",
    "formhistory.sqlite-shm",
    "downloads.sqlite",
    "downloads.json",
    "sessionstore.jsonlz4",
];

/// Vendor directory below the platform's data, config and cache dirs.
fn chromium_vendor_dir(category: Category) -> Option<&'static str> {
    let dir = if cfg!(windows) {
        match category {
            Category::Chrome => "Google/Chrome/User Data",
            Category::Edge => "Microsoft/Edge/User Data",
            Category::Brave => "BraveSoftware/Brave-Browser/User Data",
            Category::Opera => "Opera Software/Opera Stable",
            Category::OperaGx => "Opera Software/Opera GX Stable",
            _ => return None,
        }
    } else if cfg!(target_os = "macos") {
        match category {
            Category::Chrome => "Google/Chrome",
            Category::Edge => "Microsoft Edge",
            Category::Brave => "BraveSoftware/Brave-Browser",
            Category::Opera => "com.operasoftware.Opera",
            Category::OperaGx => "com.operasoftware.OperaGX",
            _ => return None,
        }
    } else {
        match category {
            Category::Chrome => "google-chrome",
            Category::Edge => "microsoft-edge",
            Category::Brave => "BraveSoftware/Brave-Browser",
            Category::Opera => "opera",
            Category::OperaGx => "opera-gx",
            _ => return None,
        }
    };
    Some(dir)
}

fn existing_dirs(candidates: impl IntoIterator<Item = PathBuf>) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = Vec::new();
    for dir in candidates {
        if dir.is_dir() && !dirs.contains(&dir) {
            dirs.push(dir);
        }
    }
    dirs
}

fn sorted_subdirs(dir: &Path) -> Vec<PathBuf> {
    let Ok(read_dir) = std::fs::read_dir(dir) else {
        return vec![];
    };
    let mut subdirs: Vec<PathBuf> = read_dir
        .flatten()
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .map(|e| e.path())
        .collect();
    subdirs.sort();
    subdirs
}

fn profile_targets(
    profiles: &[PathBuf],
    cache_dirs: &[&str],
    history_files: &[&str],
) -> Vec<Target> {
    let mut targets = Vec::new();
    for profile in profiles {
        for name in cache_dirs {
            targets.push(Target::Contents(profile.join(name)));
        }
        for name in history_files {
            targets.push(Target::Entry(profile.join(name)));
        }
    }
    targets
}

/// Chrome and the browsers built on it share one profile layout.
pub struct Chromium {
    category: Category,
}

impl Chromium {
    pub fn new(category: Category) -> Self {
        Self { category }
    }

    /// The vendor root itself (Opera keeps its one profile there) followed by
    /// every profile folder inside it (`Default`, `Profile 1`, ...).
    fn profiles(&self, locations: &Locations) -> Vec<PathBuf> {
        let Some(vendor) = chromium_vendor_dir(self.category) else {
            return vec![];
        };
        let roots = existing_dirs(
            [
                &locations.local_data,
                &locations.roaming_data,
                &locations.cache,
            ]
            .into_iter()
            .flatten()
            .map(|base| base.join(vendor)),
        );

        let mut profiles = Vec::new();
        for root in roots {
            let subdirs = sorted_subdirs(&root);
            profiles.push(root);
            profiles.extend(subdirs);
        }
        profiles
    }
}

impl TargetProvider for Chromium {
    fn category(&self) -> Category {
        self.category
    }

    fn targets(&self, locations: &Locations) -> Vec<Target> {
        profile_targets(
            &self.profiles(locations),
            CHROMIUM_CACHE_DIRS,
            CHROMIUM_HISTORY_FILES,
        )
    }
}

pub struct Firefox;

impl Firefox {
    fn profile_roots(locations: &Locations) -> Vec<PathBuf> {
        let mut roots = Vec::new();
        if cfg!(windows) {
            roots.extend(locations.roaming_data.iter().map(|d| d.join("Mozilla/Firefox/Profiles")));
            roots.extend(locations.local_data.iter().map(|d| d.join("Mozilla/Firefox/Profiles")));
        } else if cfg!(target_os = "macos") {
            roots.extend(locations.local_data.iter().map(|d| d.join("Firefox/Profiles")));
            roots.extend(locations.cache.iter().map(|d| d.join("Firefox/Profiles")));
        } else {
            roots.extend(locations.home.iter().map(|d| d.join(".mozilla/firefox")));
            roots.extend(locations.cache.iter().map(|d| d.join("mozilla/firefox")));
        }
        existing_dirs(roots)
    }

    /// Only `*.default*` profiles, as Firefox names the ones it creates.
    fn profiles(locations: &Locations) -> Vec<PathBuf> {
        Self::profile_roots(locations)
            .iter()
            .flat_map(|root| sorted_subdirs(root))
            .filter(|p| {
                p.file_name()
                    .map(|n| n.to_string_lossy().contains(".default"))
                    .unwrap_or(false)
            })
            .collect()
    }
}

impl TargetProvider for Firefox {
    fn category(&self) -> Category {
        Category::Firefox
    }

    fn targets(&self, locations: &Locations) -> Vec<Target> {
        profile_targets(
            &Self::profiles(locations),
            FIREFOX_CACHE_DIRS,
            FIREFOX_HISTORY_FILES,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_chrome_profiles_yield_cache_contents_and_history() {
        let temp = TempDir::new().unwrap();
        let vendor = temp.path().join(chromium_vendor_dir(Category::Chrome).unwrap());
        let profile = vendor.join("Default");
        fs::create_dir_all(profile.join("Cache")).unwrap();
        fs::write(profile.join("Cache/data_0"), vec![0u8; 64]).unwrap();
        fs::write(profile.join("Cache/data_1"), vec![0u8; 64]).unwrap();
        fs::write(profile.join("History"), vec![0u8; 16]).unwrap();
        fs::write(profile.join("Bookmarks"), vec![0u8; 16]).unwrap();

        let locations = Locations {
            local_data: Some(temp.path().to_path_buf()),
            ..Default::default()
        };
        let provider = Chromium::new(Category::Chrome);
        let found: Vec<_> = provider.enumerate(&locations).collect();

        assert_eq!(found.len(), 3);
        assert!(found.iter().all(|c| c.lock_sensitive));
        assert!(found.iter().all(|c| !c.path.ends_with("Bookmarks")));
        assert_eq!(found.iter().map(|c| c.size).sum::<u64>(), 144);
    }

    #[test]
    fn test_no_browser_installed_yields_nothing() {
        let temp = TempDir::new().unwrap();
        let locations = Locations {
            local_data: Some(temp.path().to_path_buf()),
            roaming_data: Some(temp.path().to_path_buf()),
            cache: Some(temp.path().to_path_buf()),
            home: Some(temp.path().to_path_buf()),
            ..Default::default()
        };
        assert_eq!(Chromium::new(Category::Edge).enumerate(&locations).count(), 0);
        assert_eq!(Firefox.enumerate(&locations).count(), 0);
    }

    #[test]
    fn test_firefox_only_default_profiles() {
        let temp = TempDir::new().unwrap();
        let roots = Firefox::profile_roots(&Locations {
            local_data: Some(temp.path().to_path_buf()),
            roaming_data: Some(temp.path().to_path_buf()),
            home: Some(temp.path().to_path_buf()),
            ..Default::default()
        });
        assert!(roots.is_empty());

        let root = if cfg!(windows) {
            temp.path().join("Mozilla/Firefox/Profiles")
        } else if cfg!(target_os = "macos") {
            temp.path().join("Firefox/Profiles")
        } else {
            temp.path().join(".mozilla/firefox")
        };
        fs::create_dir_all(root.join("abcd.default-release")).unwrap();
        fs::create_dir_all(root.join("Crash Reports")).unwrap();
        fs::write(root.join("abcd.default-release/places.sqlite"), b"p").unwrap();

        let locations = Locations {
            local_data: Some(temp.path().to_path_buf()),
            roaming_data: Some(temp.path().to_path_buf()),
            home: Some(temp.path().to_path_buf()),
            ..Default::default()
        };
        let found: Vec<_> = Firefox.enumerate(&locations).collect();
        assert_eq!(found.len(), 1);
        assert!(found[0].path.ends_with("places.sqlite"));
    }
}
