use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::SystemTime;

/// A named source of candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    UserTemp,
    AllUsersTemp,
    SystemTemp,
    ServiceTemp,
    Prefetch,
    RecycleBin,
    Chrome,
    Edge,
    Brave,
    Opera,
    OperaGx,
    Firefox,
}

impl Category {
    pub const ALL: [Category; 12] = [
        Category::UserTemp,
        Category::AllUsersTemp,
        Category::SystemTemp,
        Category::ServiceTemp,
        Category::Prefetch,
        Category::RecycleBin,
        Category::Chrome,
        Category::Edge,
        Category::Brave,
        Category::Opera,
        Category::OperaGx,
        Category::Firefox,
    ];

    /// Machine-readable name used in reports and the --category flag.
    pub fn name(&self) -> &'static str {
        match self {
            Category::UserTemp => "user-temp",
            Category::AllUsersTemp => "all-users-temp",
            Category::SystemTemp => "system-temp",
            Category::ServiceTemp => "service-temp",
            Category::Prefetch => "prefetch",
            Category::RecycleBin => "recycle-bin",
            Category::Chrome => "chrome",
            Category::Edge => "edge",
            Category::Brave => "brave",
            Category::Opera => "opera",
            Category::OperaGx => "opera-gx",
            Category::Firefox => "firefox",
        }
    }

    /// Human-readable label for display.
    pub fn label(&self) -> &'static str {
        match self {
            Category::UserTemp => "Current User Temp",
            Category::AllUsersTemp => "All Users' Temp",
            Category::SystemTemp => "System Temp",
            Category::ServiceTemp => "Service Profiles Temp",
            Category::Prefetch => "Prefetch",
            Category::RecycleBin => "Recycle Bin",
            Category::Chrome => "Google Chrome",
            Category::Edge => "Microsoft Edge",
            Category::Brave => "Brave",
            Category::Opera => "Opera",
            Category::OperaGx => "Opera GX",
            Category::Firefox => "Firefox",
        }
    }

    /// Categories touching other users' or the system's data.
    pub fn requires_elevation(&self) -> bool {
        matches!(
            self,
            Category::AllUsersTemp
                | Category::SystemTemp
                | Category::ServiceTemp
                | Category::Prefetch
        )
    }

    pub fn is_browser(&self) -> bool {
        matches!(
            self,
            Category::Chrome
                | Category::Edge
                | Category::Brave
                | Category::Opera
                | Category::OperaGx
                | Category::Firefox
        )
    }

    /// Executables that may hold this category's stores open.
    pub fn process_names(&self) -> &'static [&'static str] {
        if cfg!(windows) {
            match self {
                Category::Chrome => &["chrome.exe"],
                Category::Edge => &["msedge.exe"],
                Category::Brave => &["brave.exe"],
                Category::Opera | Category::OperaGx => &["opera.exe"],
                Category::Firefox => &["firefox.exe"],
                _ => &[],
            }
        } else {
            match self {
                Category::Chrome => &["chrome", "google-chrome"],
                Category::Edge => &["msedge", "microsoft-edge"],
                Category::Brave => &["brave", "brave-browser"],
                Category::Opera | Category::OperaGx => &["opera"],
                Category::Firefox => &["firefox", "firefox-bin"],
                _ => &[],
            }
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                let names: Vec<&str> = Category::ALL.iter().map(|c| c.name()).collect();
                format!("unknown category '{s}' (expected one of: {})", names.join(", "))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntryKind {
    File,
    Directory,
}

/// One filesystem entry eligible for deletion evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub path: PathBuf,
    pub kind: EntryKind,
    /// Bytes on disk; recursive total for directories.
    pub size: u64,
    pub modified: Option<SystemTime>,
    pub category: Category,
    /// Set for browser stores, and for directories whose size is a partial sum.
    pub lock_sensitive: bool,
}

impl Candidate {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}
