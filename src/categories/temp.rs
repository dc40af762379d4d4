use super::{Target, TargetProvider};
use crate::candidate::Category;
use crate::locations::Locations;
use std::path::PathBuf;

/// Profile folders under `C:\Users` that are not real users.
const NON_USER_PROFILES: &[&str] = &["All Users", "Default", "Default User", "Public"];

const SERVICE_ACCOUNTS: &[&str] = &["LocalService", "NetworkService"];

/// Drop later roots that differ from an earlier one only by case or a
/// trailing separator.
fn unique_roots(roots: impl IntoIterator<Item = PathBuf>) -> Vec<Target> {
    let mut seen: Vec<String> = Vec::new();
    let mut targets = Vec::new();
    for root in roots {
        let key = root
            .to_string_lossy()
            .replace('\\', "/")
            .trim_end_matches('/')
            .to_lowercase();
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);
        targets.push(Target::Contents(root));
    }
    targets
}

pub struct UserTemp;

impl TargetProvider for UserTemp {
    fn category(&self) -> Category {
        Category::UserTemp
    }

    fn targets(&self, locations: &Locations) -> Vec<Target> {
        unique_roots(locations.user_temp.iter().cloned())
    }
}

pub struct AllUsersTemp;

impl TargetProvider for AllUsersTemp {
    fn category(&self) -> Category {
        Category::AllUsersTemp
    }

    fn targets(&self, locations: &Locations) -> Vec<Target> {
        let Some(users_root) = &locations.users_root else {
            return vec![];
        };
        let Ok(read_dir) = std::fs::read_dir(users_root) else {
            return vec![];
        };

        let mut profiles: Vec<PathBuf> = read_dir
            .flatten()
            .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .filter(|entry| {
                let name = entry.file_name();
                !NON_USER_PROFILES
                    .iter()
                    .any(|skip| name.to_string_lossy().eq_ignore_ascii_case(skip))
            })
            .map(|entry| entry.path())
            .collect();
        profiles.sort();

        unique_roots(
            profiles
                .into_iter()
                .map(|profile| profile.join("AppData").join("Local").join("Temp")),
        )
    }
}

pub struct SystemTemp;

impl TargetProvider for SystemTemp {
    fn category(&self) -> Category {
        Category::SystemTemp
    }

    fn targets(&self, locations: &Locations) -> Vec<Target> {
        unique_roots(locations.system_temp.iter().cloned())
    }
}

pub struct ServiceTemp;

impl TargetProvider for ServiceTemp {
    fn category(&self) -> Category {
        Category::ServiceTemp
    }

    fn targets(&self, locations: &Locations) -> Vec<Target> {
        let Some(windir) = &locations.windows_dir else {
            return vec![];
        };
        let profiles = windir.join("ServiceProfiles");
        unique_roots(SERVICE_ACCOUNTS.iter().map(|account| {
            profiles
                .join(account)
                .join("AppData")
                .join("Local")
                .join("Temp")
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_user_temp_dedupes_case_insensitively() {
        let locations = Locations {
            user_temp: vec![
                PathBuf::from("/tmp/Work"),
                PathBuf::from("/tmp/work/"),
                PathBuf::from("/var/tmp"),
            ],
            ..Default::default()
        };
        assert_eq!(
            UserTemp.targets(&locations),
            vec![
                Target::Contents(PathBuf::from("/tmp/Work")),
                Target::Contents(PathBuf::from("/var/tmp")),
            ]
        );
    }

    #[test]
    fn test_all_users_skips_well_known_profiles() {
        let temp = TempDir::new().unwrap();
        for name in ["alice", "bob", "Public", "Default"] {
            fs::create_dir(temp.path().join(name)).unwrap();
        }
        let locations = Locations {
            users_root: Some(temp.path().to_path_buf()),
            ..Default::default()
        };

        let targets = AllUsersTemp.targets(&locations);
        let expected: Vec<Target> = ["alice", "bob"]
            .iter()
            .map(|u| Target::Contents(temp.path().join(u).join("AppData/Local/Temp")))
            .collect();
        assert_eq!(targets, expected);
    }

    #[test]
    fn test_service_temp_needs_windows_dir() {
        assert!(ServiceTemp.targets(&Locations::default()).is_empty());

        let locations = Locations {
            windows_dir: Some(PathBuf::from("/win")),
            ..Default::default()
        };
        assert_eq!(ServiceTemp.targets(&locations).len(), 2);
    }
}
