use super::{Target, TargetProvider};
use crate::candidate::Category;
use crate::locations::Locations;

/// Windows' application launch traces. `Layout.ini` drives boot file
/// placement and is left alone.
pub struct Prefetch;

impl TargetProvider for Prefetch {
    fn category(&self) -> Category {
        Category::Prefetch
    }

    fn targets(&self, locations: &Locations) -> Vec<Target> {
        match &locations.windows_dir {
            Some(windir) => vec![Target::Contents(windir.join("Prefetch"))],
            None => vec![],
        }
    }

    fn protected_names(&self) -> &'static [&'static str] {
        &["Layout.ini"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_layout_ini_is_never_a_candidate() {
        let temp = TempDir::new().unwrap();
        let prefetch = temp.path().join("Prefetch");
        fs::create_dir(&prefetch).unwrap();
        fs::write(prefetch.join("Layout.ini"), b"layout").unwrap();
        fs::write(prefetch.join("NOTEPAD.EXE-1234.pf"), b"trace").unwrap();

        let locations = Locations {
            windows_dir: Some(temp.path().to_path_buf()),
            ..Default::default()
        };
        let found: Vec<_> = Prefetch.enumerate(&locations).collect();

        assert_eq!(found.len(), 1);
        assert!(found[0].path.ends_with("NOTEPAD.EXE-1234.pf"));
    }
}
