mod browser;
mod enumerate;
mod prefetch;
pub mod recycle_bin;
mod temp;

pub use enumerate::Enumeration;

use crate::candidate::Category;
use crate::locations::Locations;
use std::path::PathBuf;

/// A place candidates come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Every child of this directory is a candidate; the directory stays.
    Contents(PathBuf),
    /// This entry itself is a candidate.
    Entry(PathBuf),
}

/// The trait every category module implements.
pub trait TargetProvider: Send + Sync {
    fn category(&self) -> Category;

    /// Resolve where this category's candidates live. Roots that do not
    /// exist are fine; they enumerate to nothing.
    fn targets(&self, locations: &Locations) -> Vec<Target>;

    /// File names never offered as candidates.
    fn protected_names(&self) -> &'static [&'static str] {
        &[]
    }

    /// Lazily walk the targets. Not restartable: call again for a fresh pass.
    fn enumerate(&self, locations: &Locations) -> Enumeration {
        let category = self.category();
        Enumeration::new(
            category,
            self.targets(locations),
            self.protected_names(),
            category.is_browser(),
        )
    }
}

pub fn all_providers() -> Vec<Box<dyn TargetProvider>> {
    vec![
        Box::new(temp::UserTemp),
        Box::new(temp::AllUsersTemp),
        Box::new(temp::SystemTemp),
        Box::new(temp::ServiceTemp),
        Box::new(prefetch::Prefetch),
        Box::new(recycle_bin::RecycleBin),
        Box::new(browser::Chromium::new(Category::Chrome)),
        Box::new(browser::Chromium::new(Category::Edge)),
        Box::new(browser::Chromium::new(Category::Brave)),
        Box::new(browser::Chromium::new(Category::Opera)),
        Box::new(browser::Chromium::new(Category::OperaGx)),
        Box::new(browser::Firefox),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_covers_every_category_once() {
        let providers = all_providers();
        assert_eq!(providers.len(), Category::ALL.len());
        for category in Category::ALL {
            assert_eq!(
                providers.iter().filter(|p| p.category() == category).count(),
                1,
                "{category}"
            );
        }
    }
}
