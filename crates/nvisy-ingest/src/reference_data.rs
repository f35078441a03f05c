//! Reference data: the read-only value sets the validator consults.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;

/// An immutable snapshot of permitted field values, keyed by category (e.g.
/// `currencies`, `provinces`, `products`).
///
/// Loaded once at `PROCESSING` entry and shared read-only across every
/// fragment worker for the lifetime of a job. Changes to the underlying
/// source tables mid-job never affect an in-flight job, because workers only
/// ever see this cloned `Arc`.
#[derive(Debug, Clone, Default)]
pub struct ReferenceData {
    categories: Arc<HashMap<String, HashSet<String>>>,
}

impl ReferenceData {
    /// Builds a reference data snapshot from category name to member set.
    pub fn new(categories: HashMap<String, HashSet<String>>) -> Self {
        Self {
            categories: Arc::new(categories),
        }
    }

    /// Returns whether `category` is a known category with a non-empty
    /// member set.
    ///
    /// A category absent from the snapshot (or present but empty) is
    /// treated as "not enforced": the validator does not reject values
    /// against it, per §4.1 rule 3.
    pub fn is_enforced(&self, category: &str) -> bool {
        self.categories
            .get(category)
            .is_some_and(|set| !set.is_empty())
    }

    /// Returns whether `value` is a member of `category`.
    ///
    /// Returns `true` (i.e. "allowed") if the category is not enforced,
    /// since an empty or absent set means no restriction is in effect.
    pub fn contains(&self, category: &str, value: &str) -> bool {
        match self.categories.get(category) {
            Some(set) if !set.is_empty() => set.contains(value),
            _ => true,
        }
    }
}

/// Loads reference data from an in-memory source.
///
/// In this core, loading reference data is a pluggable external concern
/// (the actual backing store is out of scope); this trait is the seam a
/// hosting application implements.
pub trait ReferenceDataLoader: Send + Sync {
    /// Loads and freezes the reference data snapshot for a job.
    fn load(&self) -> impl Future<Output = Result<ReferenceData, String>> + Send;
}

#[cfg(test)]
pub mod testing {
    use std::collections::{HashMap, HashSet};

    use super::{ReferenceData, ReferenceDataLoader};

    /// A fixed-snapshot reference data loader, useful for tests.
    #[derive(Debug, Clone, Default)]
    pub struct StaticReferenceDataLoader {
        data: ReferenceData,
    }

    impl StaticReferenceDataLoader {
        /// Builds a loader from a list of `(category, members)` pairs.
        pub fn new(entries: impl IntoIterator<Item = (&'static str, Vec<&'static str>)>) -> Self {
            let categories: HashMap<String, HashSet<String>> = entries
                .into_iter()
                .map(|(category, members)| {
                    (
                        category.to_string(),
                        members.into_iter().map(str::to_string).collect(),
                    )
                })
                .collect();
            Self {
                data: ReferenceData::new(categories),
            }
        }
    }

    impl ReferenceDataLoader for StaticReferenceDataLoader {
        async fn load(&self) -> Result<ReferenceData, String> {
            Ok(self.data.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};

    use super::*;

    #[test]
    fn empty_category_is_not_enforced() {
        let data = ReferenceData::default();
        assert!(!data.is_enforced("currencies"));
        assert!(data.contains("currencies", "anything"));
    }

    #[test]
    fn known_category_rejects_unknown_members() {
        let mut categories = HashMap::new();
        categories.insert("currencies".to_string(), HashSet::from(["CAD".to_string(), "USD".to_string()]));
        let data = ReferenceData::new(categories);

        assert!(data.is_enforced("currencies"));
        assert!(data.contains("currencies", "CAD"));
        assert!(!data.contains("currencies", "EUR"));
    }
}
