//! File-backed [`ReferenceDataLoader`] for standalone deployments.
//!
//! Loading reference data is a pluggable, source-specific concern; this is
//! the CLI's default implementation, reading a flat JSON document of
//! category name to allowed-member list from disk once per job.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use nvisy_ingest::{ReferenceData, ReferenceDataLoader};

/// Tracing target for reference data loading.
pub const TRACING_TARGET: &str = "nvisy_cli::reference_data";

/// Loads reference data from a JSON file of `{"category": ["value", ...]}`,
/// re-read at the start of every job so an operator can update it between
/// runs without restarting the process. With no path configured, every
/// category is treated as unenforced.
#[derive(Debug, Clone)]
pub struct FileReferenceDataLoader {
    path: Option<PathBuf>,
}

impl FileReferenceDataLoader {
    /// Builds a loader reading from `path`, or a no-op loader if `path` is
    /// `None`.
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

impl ReferenceDataLoader for FileReferenceDataLoader {
    async fn load(&self) -> Result<ReferenceData, String> {
        let Some(path) = &self.path else {
            return Ok(ReferenceData::default());
        };

        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|err| format!("failed to read reference data file {}: {err}", path.display()))?;

        let raw: HashMap<String, Vec<String>> =
            serde_json::from_str(&contents).map_err(|err| format!("failed to parse reference data file {}: {err}", path.display()))?;

        let categories: HashMap<String, HashSet<String>> = raw.into_iter().map(|(category, members)| (category, members.into_iter().collect())).collect();

        tracing::debug!(
            target: TRACING_TARGET,
            path = %path.display(),
            categories = categories.len(),
            "loaded reference data"
        );

        Ok(ReferenceData::new(categories))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn no_path_yields_unenforced_reference_data() {
        let loader = FileReferenceDataLoader::new(None);
        let data = loader.load().await.unwrap();
        assert!(!data.is_enforced("currencies"));
    }

    #[tokio::test]
    async fn loads_categories_from_file() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("nvisy-cli-test-reference-{}.json", std::process::id()));
        tokio::fs::write(&path, r#"{"currencies": ["CAD", "USD"]}"#).await.unwrap();

        let loader = FileReferenceDataLoader::new(Some(path.clone()));
        let data = loader.load().await.unwrap();
        assert!(data.is_enforced("currencies"));
        assert!(data.contains("currencies", "CAD"));
        assert!(!data.contains("currencies", "EUR"));

        tokio::fs::remove_file(&path).await.unwrap();
    }
}
