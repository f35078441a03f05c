//! Abstraction over the external collaborator that resolves a source item
//! identifier into a downloadable URL.
//!
//! The concrete system behind this trait (a document library, an object
//! store, a SharePoint-style drive) is deliberately not implemented here —
//! wiring a specific backend is the hosting application's job. Tests and
//! local tooling can implement this trait directly over a static map or a
//! fixture server.

use crate::error::SourceResult;

/// Resolves a source item identifier to a URL the streaming client can GET.
pub trait DownloadUrlProvider: Send + Sync {
    /// Returns a URL suitable for an immediate streaming GET of `item_id`'s
    /// content.
    ///
    /// Implementations are expected to handle their own short-lived link
    /// expiry; callers call this once per job run and open the stream
    /// immediately afterward.
    fn get_download_url(
        &self,
        item_id: &str,
    ) -> impl Future<Output = SourceResult<String>> + Send;
}

#[cfg(test)]
pub mod testing {
    use std::collections::HashMap;

    use super::DownloadUrlProvider;
    use crate::error::{SourceError, SourceResult};

    /// A fixed-map download URL provider, useful for tests.
    #[derive(Debug, Clone, Default)]
    pub struct StaticDownloadUrlProvider {
        urls: HashMap<String, String>,
    }

    impl StaticDownloadUrlProvider {
        /// Creates a provider from a list of `(item_id, url)` pairs.
        pub fn new(entries: impl IntoIterator<Item = (String, String)>) -> Self {
            Self {
                urls: entries.into_iter().collect(),
            }
        }
    }

    impl DownloadUrlProvider for StaticDownloadUrlProvider {
        async fn get_download_url(&self, item_id: &str) -> SourceResult<String> {
            self.urls
                .get(item_id)
                .cloned()
                .ok_or_else(|| SourceError::Config(format!("unknown item id: {item_id}")))
        }
    }
}
