//! Default [`DownloadUrlProvider`] for standalone deployments.
//!
//! Resolving a source item identifier to a signed download URL is an
//! external collaborator's job (a SharePoint/Graph-style integration); that
//! integration is out of scope here. This provider is the simplest
//! conforming implementation: it treats `sourceItemId` as already being a
//! directly fetchable URL, which is sufficient for any deployment where
//! jobs are enqueued with a pre-signed URL in hand.

use nvisy_source::{DownloadUrlProvider, SourceError, SourceResult};

/// Treats the job's `sourceItemId` as a ready-to-use download URL.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughDownloadUrlProvider;

impl DownloadUrlProvider for PassthroughDownloadUrlProvider {
    async fn get_download_url(&self, item_id: &str) -> SourceResult<String> {
        if item_id.starts_with("http://") || item_id.starts_with("https://") {
            Ok(item_id.to_string())
        } else {
            Err(SourceError::Config(format!(
                "source item id '{item_id}' is not a resolvable URL; wire a real DownloadUrlProvider for this deployment"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn passes_through_http_urls() {
        let provider = PassthroughDownloadUrlProvider;
        let url = provider.get_download_url("https://example.com/file.csv").await.unwrap();
        assert_eq!(url, "https://example.com/file.csv");
    }

    #[tokio::test]
    async fn rejects_non_url_identifiers() {
        let provider = PassthroughDownloadUrlProvider;
        assert!(provider.get_download_url("item-123").await.is_err());
    }
}
