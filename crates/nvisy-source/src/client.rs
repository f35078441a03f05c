//! Streaming HTTP GET client for remote fragment files.

use std::sync::Arc;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use reqwest::Client;

use crate::config::SourceConfig;
use crate::error::{SourceError, SourceResult};

/// Tracing target for source client operations.
pub const TRACING_TARGET: &str = "nvisy_source::client";

struct SourceClientInner {
    http: Client,
    config: SourceConfig,
}

/// A streaming response: the declared content length (if the server sent
/// one) paired with the byte stream itself.
pub struct OpenStream {
    /// Total byte size reported by the server, if present.
    pub total_bytes: Option<u64>,
    /// Stream of body chunks. Each item is a chunk of raw bytes in the
    /// order they arrived on the wire; the caller is responsible for
    /// finding newline boundaries.
    pub bytes: std::pin::Pin<Box<dyn Stream<Item = SourceResult<Bytes>> + Send>>,
}

/// HTTP client that opens a streaming GET against a pre-resolved download
/// URL and yields the response body as a sequence of byte chunks.
///
/// This client never buffers the whole body in memory: [`SourceClient::open_stream`]
/// returns as soon as the response headers arrive, and bytes are pulled
/// lazily as the caller polls the returned stream.
#[derive(Clone)]
pub struct SourceClient {
    inner: Arc<SourceClientInner>,
}

impl std::fmt::Debug for SourceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceClient")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl SourceClient {
    /// Builds a new client from the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the underlying
    /// `reqwest` client cannot be built.
    pub fn new(config: SourceConfig) -> SourceResult<Self> {
        config.validate()?;

        tracing::debug!(
            target: TRACING_TARGET,
            timeout_secs = config.request_timeout_secs,
            "creating source client"
        );

        let http = Client::builder()
            .connect_timeout(config.request_timeout())
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self {
            inner: Arc::new(SourceClientInner { http, config }),
        })
    }

    /// Returns the client configuration.
    pub fn config(&self) -> &SourceConfig {
        &self.inner.config
    }

    /// Opens a streaming GET request against `url`.
    ///
    /// The request has no overall idle timeout: once headers arrive, the
    /// body is streamed for as long as the caller keeps polling it. Only
    /// the initial connect/headers phase is bounded by
    /// [`SourceConfig::request_timeout`].
    #[tracing::instrument(skip(self), target = TRACING_TARGET, fields(url = %url))]
    pub async fn open_stream(&self, url: &str) -> SourceResult<OpenStream> {
        tracing::debug!(target: TRACING_TARGET, "opening streaming download");

        let response = self.inner.http.get(url).send().await.map_err(|err| {
            if err.is_timeout() {
                SourceError::Timeout
            } else {
                SourceError::Http(err)
            }
        })?;

        if !response.status().is_success() {
            tracing::warn!(
                target: TRACING_TARGET,
                status = response.status().as_u16(),
                "source returned a non-success status"
            );
            return Err(SourceError::Status(response.status()));
        }

        let total_bytes = response.content_length();

        tracing::info!(
            target: TRACING_TARGET,
            total_bytes = ?total_bytes,
            "streaming download opened"
        );

        let bytes = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(SourceError::Http));

        Ok(OpenStream {
            total_bytes,
            bytes: Box::pin(bytes),
        })
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[test]
    fn client_construction_validates_config() {
        let config = SourceConfig::default().with_request_timeout_secs(0);
        let result = SourceClient::new(config);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn client_builds_with_default_config() {
        let client = SourceClient::new(SourceConfig::default());
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn open_stream_yields_the_response_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/file.csv"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"a;b;c\nx;y;z\n".to_vec()))
            .mount(&server)
            .await;

        let client = SourceClient::new(SourceConfig::default()).unwrap();
        let opened = client.open_stream(&format!("{}/file.csv", server.uri())).await.unwrap();

        let body: Vec<u8> = opened.bytes.fold(Vec::new(), |mut acc, chunk| async move {
            acc.extend_from_slice(&chunk.unwrap());
            acc
        }).await;

        assert_eq!(body, b"a;b;c\nx;y;z\n");
    }

    #[tokio::test]
    async fn open_stream_surfaces_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing.csv"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = SourceClient::new(SourceConfig::default()).unwrap();
        let result = client.open_stream(&format!("{}/missing.csv", server.uri())).await;

        assert!(matches!(result, Err(SourceError::Status(_))));
    }
}
