//! Error types for the streaming HTTP source.

/// Errors that can occur while resolving a download URL or streaming bytes
/// from the remote object store.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The configuration used to build the client was invalid.
    #[error("invalid source configuration: {0}")]
    Config(String),

    /// The HTTP request failed, either in flight or with a non-2xx status.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The request exceeded its configured timeout.
    #[error("request timed out")]
    Timeout,

    /// The stream was aborted by the caller before it completed naturally.
    #[error("stream aborted")]
    Aborted,

    /// The remote endpoint returned a non-success status code.
    #[error("unexpected status code {0}")]
    Status(reqwest::StatusCode),
}

/// Specialized [`Result`] type for source operations.
pub type SourceResult<T, E = SourceError> = Result<T, E>;
