//! Configuration for the streaming HTTP source client.

use std::time::Duration;

#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};

use crate::error::{SourceError, SourceResult};

/// Default timeout for the initial response headers of a streaming request.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Configuration for [`crate::SourceClient`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
#[must_use = "source configurations must be used to create a client"]
pub struct SourceConfig {
    /// Timeout, in seconds, for establishing the connection and receiving
    /// response headers. Does not bound the total duration of a stream —
    /// long-running downloads are expected.
    #[cfg_attr(
        feature = "config",
        arg(
            long = "source-request-timeout-secs",
            env = "SOURCE_REQUEST_TIMEOUT_SECS",
            default_value_t = DEFAULT_TIMEOUT_SECS
        )
    )]
    pub request_timeout_secs: u64,

    /// User-Agent header sent with every request.
    #[cfg_attr(
        feature = "config",
        arg(
            long = "source-user-agent",
            env = "SOURCE_USER_AGENT",
            default_value = "nvisy-source/0.1"
        )
    )]
    pub user_agent: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: format!("nvisy-source/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl SourceConfig {
    /// Returns the configured timeout as a [`Duration`].
    #[inline]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Sets the request timeout, in seconds.
    pub fn with_request_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    /// Sets the User-Agent header.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SourceResult<()> {
        if self.request_timeout_secs == 0 {
            return Err(SourceError::Config(
                "request_timeout_secs cannot be zero".to_string(),
            ));
        }
        if self.user_agent.is_empty() {
            return Err(SourceError::Config("user_agent cannot be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_positive_timeout() {
        let config = SourceConfig::default();
        assert!(config.request_timeout_secs > 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_overrides_fields() {
        let config = SourceConfig::default()
            .with_request_timeout_secs(5)
            .with_user_agent("test-agent");
        assert_eq!(config.request_timeout_secs, 5);
        assert_eq!(config.user_agent, "test-agent");
    }

    #[test]
    fn zero_timeout_is_invalid() {
        let config = SourceConfig::default().with_request_timeout_secs(0);
        assert!(config.validate().is_err());
    }
}
