//! Runtime configuration for the scheduler and job runner.

use std::fmt;
use std::time::Duration;

#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};

use crate::error::{IngestError, IngestResult};

const MIN_WORKERS: u32 = 1;
const MAX_WORKERS: u32 = 64;

/// Tunable knobs of the ingestion pipeline.
///
/// Every field here corresponds to a configuration key the core exposes to
/// its hosting process; none of them have an implicit, hardcoded behavior
/// baked into the runner or scheduler.
#[derive(Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
#[must_use = "ingest configurations must be validated before use"]
pub struct IngestConfig {
    /// Scheduler cap on the number of runners active at once across the
    /// whole process.
    #[cfg_attr(
        feature = "config",
        arg(long = "max-concurrent-jobs", env = "MAX_CONCURRENT_JOBS", default_value_t = 1)
    )]
    pub max_concurrent_jobs: u32,

    /// Worker pool size per job.
    #[cfg_attr(
        feature = "config",
        arg(long = "num-workers", env = "NUM_WORKERS", default_value_t = 2)
    )]
    pub num_workers: u32,

    /// Byte threshold at which the stream fragmenter cuts a fragment.
    #[cfg_attr(
        feature = "config",
        arg(
            long = "fragment-max-bytes",
            env = "FRAGMENT_MAX_BYTES",
            default_value_t = 32 * 1024 * 1024
        )
    )]
    pub fragment_max_bytes: usize,

    /// Runner heartbeat cadence, in seconds.
    #[cfg_attr(
        feature = "config",
        arg(long = "heartbeat-interval-secs", env = "HEARTBEAT_INTERVAL_SECS", default_value_t = 15)
    )]
    pub heartbeat_interval_secs: u64,

    /// Age, in seconds, past which a `PROCESSING` job's heartbeat is
    /// considered stale during crash recovery.
    #[cfg_attr(
        feature = "config",
        arg(long = "heartbeat-timeout-secs", env = "HEARTBEAT_TIMEOUT_SECS", default_value_t = 60)
    )]
    pub heartbeat_timeout_secs: u64,

    /// Progress-log cadence, in seconds.
    #[cfg_attr(
        feature = "config",
        arg(long = "metrics-log-interval-secs", env = "METRICS_LOG_INTERVAL_SECS", default_value_t = 10)
    )]
    pub metrics_log_interval_secs: u64,

    /// Aggregate error-line count at which the runner aborts the job.
    #[cfg_attr(
        feature = "config",
        arg(long = "fail-fast-threshold", env = "FAIL_FAST_THRESHOLD", default_value_t = 50_000)
    )]
    pub fail_fast_threshold: u64,

    /// Percentage of `container_memory_mb` at which the runner aborts the
    /// job with a memory-pressure error.
    #[cfg_attr(
        feature = "config",
        arg(
            long = "memory-threshold-percent",
            env = "MEMORY_THRESHOLD_PERCENT",
            default_value_t = 75
        )
    )]
    pub memory_threshold_percent: u8,

    /// Declared memory limit of the hosting container, in MiB. Denominator
    /// for `memory_threshold_percent`.
    #[cfg_attr(
        feature = "config",
        arg(
            long = "container-memory-mb",
            env = "CONTAINER_MEMORY_MB",
            default_value_t = 2048
        )
    )]
    pub container_memory_mb: u64,

    /// Identity component folded into `claimedBy` so multiple instances of
    /// the hosting process can be told apart in the registry.
    #[cfg_attr(
        feature = "config",
        arg(long = "instance-index", env = "INSTANCE_INDEX", default_value = "0")
    )]
    pub instance_index: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 1,
            num_workers: 2,
            fragment_max_bytes: 32 * 1024 * 1024,
            heartbeat_interval_secs: 15,
            heartbeat_timeout_secs: 60,
            metrics_log_interval_secs: 10,
            fail_fast_threshold: 50_000,
            memory_threshold_percent: 75,
            container_memory_mb: 2048,
            instance_index: "0".to_string(),
        }
    }
}

impl IngestConfig {
    /// Returns the heartbeat ticker cadence.
    #[inline]
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    /// Returns the staleness threshold used by `recoverStaleJobs`.
    #[inline]
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs)
    }

    /// Returns the metrics ticker cadence.
    #[inline]
    pub fn metrics_log_interval(&self) -> Duration {
        Duration::from_secs(self.metrics_log_interval_secs)
    }

    /// Returns the memory ceiling, in bytes, beyond which the runner aborts
    /// the job.
    #[inline]
    pub fn memory_threshold_bytes(&self) -> u64 {
        self.container_memory_mb * 1024 * 1024 * u64::from(self.memory_threshold_percent) / 100
    }

    /// Returns the `claimedBy` identity this instance should write when it
    /// claims a job.
    pub fn claimed_by(&self) -> String {
        format!("nvisy-ingest-{}", self.instance_index)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> IngestResult<()> {
        if !(MIN_WORKERS..=MAX_WORKERS).contains(&self.num_workers) {
            return Err(IngestError::Config(format!(
                "num_workers must be between {MIN_WORKERS} and {MAX_WORKERS}"
            )));
        }
        if self.max_concurrent_jobs == 0 {
            return Err(IngestError::Config(
                "max_concurrent_jobs must be at least 1".to_string(),
            ));
        }
        if self.fragment_max_bytes == 0 {
            return Err(IngestError::Config(
                "fragment_max_bytes must be greater than zero".to_string(),
            ));
        }
        if !(1..=100).contains(&self.memory_threshold_percent) {
            return Err(IngestError::Config(
                "memory_threshold_percent must be between 1 and 100".to_string(),
            ));
        }
        if self.container_memory_mb == 0 {
            return Err(IngestError::Config(
                "container_memory_mb must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for IngestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestConfig")
            .field("max_concurrent_jobs", &self.max_concurrent_jobs)
            .field("num_workers", &self.num_workers)
            .field("fragment_max_bytes", &self.fragment_max_bytes)
            .field("heartbeat_interval_secs", &self.heartbeat_interval_secs)
            .field("heartbeat_timeout_secs", &self.heartbeat_timeout_secs)
            .field("metrics_log_interval_secs", &self.metrics_log_interval_secs)
            .field("fail_fast_threshold", &self.fail_fast_threshold)
            .field("memory_threshold_percent", &self.memory_threshold_percent)
            .field("container_memory_mb", &self.container_memory_mb)
            .field("instance_index", &self.instance_index)
            .finish()
    }
}

/// Configuration for the default [`crate::validator::validate`] rule set.
///
/// Both the minimum column count and the field offsets are source-specific
/// and deliberately have no hardcoded default here; callers (the hosting
/// binary, or a test) must supply them explicitly.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
pub struct ValidatorConfig {
    /// Minimum number of `;`-separated columns a non-empty line must have.
    #[cfg_attr(feature = "config", arg(long = "min-columns", env = "MIN_COLUMNS"))]
    pub min_columns: usize,

    /// Zero-based column index of the currency field.
    #[cfg_attr(feature = "config", arg(long = "currency-field", env = "CURRENCY_FIELD"))]
    pub currency_field: usize,

    /// Zero-based column index of the province field.
    #[cfg_attr(feature = "config", arg(long = "province-field", env = "PROVINCE_FIELD"))]
    pub province_field: usize,

    /// Zero-based column index of the product field.
    #[cfg_attr(feature = "config", arg(long = "product-field", env = "PRODUCT_FIELD"))]
    pub product_field: usize,
}

impl ValidatorConfig {
    /// Builds a validator configuration from explicit values.
    ///
    /// There is intentionally no `Default` impl: the minimum column count
    /// and field offsets vary by source file layout and must be supplied by
    /// the caller.
    pub fn new(min_columns: usize, currency_field: usize, province_field: usize, product_field: usize) -> Self {
        Self {
            min_columns,
            currency_field,
            province_field,
            product_field,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(IngestConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_workers_is_invalid() {
        let config = IngestConfig {
            num_workers: 0,
            ..IngestConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn memory_threshold_bytes_matches_percent_of_limit() {
        let config = IngestConfig {
            container_memory_mb: 2048,
            memory_threshold_percent: 75,
            ..IngestConfig::default()
        };
        assert_eq!(config.memory_threshold_bytes(), 2048 * 1024 * 1024 * 75 / 100);
    }

    #[test]
    fn claimed_by_folds_in_instance_index() {
        let config = IngestConfig {
            instance_index: "3".to_string(),
            ..IngestConfig::default()
        };
        assert_eq!(config.claimed_by(), "nvisy-ingest-3");
    }

    #[test]
    fn validator_config_has_no_implicit_default() {
        let cfg = ValidatorConfig::new(12, 3, 10, 11);
        assert_eq!(cfg.min_columns, 12);
        assert_eq!(cfg.currency_field, 3);
    }
}
