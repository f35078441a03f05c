//! Error taxonomy for the ingestion pipeline.

use thiserror::Error;

/// Result alias for ingestion operations.
pub type IngestResult<T, E = IngestError> = Result<T, E>;

/// Errors produced by the job runner, scheduler, and registry gateway.
///
/// Every variant here is a *terminal* concern: the runner's finalizer maps
/// each one to either `ERROR` or `CANCELLED` (see
/// [`IngestError::is_cancellation`]). There is no retry inside the core —
/// retry, if any, is an external re-enqueue.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The remote file source returned a transient error (non-2xx, reset,
    /// read failure) or the HTTP layer itself failed.
    #[error("source stream error: {0}")]
    Source(#[from] nvisy_source::SourceError),

    /// The durable registry could not be read or written.
    #[error("registry error: {0}")]
    Registry(#[from] nvisy_postgres::PgError),

    /// Reference data failed to load at job start.
    #[error("failed to load reference data: {0}")]
    ReferenceData(String),

    /// Aggregate error count crossed the fail-fast threshold.
    #[error("fail-fast threshold reached: {error_lines} errors >= {threshold}")]
    FailFast {
        /// Observed error count at the time of the abort.
        error_lines: u64,
        /// Configured threshold that was crossed.
        threshold: u64,
    },

    /// Memory usage crossed the configured threshold.
    #[error("memory threshold exceeded: using ~{used_mb} MiB of {limit_mb} MiB ({percent}%)")]
    MemoryPressure {
        /// Estimated resident memory in MiB at the time of the abort.
        used_mb: u64,
        /// Configured container memory limit in MiB.
        limit_mb: u64,
        /// Configured threshold percentage.
        percent: u8,
    },

    /// The job was cancelled, either via an explicit `cancel` call or a
    /// cancellation flag observed on the job row.
    #[error("job cancelled by user")]
    Cancelled,

    /// A configuration value was invalid.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The job row was not found, or was no longer in the expected status
    /// when a transition was attempted.
    #[error("job not found or not in expected state: {0}")]
    JobNotClaimable(uuid::Uuid),
}

impl IngestError {
    /// Returns the message the core should persist as `errorMessage` on the
    /// terminal job row.
    pub fn terminal_message(&self) -> String {
        if self.is_cancellation() {
            "Job cancelled by user".to_string()
        } else {
            self.to_string()
        }
    }

    /// Returns whether this failure should produce a `CANCELLED` terminal
    /// state rather than `ERROR`.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, IngestError::Cancelled)
    }
}
