//! Shared, lock-free progress counters read by the heartbeat and metrics
//! tickers while the runner's main task and the pool-draining task update
//! them concurrently.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Mutex;

use crate::fragment::FirstErrorSample;

/// Monotonically nondecreasing counters for one job's `PROCESSING` run.
///
/// Every counter here maps directly onto a column the runner periodically
/// persists via the job registry gateway. `first_error` is the one
/// exception: it lives only in memory and is logged, never persisted as
/// its own entity, matching the First Error Sample's "optional, discarded"
/// nature.
#[derive(Debug)]
pub struct JobProgress {
    processed_lines: AtomicU64,
    processed_bytes: AtomicU64,
    error_lines: AtomicU64,
    num_fragments: AtomicU64,
    fragments_done: AtomicU64,
    first_error: Mutex<Option<FirstErrorSample>>,
}

impl Default for JobProgress {
    fn default() -> Self {
        Self {
            processed_lines: AtomicU64::new(0),
            processed_bytes: AtomicU64::new(0),
            error_lines: AtomicU64::new(0),
            num_fragments: AtomicU64::new(0),
            fragments_done: AtomicU64::new(0),
            first_error: Mutex::new(None),
        }
    }
}

/// A point-in-time, consistent-enough read of [`JobProgress`] for writing
/// into the registry or a log line. Individual fields may be from
/// marginally different instants, which is acceptable for monitoring data.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProgressSnapshot {
    /// Non-empty lines scanned so far.
    pub processed_lines: u64,
    /// Bytes scanned so far.
    pub processed_bytes: u64,
    /// Lines that failed validation so far.
    pub error_lines: u64,
    /// Fragments emitted by the fragmenter so far.
    pub num_fragments: u64,
    /// Fragments whose result has been received.
    pub fragments_done: u64,
}

impl JobProgress {
    /// Adds one fragment's worth of results to the running totals.
    pub async fn record_fragment_result(&self, processed_lines: u64, processed_bytes: u64, error_lines: u64, first_error: Option<FirstErrorSample>) {
        self.processed_lines.fetch_add(processed_lines, Ordering::Relaxed);
        self.processed_bytes.fetch_add(processed_bytes, Ordering::Relaxed);
        self.error_lines.fetch_add(error_lines, Ordering::Relaxed);
        self.fragments_done.fetch_add(1, Ordering::Relaxed);

        if let Some(sample) = first_error {
            let mut guard = self.first_error.lock().await;
            if guard.is_none() {
                tracing::info!(
                    target: "nvisy_ingest::runner",
                    line_number = sample.line_number,
                    error_type = %sample.error_type,
                    "captured first error sample for job"
                );
                *guard = Some(sample);
            }
        }
    }

    /// Records that the fragmenter has emitted one more fragment.
    pub fn record_fragment_emitted(&self) {
        self.num_fragments.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the current aggregate error-line count.
    pub fn error_lines(&self) -> u64 {
        self.error_lines.load(Ordering::Relaxed)
    }

    /// Returns a consistent-enough snapshot of all counters.
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            processed_lines: self.processed_lines.load(Ordering::Relaxed),
            processed_bytes: self.processed_bytes.load(Ordering::Relaxed),
            error_lines: self.error_lines.load(Ordering::Relaxed),
            num_fragments: self.num_fragments.load(Ordering::Relaxed),
            fragments_done: self.fragments_done.load(Ordering::Relaxed),
        }
    }

    /// Returns the first-error sample captured so far, if any.
    pub async fn first_error(&self) -> Option<FirstErrorSample> {
        self.first_error.lock().await.clone()
    }
}

/// Shared handle to a job's progress counters, cloned across the runner's
/// main task, the pool-draining task, and the heartbeat/metrics tickers.
pub type SharedProgress = Arc<JobProgress>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn aggregates_are_commutative_under_any_completion_order() {
        let progress = JobProgress::default();
        progress.record_fragment_result(5, 50, 1, None).await;
        progress.record_fragment_result(3, 30, 0, None).await;

        let snapshot = progress.snapshot();
        assert_eq!(snapshot.processed_lines, 8);
        assert_eq!(snapshot.processed_bytes, 80);
        assert_eq!(snapshot.error_lines, 1);
        assert_eq!(snapshot.fragments_done, 2);
    }

    #[tokio::test]
    async fn only_the_first_error_sample_is_kept() {
        let progress = JobProgress::default();
        let first = FirstErrorSample::worker_crash(1);
        let second = FirstErrorSample::worker_crash(2);

        progress.record_fragment_result(0, 0, 1, Some(first)).await;
        progress.record_fragment_result(0, 0, 1, Some(second)).await;

        assert_eq!(progress.first_error().await.unwrap().line_number, 1);
    }
}
