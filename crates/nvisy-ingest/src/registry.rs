//! Job Registry Gateway: a typed facade over the durable store exposing
//! only the operations the scheduler and runner need.

use std::future::Future;

use nvisy_postgres::prelude::*;
use nvisy_postgres::{Job, JobStatus, PgClient, UpdateJob};
use uuid::Uuid;

use crate::error::IngestResult;

/// Tracing target for registry gateway operations.
pub const TRACING_TARGET: &str = "nvisy_ingest::registry";

/// The durable job store operations the core pipeline depends on.
///
/// The gateway hides the specific persistence technology: anything
/// implementing this trait can back the scheduler and runner, including an
/// in-memory fake for tests (see [`testing::InMemoryJobRegistry`]).
pub trait JobRegistry: Send + Sync {
    /// Fetches a single job row by id.
    fn get(&self, job_id: Uuid) -> impl Future<Output = IngestResult<Option<Job>>> + Send;

    /// Lists every job currently in `status`, oldest first.
    fn list_by_status(&self, status: JobStatus) -> impl Future<Output = IngestResult<Vec<Job>>> + Send;

    /// Applies an unconditional partial update to a job row.
    fn update(&self, job_id: Uuid, patch: UpdateJob) -> impl Future<Output = IngestResult<Job>> + Send;

    /// Atomically transitions a job from `expected_status`, applying the
    /// rest of `patch` in the same write. Returns `Ok(None)` if no row
    /// matched — another runner already claimed or otherwise advanced the
    /// job (Open Question C: the conditional-update variant of claim
    /// atomicity).
    fn conditional_update(&self, job_id: Uuid, expected_status: JobStatus, patch: UpdateJob) -> impl Future<Output = IngestResult<Option<Job>>> + Send;

    /// Lists jobs stuck in `PROCESSING` whose heartbeat predates
    /// `stale_before`, for startup crash recovery.
    fn list_stale_processing(&self, stale_before: jiff::Timestamp) -> impl Future<Output = IngestResult<Vec<Job>>> + Send;
}

/// [`JobRegistry`] implementation backed by the PostgreSQL `jobs` table.
#[derive(Clone)]
pub struct PgJobRegistry {
    client: PgClient,
}

impl PgJobRegistry {
    /// Wraps an already-constructed database client.
    pub fn new(client: PgClient) -> Self {
        Self { client }
    }
}

impl JobRegistry for PgJobRegistry {
    async fn get(&self, job_id: Uuid) -> IngestResult<Option<Job>> {
        let mut conn = self.client.get_connection().await?;
        Ok(conn.find_job_by_id(job_id).await?)
    }

    async fn list_by_status(&self, status: JobStatus) -> IngestResult<Vec<Job>> {
        let mut conn = self.client.get_connection().await?;
        Ok(conn.list_jobs_by_status(status).await?)
    }

    async fn update(&self, job_id: Uuid, patch: UpdateJob) -> IngestResult<Job> {
        let mut conn = self.client.get_connection().await?;
        Ok(conn.update_job(job_id, patch).await?)
    }

    async fn conditional_update(&self, job_id: Uuid, expected_status: JobStatus, patch: UpdateJob) -> IngestResult<Option<Job>> {
        let mut conn = self.client.get_connection().await?;
        Ok(conn.conditional_update_job(job_id, expected_status, patch).await?)
    }

    async fn list_stale_processing(&self, stale_before: jiff::Timestamp) -> IngestResult<Vec<Job>> {
        let mut conn = self.client.get_connection().await?;
        let stale_before: jiff_diesel::Timestamp = stale_before.into();
        Ok(conn.list_stale_processing_jobs(stale_before).await?)
    }
}

#[cfg(test)]
pub mod testing {
    use std::collections::HashMap;
    use std::sync::Arc;

    use tokio::sync::Mutex;
    use uuid::Uuid;

    use super::*;

    /// An in-memory [`JobRegistry`] fake, for exercising the scheduler and
    /// runner without a database.
    #[derive(Clone, Default)]
    pub struct InMemoryJobRegistry {
        jobs: Arc<Mutex<HashMap<Uuid, Job>>>,
    }

    impl InMemoryJobRegistry {
        /// Builds an empty registry.
        pub fn new() -> Self {
            Self::default()
        }

        /// Inserts or replaces a job row, for test setup.
        pub async fn seed(&self, job: Job) {
            self.jobs.lock().await.insert(job.id, job);
        }

        fn apply_patch(job: &mut Job, patch: UpdateJob) {
            if let Some(status) = patch.status {
                job.status = status;
            }
            if let Some(v) = patch.bytes_read {
                job.bytes_read = v;
            }
            if let Some(v) = patch.lines_total {
                job.lines_total = v;
            }
            if let Some(v) = patch.lines_valid {
                job.lines_valid = v;
            }
            if let Some(v) = patch.lines_invalid {
                job.lines_invalid = v;
            }
            if let Some(v) = patch.num_fragments {
                job.num_fragments = v;
            }
            if let Some(v) = patch.fragments_done {
                job.fragments_done = v;
            }
            if let Some(v) = patch.first_error_line {
                job.first_error_line = Some(v);
            }
            if let Some(v) = patch.first_error_field {
                job.first_error_field = Some(v);
            }
            if let Some(v) = patch.first_error_message {
                job.first_error_message = Some(v);
            }
            if let Some(v) = patch.queued_at {
                job.queued_at = Some(v);
            }
            if let Some(v) = patch.started_at {
                job.started_at = Some(v);
            }
            if let Some(v) = patch.finished_at {
                job.finished_at = Some(v);
            }
            if let Some(v) = patch.total_duration_ms {
                job.total_duration_ms = Some(v);
            }
            if let Some(v) = patch.last_heartbeat_at {
                job.last_heartbeat_at = Some(v);
            }
            if let Some(v) = patch.cancel_requested {
                job.cancel_requested = v;
            }
            if let Some(v) = patch.claimed_by {
                job.claimed_by = v;
            }
            if let Some(v) = patch.error_message {
                job.error_message = v;
            }
            if let Some(v) = patch.validation_passed {
                job.validation_passed = Some(v);
            }
            if let Some(v) = patch.lines_per_second {
                job.lines_per_second = Some(v);
            }
            if let Some(v) = patch.bytes_per_second {
                job.bytes_per_second = Some(v);
            }
            if let Some(v) = patch.updated_at {
                job.updated_at = v;
            }
        }
    }

    impl JobRegistry for InMemoryJobRegistry {
        async fn get(&self, job_id: Uuid) -> IngestResult<Option<Job>> {
            Ok(self.jobs.lock().await.get(&job_id).cloned())
        }

        async fn list_by_status(&self, status: JobStatus) -> IngestResult<Vec<Job>> {
            let jobs = self.jobs.lock().await;
            let mut matching: Vec<Job> = jobs.values().filter(|j| j.status == status).cloned().collect();
            matching.sort_by_key(|j| j.created_at);
            Ok(matching)
        }

        async fn update(&self, job_id: Uuid, patch: UpdateJob) -> IngestResult<Job> {
            let mut jobs = self.jobs.lock().await;
            let job = jobs.get_mut(&job_id).expect("job exists in test registry");
            Self::apply_patch(job, patch);
            Ok(job.clone())
        }

        async fn conditional_update(&self, job_id: Uuid, expected_status: JobStatus, patch: UpdateJob) -> IngestResult<Option<Job>> {
            let mut jobs = self.jobs.lock().await;
            let Some(job) = jobs.get_mut(&job_id) else {
                return Ok(None);
            };
            if job.status != expected_status {
                return Ok(None);
            }
            Self::apply_patch(job, patch);
            Ok(Some(job.clone()))
        }

        async fn list_stale_processing(&self, stale_before: jiff::Timestamp) -> IngestResult<Vec<Job>> {
            let jobs = self.jobs.lock().await;
            let stale_before: jiff_diesel::Timestamp = stale_before.into();
            let mut matching: Vec<Job> = jobs
                .values()
                .filter(|j| j.status == JobStatus::Processing)
                .filter(|j| j.last_heartbeat_at.is_none_or(|hb| hb < stale_before))
                .cloned()
                .collect();
            matching.sort_by_key(|j| j.created_at);
            Ok(matching)
        }
    }
}
