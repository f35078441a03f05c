//! Job registry repository: the concrete backend for the job state machine.

use std::future::Future;

use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use uuid::Uuid;

use crate::model::job::{Job, JobStatus, NewJob, UpdateJob};
use crate::{PgConnection, PgError, PgResult, schema};

/// Repository for job lifecycle operations against the `jobs` table.
///
/// This is the gateway the job scheduler and job runner use to read and
/// mutate durable job state. Every write goes through a single row by `id`;
/// there is no cross-job transaction in this repository, matching the
/// "at-most-one worker per job" concurrency model.
pub trait JobRepository {
    /// Creates a new job row.
    fn create_job(&mut self, new_job: NewJob) -> impl Future<Output = PgResult<Job>> + Send;

    /// Finds a job by its unique identifier.
    fn find_job_by_id(
        &mut self,
        job_id: Uuid,
    ) -> impl Future<Output = PgResult<Option<Job>>> + Send;

    /// Lists every job currently in the given status, oldest first.
    fn list_jobs_by_status(
        &mut self,
        status: JobStatus,
    ) -> impl Future<Output = PgResult<Vec<Job>>> + Send;

    /// Applies an unconditional partial update to a job row.
    fn update_job(
        &mut self,
        job_id: Uuid,
        updates: UpdateJob,
    ) -> impl Future<Output = PgResult<Job>> + Send;

    /// Atomically transitions a job from `expected_status` to `updates.status`,
    /// applying the remaining fields in the same statement.
    ///
    /// Returns `Ok(None)` if no row matched `job_id` with `expected_status` —
    /// i.e. another worker instance already claimed or otherwise advanced the
    /// job. This is the only safe way to implement the claim step under
    /// multiple concurrent scheduler instances.
    fn conditional_update_job(
        &mut self,
        job_id: Uuid,
        expected_status: JobStatus,
        updates: UpdateJob,
    ) -> impl Future<Output = PgResult<Option<Job>>> + Send;

    /// Deletes a job row. Used only by maintenance/cleanup paths, never by
    /// the runner itself.
    fn delete_job(&mut self, job_id: Uuid) -> impl Future<Output = PgResult<()>> + Send;

    /// Lists jobs stuck in `processing` whose last heartbeat is older than
    /// `stale_before`, for crash recovery on scheduler startup.
    fn list_stale_processing_jobs(
        &mut self,
        stale_before: jiff_diesel::Timestamp,
    ) -> impl Future<Output = PgResult<Vec<Job>>> + Send;
}

impl JobRepository for PgConnection {
    async fn create_job(&mut self, new_job: NewJob) -> PgResult<Job> {
        use schema::jobs;

        let job = diesel::insert_into(jobs::table)
            .values(&new_job)
            .returning(Job::as_returning())
            .get_result(self)
            .await
            .map_err(PgError::from)?;

        Ok(job)
    }

    async fn find_job_by_id(&mut self, job_id: Uuid) -> PgResult<Option<Job>> {
        use schema::jobs::dsl;

        let job = dsl::jobs
            .filter(dsl::id.eq(job_id))
            .select(Job::as_select())
            .first(self)
            .await
            .optional()
            .map_err(PgError::from)?;

        Ok(job)
    }

    async fn list_jobs_by_status(&mut self, status: JobStatus) -> PgResult<Vec<Job>> {
        use schema::jobs::dsl;

        let jobs = dsl::jobs
            .filter(dsl::status.eq(status))
            .order(dsl::created_at.asc())
            .select(Job::as_select())
            .load(self)
            .await
            .map_err(PgError::from)?;

        Ok(jobs)
    }

    async fn update_job(&mut self, job_id: Uuid, updates: UpdateJob) -> PgResult<Job> {
        use schema::jobs::dsl;

        let job = diesel::update(dsl::jobs.filter(dsl::id.eq(job_id)))
            .set(&updates)
            .returning(Job::as_returning())
            .get_result(self)
            .await
            .map_err(PgError::from)?;

        Ok(job)
    }

    async fn conditional_update_job(
        &mut self,
        job_id: Uuid,
        expected_status: JobStatus,
        updates: UpdateJob,
    ) -> PgResult<Option<Job>> {
        use schema::jobs::dsl;

        let job = diesel::update(
            dsl::jobs
                .filter(dsl::id.eq(job_id))
                .filter(dsl::status.eq(expected_status)),
        )
        .set(&updates)
        .returning(Job::as_returning())
        .get_result(self)
        .await
        .optional()
        .map_err(PgError::from)?;

        Ok(job)
    }

    async fn delete_job(&mut self, job_id: Uuid) -> PgResult<()> {
        use schema::jobs::dsl;

        diesel::delete(dsl::jobs.filter(dsl::id.eq(job_id)))
            .execute(self)
            .await
            .map_err(PgError::from)?;

        Ok(())
    }

    async fn list_stale_processing_jobs(
        &mut self,
        stale_before: jiff_diesel::Timestamp,
    ) -> PgResult<Vec<Job>> {
        use schema::jobs::dsl;

        let jobs = dsl::jobs
            .filter(dsl::status.eq(JobStatus::Processing))
            .filter(
                dsl::last_heartbeat_at
                    .lt(&stale_before)
                    .or(dsl::last_heartbeat_at.is_null()),
            )
            .order(dsl::created_at.asc())
            .select(Job::as_select())
            .load(self)
            .await
            .map_err(PgError::from)?;

        Ok(jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_status_round_trips_through_display() {
        assert_eq!(JobStatus::Processing.to_string(), "Processing");
        assert!(JobStatus::Queued.is_queued());
        assert!(JobStatus::Done.is_finished());
        assert!(!JobStatus::New.is_active());
    }
}
