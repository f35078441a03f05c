//! Job Scheduler: the process-wide singleton that caps concurrent runners,
//! promotes queued jobs, and recovers stale ones on startup.

use std::collections::HashMap;
use std::sync::Arc;

use nvisy_source::DownloadUrlProvider;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::config::{IngestConfig, ValidatorConfig};
use crate::error::IngestResult;
use crate::reference_data::ReferenceDataLoader;
use crate::registry::JobRegistry;
use crate::runner::{JobRunner, RunHandle};

/// Tracing target for scheduler operations.
pub const TRACING_TARGET: &str = "nvisy_ingest::scheduler";

struct ActiveJob {
    handle: RunHandle,
}

struct SchedulerState {
    active_jobs: HashMap<Uuid, ActiveJob>,
}

/// Process-wide singleton enforcing `MAX_CONCURRENT_JOBS` and orchestrating
/// job handoff to [`JobRunner`].
///
/// Constructed once at process startup with its collaborators injected
/// (registry, reference data loader, source client, download URL provider);
/// never implicitly global, per the design notes on the singleton scheduler.
pub struct JobScheduler<R, L, U>
where
    R: JobRegistry + Clone + 'static,
    L: ReferenceDataLoader + Clone + 'static,
    U: DownloadUrlProvider + 'static,
{
    registry: R,
    reference_loader: L,
    source: nvisy_source::SourceClient,
    url_provider: Arc<U>,
    config: IngestConfig,
    validator_config: ValidatorConfig,
    state: Arc<Mutex<SchedulerState>>,
}

impl<R, L, U> Clone for JobScheduler<R, L, U>
where
    R: JobRegistry + Clone + 'static,
    L: ReferenceDataLoader + Clone + 'static,
    U: DownloadUrlProvider + 'static,
{
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            reference_loader: self.reference_loader.clone(),
            source: self.source.clone(),
            url_provider: Arc::clone(&self.url_provider),
            config: self.config.clone(),
            validator_config: self.validator_config,
            state: Arc::clone(&self.state),
        }
    }
}

impl<R, L, U> JobScheduler<R, L, U>
where
    R: JobRegistry + Clone + 'static,
    L: ReferenceDataLoader + Clone + 'static,
    U: DownloadUrlProvider + 'static,
{
    /// Builds a scheduler from its collaborators. Call [`Self::recover_stale_jobs`]
    /// once at startup before accepting new work.
    pub fn new(
        registry: R,
        reference_loader: L,
        source: nvisy_source::SourceClient,
        url_provider: U,
        config: IngestConfig,
        validator_config: ValidatorConfig,
    ) -> Self {
        Self {
            registry,
            reference_loader,
            source,
            url_provider: Arc::new(url_provider),
            config,
            validator_config,
            state: Arc::new(Mutex::new(SchedulerState {
                active_jobs: HashMap::new(),
            })),
        }
    }

    /// Returns the number of runners currently active in this process.
    pub async fn active_count(&self) -> usize {
        self.state.lock().await.active_jobs.len()
    }

    /// Attempts to start a runner for `job_id` immediately.
    ///
    /// Returns `true` if a runner was spawned (the job moves toward
    /// `PROCESSING`); returns `false` without spawning if the process is
    /// already at `MAX_CONCURRENT_JOBS`, leaving the job QUEUED for a later
    /// [`Self::auto_dequeue`] call.
    pub async fn enqueue(&self, job_id: Uuid, download_url: String) -> bool {
        let mut state = self.state.lock().await;
        if state.active_jobs.len() >= self.config.max_concurrent_jobs as usize {
            return false;
        }

        let handle = RunHandle::default();
        state.active_jobs.insert(job_id, ActiveJob { handle: handle.clone() });
        drop(state);

        let scheduler = self.clone();
        tokio::spawn(async move {
            let runner = JobRunner::new(
                scheduler.registry.clone(),
                scheduler.reference_loader.clone(),
                scheduler.source.clone(),
                scheduler.config.clone(),
                scheduler.validator_config,
            );

            if let Err(err) = runner.run(job_id, &download_url, &handle).await {
                tracing::warn!(target: TRACING_TARGET, job_id = %job_id, error = %err, "job run completed with an error");
            }

            scheduler.state.lock().await.active_jobs.remove(&job_id);
            scheduler.auto_dequeue().await;
        });

        true
    }

    /// Requests cancellation of `job_id` if it is currently active in this
    /// process. Idempotent: calling this more than once, or after the job
    /// has already finished, is a no-op.
    ///
    /// If the job is not active here (not started yet, or running in
    /// another instance), the caller is responsible for setting
    /// `cancelRequested` in the registry so whichever instance owns the job
    /// observes it on its next heartbeat tick.
    pub async fn cancel(&self, job_id: Uuid) {
        if let Some(active) = self.state.lock().await.active_jobs.get(&job_id) {
            active.handle.cancel();
        }
    }

    /// Requests cancellation of every job currently active in this process.
    /// Used by the hosting process on graceful shutdown; does not wait for
    /// the runners to actually finish, since `finalize` always persists
    /// progress before returning.
    pub async fn shutdown(&self) {
        let state = self.state.lock().await;
        tracing::info!(target: TRACING_TARGET, active_jobs = state.active_jobs.len(), "requesting cancellation of all active jobs");
        for active in state.active_jobs.values() {
            active.handle.cancel();
        }
    }

    /// While capacity remains, promotes the oldest `QUEUED` job: resolves a
    /// fresh download URL and enqueues it. If URL resolution fails, the job
    /// is marked `ERROR` and the next oldest job is tried. A no-op when
    /// already at `MAX_CONCURRENT_JOBS`.
    pub async fn auto_dequeue(&self) {
        loop {
            let active_ids = {
                let state = self.state.lock().await;
                if state.active_jobs.len() >= self.config.max_concurrent_jobs as usize {
                    return;
                }
                state.active_jobs.keys().copied().collect::<std::collections::HashSet<_>>()
            };

            let queued = match self.registry.list_by_status(nvisy_postgres::JobStatus::Queued).await {
                Ok(jobs) => jobs,
                Err(err) => {
                    tracing::error!(target: TRACING_TARGET, error = %err, "failed to list queued jobs");
                    return;
                }
            };

            // A job just enqueued by a prior loop iteration is still QUEUED in
            // the registry until its spawned runner claims it, so skip ids
            // already owned by an active runner in this process to avoid
            // double-spawning and starving the next job.
            let Some(job) = queued.into_iter().find(|job| !active_ids.contains(&job.id)) else {
                return;
            };

            match self.url_provider.get_download_url(&job.source_item_id).await {
                Ok(url) => {
                    self.enqueue(job.id, url).await;
                }
                Err(err) => {
                    tracing::error!(target: TRACING_TARGET, job_id = %job.id, error = %err, "failed to resolve download url, marking job as errored");
                    let patch = nvisy_postgres::UpdateJob {
                        status: Some(nvisy_postgres::JobStatus::Error),
                        error_message: Some(Some(format!("failed to resolve download url: {err}"))),
                        finished_at: Some(jiff::Timestamp::now().into()),
                        updated_at: Some(jiff::Timestamp::now().into()),
                        ..Default::default()
                    };
                    if let Err(write_err) = self.registry.update(job.id, patch).await {
                        tracing::error!(target: TRACING_TARGET, job_id = %job.id, error = %write_err, "failed to mark job errored after url resolution failure");
                    }
                }
            }
        }
    }

    /// Startup crash recovery: transitions every `PROCESSING` job whose
    /// heartbeat is missing or older than `HEARTBEAT_TIMEOUT` to `ERROR`,
    /// then promotes queued work.
    pub async fn recover_stale_jobs(&self) -> IngestResult<()> {
        let stale_before = jiff::Timestamp::now() - self.config.heartbeat_timeout();
        let stale_jobs = self.registry.list_stale_processing(stale_before).await?;

        for job in stale_jobs {
            tracing::warn!(target: TRACING_TARGET, job_id = %job.id, "recovering stale job after instance restart");
            let patch = nvisy_postgres::UpdateJob {
                status: Some(nvisy_postgres::JobStatus::Error),
                error_message: Some(Some("Recovered after instance restart (stale heartbeat)".to_string())),
                finished_at: Some(jiff::Timestamp::now().into()),
                updated_at: Some(jiff::Timestamp::now().into()),
                ..Default::default()
            };
            if let Err(err) = self.registry.update(job.id, patch).await {
                tracing::error!(target: TRACING_TARGET, job_id = %job.id, error = %err, "failed to mark stale job as errored");
            }
        }

        self.auto_dequeue().await;
        Ok(())
    }
}
