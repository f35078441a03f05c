//! Worker Pool: a fixed-size pool of fragment workers with bounded
//! acquire/dispatch and an idle barrier.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::ValidatorConfig;
use crate::error::{IngestError, IngestResult};
use crate::fragment::{Fragment, FragmentResult};
use crate::reference_data::ReferenceData;
use crate::worker;

/// Tracing target for worker pool operations.
pub const TRACING_TARGET: &str = "nvisy_ingest::pool";

/// A handle to an acquired, currently-busy worker slot.
///
/// Must be consumed by exactly one [`WorkerPool::dispatch`] call; dropping
/// it without dispatching leaves that worker permanently unavailable (the
/// runner never does this).
#[derive(Debug)]
pub struct WorkerHandle {
    id: usize,
}

/// Fixed-size pool of fragment workers.
///
/// Each worker runs its CPU-bound validation via
/// [`tokio::task::spawn_blocking`], so fragment processing never occupies
/// an async runtime worker thread. The only backpressure mechanism in the
/// whole pipeline is [`WorkerPool::acquire`]: the fragmenter must acquire a
/// worker before it may emit a fragment, so there is no unbounded queue of
/// fragments waiting to be processed.
pub struct WorkerPool {
    dispatch_txs: Vec<mpsc::Sender<Fragment>>,
    idle_rx: tokio::sync::Mutex<mpsc::Receiver<usize>>,
    results_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<FragmentResult>>,
    pending: Arc<AtomicUsize>,
    worker_handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `num_workers` worker tasks, each ready to accept one fragment
    /// at a time, sharing the given reference data snapshot.
    pub fn spawn(num_workers: usize, validator_config: ValidatorConfig, ref_data: ReferenceData) -> Self {
        let (idle_tx, idle_rx) = mpsc::channel(num_workers);
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicUsize::new(0));

        let mut dispatch_txs = Vec::with_capacity(num_workers);
        let mut worker_handles = Vec::with_capacity(num_workers);

        for worker_id in 0..num_workers {
            let (dispatch_tx, mut dispatch_rx) = mpsc::channel::<Fragment>(1);
            dispatch_txs.push(dispatch_tx);

            let idle_tx = idle_tx.clone();
            let results_tx = results_tx.clone();
            let validator_config = validator_config;
            let ref_data = ref_data.clone();

            // Seed the idle set: every worker starts available.
            let seed_idle_tx = idle_tx.clone();
            tokio::spawn(async move {
                let _ = seed_idle_tx.send(worker_id).await;
            });

            let handle = tokio::spawn(async move {
                while let Some(fragment) = dispatch_rx.recv().await {
                    let validator_config = validator_config;
                    let ref_data = ref_data.clone();
                    let result = tokio::task::spawn_blocking(move || {
                        worker::process_fragment_isolated(&fragment, &validator_config, &ref_data, worker_id)
                    })
                    .await;

                    let result = match result {
                        Ok(result) => result,
                        Err(join_error) => {
                            tracing::error!(
                                target: TRACING_TARGET,
                                worker_id,
                                error = %join_error,
                                "worker blocking task failed to join"
                            );
                            continue;
                        }
                    };

                    if results_tx.send(result).is_err() {
                        break;
                    }
                    if idle_tx.send(worker_id).await.is_err() {
                        break;
                    }
                }
            });
            worker_handles.push(handle);
        }

        Self {
            dispatch_txs,
            idle_rx: tokio::sync::Mutex::new(idle_rx),
            results_rx: tokio::sync::Mutex::new(results_rx),
            pending,
            worker_handles,
        }
    }

    /// Blocks until a worker is idle. Wakeup order among waiters follows
    /// the underlying channel's FIFO delivery, so no waiter starves.
    pub async fn acquire(&self) -> IngestResult<WorkerHandle> {
        let mut idle_rx = self.idle_rx.lock().await;
        let id = idle_rx
            .recv()
            .await
            .ok_or_else(|| IngestError::Config("worker pool has been terminated".to_string()))?;
        Ok(WorkerHandle { id })
    }

    /// Moves `worker` to busy and hands off fragment ownership. The caller
    /// (the fragmenter) must not reference `fragment` after this call.
    pub async fn dispatch(&self, worker: WorkerHandle, fragment: Fragment) -> IngestResult<()> {
        self.pending.fetch_add(1, Ordering::SeqCst);
        self.dispatch_txs[worker.id]
            .send(fragment)
            .await
            .map_err(|_| IngestError::Config("worker channel closed".to_string()))
    }

    /// Receives the next available fragment result, if any is already
    /// queued or arrives within the call. Returns `None` once every worker
    /// has shut down and no more results will ever arrive.
    pub async fn recv_result(&self) -> Option<FragmentResult> {
        let result = self.results_rx.lock().await.recv().await;
        if result.is_some() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
        }
        result
    }

    /// Drains every fragment result already queued, without waiting for
    /// more to arrive. Used by the runner to keep progress counters fresh
    /// between fragment dispatches without blocking the fragmenter.
    pub async fn drain_available_results(&self) -> Vec<FragmentResult> {
        let mut rx = self.results_rx.lock().await;
        let mut drained = Vec::new();
        while let Ok(result) = rx.try_recv() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            drained.push(result);
        }
        drained
    }

    /// Blocks until every dispatched fragment has reported a result, i.e.
    /// every worker is idle. Drains and returns the accumulated results.
    pub async fn await_all_idle(&self) -> Vec<FragmentResult> {
        let mut collected = Vec::new();
        while self.pending.load(Ordering::SeqCst) > 0 {
            match self.recv_result().await {
                Some(result) => collected.push(result),
                None => break,
            }
        }
        collected
    }

    /// Releases all worker resources. Idempotent: calling this more than
    /// once, or after workers have already exited on their own, is safe.
    pub fn terminate(&mut self) {
        self.dispatch_txs.clear();
        for handle in self.worker_handles.drain(..) {
            handle.abort();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.terminate();
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::fragment::Fragment;

    fn fragment(sequence_number: u64, start_line_number: u64) -> Fragment {
        Fragment {
            sequence_number,
            bytes: Bytes::from_static(b"a;b;c\n"),
            start_line_number,
            line_count: 1,
        }
    }

    #[tokio::test]
    async fn acquires_dispatches_and_collects_results() {
        let pool = WorkerPool::spawn(2, ValidatorConfig::new(3, 0, 1, 2), ReferenceData::default());

        for i in 0..4u64 {
            let worker = pool.acquire().await.unwrap();
            pool.dispatch(worker, fragment(i + 1, i + 1)).await.unwrap();
        }

        let results = pool.await_all_idle().await;
        assert_eq!(results.len(), 4);
        assert!(results.iter().all(|r| r.error_count == 0));
    }

    #[tokio::test]
    async fn terminate_is_idempotent() {
        let mut pool = WorkerPool::spawn(1, ValidatorConfig::new(3, 0, 1, 2), ReferenceData::default());
        pool.terminate();
        pool.terminate();
    }
}
