//! Bounded worker pool for detail fetches
//!
//! Every worker owns exactly one session for its whole life. Work units are
//! pulled from a shared queue and results are funneled into a single channel
//! with one consumer, so nothing downstream of the pool runs concurrently.

use crate::crawler::fetcher::{Fetcher, RawPage, SessionFactory};
use crate::storage::WorkUnit;
use crate::{FetchError, SyncError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

/// Result of one work unit
#[derive(Debug)]
pub enum WorkOutcome<T> {
    /// The page was fetched and processed
    Done { unit: WorkUnit, output: T },
    /// The fetch failed; the unit is abandoned for this run
    Failed { unit: WorkUnit, error: FetchError },
}

/// Fixed-size pool configuration
#[derive(Debug, Clone)]
pub struct WorkerPool {
    workers: usize,
    request_delay: Duration,
}

/// A running pool: outcomes stream in until every worker has exited
pub struct PoolHandle<T> {
    results: mpsc::Receiver<WorkOutcome<T>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(workers: usize, request_delay: Duration) -> Self {
        Self {
            workers: workers.max(1),
            request_delay,
        }
    }

    /// Opens one session per worker and starts processing `units`
    ///
    /// `process` runs inside the worker on every fetched page. Opening a
    /// session is the only fallible step; if any session cannot be opened no
    /// worker is started.
    ///
    /// # Arguments
    ///
    /// * `factory` - Opens the per-worker sessions
    /// * `units` - Work units, dispatched in order
    /// * `process` - Turns a fetched page into the pool's output
    pub fn spawn<F, T, P>(
        &self,
        factory: &F,
        units: Vec<WorkUnit>,
        process: P,
    ) -> Result<PoolHandle<T>, SyncError>
    where
        F: SessionFactory,
        T: Send + 'static,
        P: Fn(&WorkUnit, RawPage) -> T + Send + Sync + 'static,
    {
        let worker_count = self.workers.min(units.len().max(1));
        let sessions = (0..worker_count)
            .map(|_| factory.open())
            .collect::<Result<Vec<_>, _>>()?;

        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        for unit in units {
            queue_tx
                .send(unit)
                .map_err(|_| SyncError::Pool("work queue closed before dispatch".to_string()))?;
        }
        drop(queue_tx);

        let queue = Arc::new(Mutex::new(queue_rx));
        let (results_tx, results_rx) = mpsc::channel(worker_count * 2);
        let process = Arc::new(process);

        tracing::info!("Starting {} workers", worker_count);

        let workers = sessions
            .into_iter()
            .enumerate()
            .map(|(id, session)| {
                tokio::spawn(worker_loop(
                    id,
                    session,
                    Arc::clone(&queue),
                    results_tx.clone(),
                    Arc::clone(&process),
                    self.request_delay,
                ))
            })
            .collect();

        Ok(PoolHandle {
            results: results_rx,
            workers,
        })
    }
}

impl<T> PoolHandle<T> {
    /// Next outcome, or `None` once every worker has finished
    pub async fn next(&mut self) -> Option<WorkOutcome<T>> {
        self.results.recv().await
    }

    /// Waits for every worker task, surfacing panics as pool errors
    pub async fn join(self) -> Result<(), SyncError> {
        drop(self.results);
        for worker in self.workers {
            worker
                .await
                .map_err(|e| SyncError::Pool(format!("worker task failed: {}", e)))?;
        }
        Ok(())
    }
}

async fn worker_loop<S, T, P>(
    id: usize,
    mut session: S,
    queue: Arc<Mutex<mpsc::UnboundedReceiver<WorkUnit>>>,
    results: mpsc::Sender<WorkOutcome<T>>,
    process: Arc<P>,
    request_delay: Duration,
) where
    S: Fetcher,
    P: Fn(&WorkUnit, RawPage) -> T,
{
    let mut handled = 0usize;

    loop {
        let next = queue.lock().await.recv().await;
        let Some(unit) = next else {
            break;
        };

        let outcome = match session.fetch(&unit.identifier).await {
            Ok(page) => {
                let output = process(&unit, page);
                WorkOutcome::Done { unit, output }
            }
            Err(error) => {
                tracing::warn!(
                    "worker {}: fetch failed for {}, skipping: {}",
                    id,
                    unit.identifier,
                    error
                );
                WorkOutcome::Failed { unit, error }
            }
        };
        handled += 1;

        if results.send(outcome).await.is_err() {
            tracing::warn!("worker {}: result channel closed, stopping", id);
            break;
        }

        // Pacing, not backpressure
        tokio::time::sleep(request_delay).await;
    }

    tracing::debug!("worker {} finished after {} units", id, handled);
}
