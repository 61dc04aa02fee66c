//! # Worker Pool Management
//!
//! Owns the active workers, scales them one at a time and reaps workers whose
//! consume loop ended without being asked to stop.
//!
//! Scale-down is LIFO: the most recently added worker is stopped first. A
//! stopped worker is parked in a retiring list until its task ends, so
//! shutdown can wait for every held order to be released.

use futures::future::join_all;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tracing::{error, info, instrument, warn};

use super::handoff::HandoffPort;
use super::processor::OrderProcessor;
use super::queue::DispatchQueue;
use super::worker::{Worker, WorkerId, WorkerStatus};
use crate::error::{DispatchError, Result};

/// Result of a single scaling request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ScaleOutcome {
    Added {
        worker_id: WorkerId,
        active_workers: usize,
    },
    Removed {
        worker_id: WorkerId,
        active_workers: usize,
    },
    /// Scale-down requested with no active workers; nothing happened
    PoolEmpty,
    /// Scale-up refused at the configured ceiling; nothing happened
    AtCapacity { max_workers: usize },
}

impl ScaleOutcome {
    /// Whether the pool size changed
    pub fn changed(&self) -> bool {
        matches!(self, Self::Added { .. } | Self::Removed { .. })
    }
}

/// Status information for the pool
#[derive(Debug, Clone, Serialize)]
pub struct PoolStatus {
    pub active_workers: usize,
    pub retiring_workers: usize,
    pub max_workers: usize,
    pub failed_workers_reaped: u64,
    pub uptime_seconds: u64,
    pub workers: Vec<WorkerStatus>,
}

/// Dynamically sized pool of workers sharing one handoff port
#[derive(Debug)]
pub struct PoolManager {
    queue: Arc<DispatchQueue>,
    port: HandoffPort,
    processor: Arc<dyn OrderProcessor>,
    runtime: Handle,
    max_workers: usize,
    /// Active workers in start order
    workers: Mutex<Vec<Worker>>,
    /// Stopped workers whose task may still be releasing an order
    retiring: Mutex<Vec<Worker>>,
    failed_workers_reaped: AtomicU64,
    created_at: Instant,
}

impl PoolManager {
    pub fn new(
        queue: Arc<DispatchQueue>,
        port: HandoffPort,
        processor: Arc<dyn OrderProcessor>,
        runtime: Handle,
        max_workers: usize,
    ) -> Self {
        info!(
            max_workers,
            processor = processor.name(),
            "🏊 POOL: Creating worker pool"
        );

        Self {
            queue,
            port,
            processor,
            runtime,
            max_workers,
            workers: Mutex::new(Vec::new()),
            retiring: Mutex::new(Vec::new()),
            failed_workers_reaped: AtomicU64::new(0),
            created_at: Instant::now(),
        }
    }

    /// Start one new worker and add it to the pool
    pub fn scale_up(&self) -> Result<ScaleOutcome> {
        let mut workers = self.workers.lock();
        if workers.len() >= self.max_workers {
            warn!(
                max_workers = self.max_workers,
                "POOL: Scale-up refused, pool at capacity"
            );
            return Ok(ScaleOutcome::AtCapacity {
                max_workers: self.max_workers,
            });
        }

        let worker = Worker::new(Arc::clone(&self.processor));
        worker.start(&self.runtime, Arc::clone(&self.queue), self.port.clone())?;
        let worker_id = worker.id();
        workers.push(worker);

        info!(
            worker_id = %worker_id,
            active_workers = workers.len(),
            "🔼 POOL: Added worker"
        );
        Ok(ScaleOutcome::Added {
            worker_id,
            active_workers: workers.len(),
        })
    }

    /// Stop the most recently added worker
    ///
    /// An empty pool is reported as [`ScaleOutcome::PoolEmpty`], not an error.
    pub fn scale_down(&self) -> ScaleOutcome {
        let (worker, active_workers) = {
            let mut workers = self.workers.lock();
            let worker = workers.pop();
            (worker, workers.len())
        };

        let Some(worker) = worker else {
            info!("POOL: Scale-down ignored, no active workers");
            return ScaleOutcome::PoolEmpty;
        };

        worker.stop();
        let worker_id = worker.id();
        self.retiring.lock().push(worker);

        info!(
            worker_id = %worker_id,
            active_workers,
            "🔽 POOL: Removed worker"
        );
        ScaleOutcome::Removed {
            worker_id,
            active_workers,
        }
    }

    /// Number of active workers
    pub fn worker_count(&self) -> usize {
        self.workers.lock().len()
    }

    /// Remove workers whose task ended on its own and drop finished retirees
    ///
    /// A worker terminating without a stop request counts as an implicit
    /// scale-down. Fatal errors from those workers are logged and returned.
    /// An order still attributed to a finished worker (its task panicked) is
    /// released back to pending.
    pub fn reap_terminated(&self) -> Vec<DispatchError> {
        let terminated: Vec<Worker> = {
            let mut workers = self.workers.lock();
            let (terminated, active): (Vec<Worker>, Vec<Worker>) =
                workers.drain(..).partition(Worker::is_finished);
            *workers = active;
            terminated
        };

        let mut failures = Vec::new();
        for worker in terminated {
            self.release_held(&worker);
            match worker.take_finished() {
                Some(Err(e)) => {
                    self.failed_workers_reaped.fetch_add(1, Ordering::AcqRel);
                    error!(
                        worker_id = %worker.id(),
                        error = %e,
                        active_workers = self.worker_count(),
                        "❌ POOL: Worker terminated with error, removed from pool"
                    );
                    failures.push(e);
                }
                _ => {
                    warn!(
                        worker_id = %worker.id(),
                        active_workers = self.worker_count(),
                        "⚠️ POOL: Worker exited without stop request, removed from pool"
                    );
                }
            }
        }

        let retired: Vec<Worker> = {
            let mut retiring = self.retiring.lock();
            let (retired, still_running): (Vec<Worker>, Vec<Worker>) =
                retiring.drain(..).partition(Worker::is_finished);
            *retiring = still_running;
            retired
        };

        for worker in retired {
            self.release_held(&worker);
            if let Some(Err(e)) = worker.take_finished() {
                error!(
                    worker_id = %worker.id(),
                    error = %e,
                    "❌ POOL: Retired worker ended with error"
                );
                failures.push(e);
            }
        }

        failures
    }

    /// Return the order of a worker whose task can no longer release it
    fn release_held(&self, worker: &Worker) {
        let Some(order_id) = worker.current_order() else {
            return;
        };
        if self.queue.release(order_id) {
            warn!(
                worker_id = %worker.id(),
                order_id = order_id.value(),
                "⚠️ POOL: Released order held by terminated worker"
            );
        }
    }

    /// Request every worker to stop without waiting
    pub fn stop_all(&self) {
        for worker in self.workers.lock().iter() {
            worker.stop();
        }
        for worker in self.retiring.lock().iter() {
            worker.stop();
        }
    }

    /// Stop every worker and wait for their held orders to be released
    #[instrument(skip(self))]
    pub async fn shutdown(&self, timeout: Duration) -> Result<()> {
        let workers: Vec<Worker> = {
            let mut all = std::mem::take(&mut *self.retiring.lock());
            all.extend(self.workers.lock().drain(..));
            all
        };

        info!(workers = workers.len(), "🛑 POOL: Stopping all workers");
        for worker in &workers {
            worker.stop();
        }

        let results = join_all(workers.iter().map(|worker| worker.join(timeout))).await;

        let mut first_error = None;
        for (worker, result) in workers.iter().zip(results) {
            let Err(e) = result else { continue };

            self.release_held(worker);
            warn!(
                worker_id = %worker.id(),
                error = %e,
                "⚠️ POOL: Worker did not shut down cleanly"
            );
            first_error.get_or_insert(e);
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                info!("✅ POOL: All workers stopped");
                Ok(())
            }
        }
    }

    pub fn status(&self) -> PoolStatus {
        let workers: Vec<WorkerStatus> = self.workers.lock().iter().map(Worker::status).collect();

        PoolStatus {
            active_workers: workers.len(),
            retiring_workers: self.retiring.lock().len(),
            max_workers: self.max_workers,
            failed_workers_reaped: self.failed_workers_reaped.load(Ordering::Acquire),
            uptime_seconds: self.created_at.elapsed().as_secs(),
            workers,
        }
    }
}

impl Drop for PoolManager {
    fn drop(&mut self) {
        self.stop_all();
    }
}
