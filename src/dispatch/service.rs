//! # Dispatcher
//!
//! Constructed-once entry point that wires the dispatch queue, worker pool
//! and scheduling loop together and exposes the in-process API: submitting
//! orders, scaling workers one at a time and reading snapshots.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use kitchen_dispatch::config::DispatchConfig;
//! use kitchen_dispatch::dispatch::Dispatcher;
//!
//! # async fn example() -> kitchen_dispatch::Result<()> {
//! let dispatcher = Dispatcher::new(DispatchConfig::default())?;
//! dispatcher.start()?;
//!
//! dispatcher.submit_order(false, "Burger");
//! dispatcher.submit_order(true, "Steak");
//! dispatcher.set_worker_count(1)?;
//!
//! let pending = dispatcher.pending_snapshot();
//! assert_eq!(pending[0].content, "Steak");
//!
//! dispatcher.shutdown().await?;
//! # Ok(())
//! # }
//! ```

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::handoff;
use super::pool::{PoolManager, PoolStatus, ScaleOutcome};
use super::processor::{OrderProcessor, SimulatedCook};
use super::queue::{DispatchQueue, QueueSnapshot, QueueStats};
use super::scheduler::Scheduler;
use crate::config::DispatchConfig;
use crate::error::{DispatchError, Result};
use crate::models::{Order, OrderId};

/// Lifecycle of the scheduling loop task
#[derive(Debug)]
enum SchedulerSlot {
    Ready(Scheduler),
    Running(JoinHandle<()>),
    Finished,
}

/// Combined status of the dispatcher
#[derive(Debug, Clone, Serialize)]
pub struct DispatcherStatus {
    pub running: bool,
    pub orders: QueueStats,
    pub pool: PoolStatus,
    pub next_order_id: u64,
}

/// Order dispatcher owning the queue, the pool and the scheduling loop
#[derive(Debug)]
pub struct Dispatcher {
    config: DispatchConfig,
    queue: Arc<DispatchQueue>,
    pool: Arc<PoolManager>,
    runtime: Handle,
    scheduler: Mutex<SchedulerSlot>,
    shutdown: CancellationToken,
}

impl Dispatcher {
    /// Build a dispatcher with the simulated cook as processor
    ///
    /// Must be called from within a Tokio runtime; workers and the scheduling
    /// loop are spawned on that runtime.
    pub fn new(config: DispatchConfig) -> Result<Self> {
        let processor = Arc::new(SimulatedCook::new(config.worker.processing_duration()));
        Self::with_processor(config, processor)
    }

    /// Build a dispatcher with a custom order processor
    pub fn with_processor(
        config: DispatchConfig,
        processor: Arc<dyn OrderProcessor>,
    ) -> Result<Self> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|e| {
            DispatchError::InvalidState(format!("Dispatcher requires a Tokio runtime: {e}"))
        })?;

        let queue = Arc::new(DispatchQueue::new());
        let (port, desk) = handoff::channel(config.channels.handoff_buffer_size);
        let pool = Arc::new(PoolManager::new(
            Arc::clone(&queue),
            port,
            processor,
            runtime.clone(),
            config.pool.max_workers,
        ));
        let scheduler = Scheduler::new(
            Arc::clone(&queue),
            Arc::clone(&pool),
            desk,
            config.scheduler.tick_interval(),
        );

        info!(
            processing_duration_ms = config.worker.processing_duration_ms,
            tick_interval_ms = config.scheduler.tick_interval_ms,
            max_workers = config.pool.max_workers,
            "🏗️ DISPATCHER: Created"
        );

        Ok(Self {
            config,
            queue,
            pool,
            runtime,
            scheduler: Mutex::new(SchedulerSlot::Ready(scheduler)),
            shutdown: CancellationToken::new(),
        })
    }

    /// Spawn the scheduling loop and start `pool.initial_workers` workers
    pub fn start(&self) -> Result<()> {
        {
            let mut slot = self.scheduler.lock();
            match std::mem::replace(&mut *slot, SchedulerSlot::Finished) {
                SchedulerSlot::Ready(scheduler) => {
                    let handle = self.runtime.spawn(scheduler.run(self.shutdown.clone()));
                    *slot = SchedulerSlot::Running(handle);
                }
                running @ SchedulerSlot::Running(_) => {
                    *slot = running;
                    return Err(DispatchError::InvalidState(
                        "Dispatcher is already running".to_string(),
                    ));
                }
                SchedulerSlot::Finished => {
                    return Err(DispatchError::InvalidState(
                        "Dispatcher has been shut down".to_string(),
                    ));
                }
            }
        }

        for _ in 0..self.config.pool.initial_workers {
            self.pool.scale_up()?;
        }

        info!(
            initial_workers = self.config.pool.initial_workers,
            "🚀 DISPATCHER: Started"
        );
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        matches!(*self.scheduler.lock(), SchedulerSlot::Running(_)) && !self.shutdown.is_cancelled()
    }

    /// Stop the scheduling loop and every worker
    ///
    /// In-flight orders are released back to pending. Idempotent.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown.cancel();
        let timeout = self.config.worker.shutdown_timeout();

        let previous = std::mem::replace(&mut *self.scheduler.lock(), SchedulerSlot::Finished);
        if let SchedulerSlot::Running(mut handle) = previous {
            match tokio::time::timeout(timeout, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "Scheduling loop task failed"),
                Err(_) => {
                    handle.abort();
                    warn!(timeout_ms = timeout.as_millis() as u64, "Scheduling loop aborted");
                }
            }
        }

        self.pool.shutdown(timeout).await?;
        info!(stats = ?self.queue.stats(), "✅ DISPATCHER: Shut down");
        Ok(())
    }

    /// Allocate an id and queue a new order
    pub fn submit_order(&self, is_vip: bool, content: impl Into<String>) -> OrderId {
        self.queue.submit(is_vip, content).id
    }

    /// Add (`+1`) or remove (`-1`) one worker
    pub fn set_worker_count(&self, delta: i32) -> Result<ScaleOutcome> {
        match delta {
            1 => {
                if self.shutdown.is_cancelled() {
                    return Err(DispatchError::InvalidState(
                        "Cannot add workers after shutdown".to_string(),
                    ));
                }
                self.pool.scale_up()
            }
            -1 => Ok(self.pool.scale_down()),
            other => Err(DispatchError::InvalidParameter(format!(
                "Worker count delta must be +1 or -1, got {other}"
            ))),
        }
    }

    /// Pending orders in priority order
    pub fn pending_snapshot(&self) -> Vec<Order> {
        self.queue.snapshot_pending()
    }

    /// Completed orders in completion order
    pub fn completed_snapshot(&self) -> Vec<Order> {
        self.queue.snapshot_completed()
    }

    /// Pending and completed orders read under one lock
    pub fn snapshot(&self) -> QueueSnapshot {
        self.queue.snapshot()
    }

    pub fn worker_count(&self) -> usize {
        self.pool.worker_count()
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn status(&self) -> DispatcherStatus {
        DispatcherStatus {
            running: self.is_running(),
            orders: self.queue.stats(),
            pool: self.pool.status(),
            next_order_id: self.queue.next_order_id().value(),
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shutdown.cancel();
        self.pool.stop_all();
    }
}
