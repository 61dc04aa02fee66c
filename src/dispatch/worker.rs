//! # Worker
//!
//! A cooking bot: one Tokio task that repeatedly registers with the handoff,
//! receives at most one order, processes it and reports completion to the
//! dispatch queue.
//!
//! ## Lifecycle
//!
//! `Idle` → `Running` on [`Worker::start`], → `Stopped` on [`Worker::stop`] or
//! when the consume loop ends on its own. Stopping cancels the current wait or
//! processing at its next suspension point; an order held at that moment is
//! released back to pending, never completed.
//!
//! ## Failure
//!
//! A processor error is not recoverable inside the worker. The order is
//! released so it is not lost and the task ends with
//! [`DispatchError::ProcessingFailed`], which the pool collects when reaping.

use futures::FutureExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::handoff::{HandoffPort, OrderHolder};
use super::processor::OrderProcessor;
use super::queue::DispatchQueue;
use crate::constants::WorkerState;
use crate::error::{DispatchError, Result};
use crate::models::{Order, OrderId};

/// Unique identifier for a worker instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(Uuid);

impl WorkerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WorkerId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for WorkerId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Point-in-time view of a worker for status reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerStatus {
    pub worker_id: WorkerId,
    pub state: WorkerState,
    pub current_order: Option<OrderId>,
    pub orders_completed: u64,
}

/// State shared between the worker handle and its consume loop
#[derive(Debug)]
struct WorkerShared {
    state: Mutex<WorkerState>,
    cancel: CancellationToken,
    /// Set by the handoff desk when an order is sent, cleared on release or completion
    current_order: OrderHolder,
    orders_completed: AtomicU64,
}

/// Handle to one cooking bot
#[derive(Debug)]
pub struct Worker {
    id: WorkerId,
    shared: Arc<WorkerShared>,
    processor: Arc<dyn OrderProcessor>,
    handle: Mutex<Option<JoinHandle<Result<()>>>>,
}

impl Worker {
    /// Create an idle worker
    pub fn new(processor: Arc<dyn OrderProcessor>) -> Self {
        Self {
            id: WorkerId::new(),
            shared: Arc::new(WorkerShared {
                state: Mutex::new(WorkerState::Idle),
                cancel: CancellationToken::new(),
                current_order: Arc::new(Mutex::new(None)),
                orders_completed: AtomicU64::new(0),
            }),
            processor,
            handle: Mutex::new(None),
        }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    pub fn state(&self) -> WorkerState {
        *self.shared.state.lock()
    }

    /// Order handed to this worker and not yet completed or released
    pub fn current_order(&self) -> Option<OrderId> {
        *self.shared.current_order.lock()
    }

    pub fn orders_completed(&self) -> u64 {
        self.shared.orders_completed.load(Ordering::Acquire)
    }

    pub fn status(&self) -> WorkerStatus {
        WorkerStatus {
            worker_id: self.id,
            state: self.state(),
            current_order: self.current_order(),
            orders_completed: self.orders_completed(),
        }
    }

    /// Whether `stop` has been called on this worker
    pub fn is_stop_requested(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }

    /// Whether the consume loop has ended
    pub fn is_finished(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .is_some_and(|handle| handle.is_finished())
    }

    /// Transition `Idle` → `Running` and spawn the consume loop on `runtime`
    pub fn start(&self, runtime: &Handle, queue: Arc<DispatchQueue>, port: HandoffPort) -> Result<()> {
        {
            let mut state = self.shared.state.lock();
            if *state != WorkerState::Idle {
                return Err(DispatchError::InvalidState(format!(
                    "Worker {} cannot start from state {}",
                    self.id, *state
                )));
            }
            *state = WorkerState::Running;
        }

        let consume_loop = ConsumeLoop {
            worker_id: self.id,
            shared: Arc::clone(&self.shared),
            processor: Arc::clone(&self.processor),
            queue,
            port,
        };
        *self.handle.lock() = Some(runtime.spawn(consume_loop.run()));

        info!(
            worker_id = %self.id,
            processor = self.processor.name(),
            "🤖 WORKER: Started"
        );
        Ok(())
    }

    /// Request the worker to stop; idempotent
    ///
    /// Returns immediately. The consume loop observes the cancellation at its
    /// current suspension point and releases any held order.
    pub fn stop(&self) {
        {
            let mut state = self.shared.state.lock();
            if *state == WorkerState::Stopped {
                debug!(worker_id = %self.id, "Worker already stopped");
                return;
            }
            *state = WorkerState::Stopped;
        }

        self.shared.cancel.cancel();
        info!(
            worker_id = %self.id,
            current_order = ?self.current_order(),
            "🛑 WORKER: Stop requested"
        );
    }

    /// Take the loop result if the task has already ended
    pub fn take_finished(&self) -> Option<Result<()>> {
        let mut slot = self.handle.lock();
        if !slot.as_ref().is_some_and(|handle| handle.is_finished()) {
            return None;
        }
        let mut handle = slot.take()?;
        match (&mut handle).now_or_never() {
            Some(joined) => Some(flatten_join(joined)),
            None => {
                *slot = Some(handle);
                None
            }
        }
    }

    /// Wait for the consume loop to end, aborting it after `timeout`
    pub async fn join(&self, timeout: Duration) -> Result<()> {
        let handle = self.handle.lock().take();
        let Some(mut handle) = handle else {
            return Ok(());
        };

        match tokio::time::timeout(timeout, &mut handle).await {
            Ok(joined) => flatten_join(joined),
            Err(_) => {
                handle.abort();
                Err(DispatchError::shutdown_timeout(
                    format!("worker {}", self.id),
                    timeout.as_millis() as u64,
                ))
            }
        }
    }
}

fn flatten_join(joined: std::result::Result<Result<()>, JoinError>) -> Result<()> {
    match joined {
        Ok(result) => result,
        Err(e) if e.is_cancelled() => Ok(()),
        Err(e) => Err(DispatchError::InvalidState(format!(
            "Worker task panicked: {e}"
        ))),
    }
}

/// Why the consume loop ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopExit {
    StopRequested,
    HandoffClosed,
}

/// Result of holding an order through the processor
enum ProcessOutcome {
    Finished(anyhow::Result<()>),
    Cancelled,
}

struct ConsumeLoop {
    worker_id: WorkerId,
    shared: Arc<WorkerShared>,
    processor: Arc<dyn OrderProcessor>,
    queue: Arc<DispatchQueue>,
    port: HandoffPort,
}

impl ConsumeLoop {
    async fn run(self) -> Result<()> {
        debug!(worker_id = %self.worker_id, "Consume loop running");

        let result = self.consume().await;

        *self.shared.state.lock() = WorkerState::Stopped;
        *self.shared.current_order.lock() = None;

        match &result {
            Ok(LoopExit::StopRequested) => {
                info!(worker_id = %self.worker_id, "Consume loop ended after stop request")
            }
            Ok(LoopExit::HandoffClosed) => {
                info!(worker_id = %self.worker_id, "Consume loop ended, handoff closed")
            }
            Err(e) => error!(worker_id = %self.worker_id, error = %e, "❌ WORKER: Terminated"),
        }

        result.map(|_| ())
    }

    async fn consume(&self) -> Result<LoopExit> {
        loop {
            let order = match self.next_order().await {
                Ok(order) => order,
                Err(exit) => return Ok(exit),
            };

            // Stop raced with the handoff; discard without processing
            if self.shared.cancel.is_cancelled() {
                self.release(order.id);
                *self.shared.current_order.lock() = None;
                return Ok(LoopExit::StopRequested);
            }

            if let Some(exit) = self.cook(order).await? {
                return Ok(exit);
            }
        }
    }

    /// Register as idle and wait for one order
    async fn next_order(&self) -> std::result::Result<Order, LoopExit> {
        let mut receiver = tokio::select! {
            biased;
            _ = self.shared.cancel.cancelled() => return Err(LoopExit::StopRequested),
            registered = self.port.register(&self.shared.current_order) => {
                registered.ok_or(LoopExit::HandoffClosed)?
            }
        };

        tokio::select! {
            biased;
            _ = self.shared.cancel.cancelled() => {
                // An order sent before the receiver closed is still ours to return
                receiver.close();
                if let Ok(order) = receiver.try_recv() {
                    self.release(order.id);
                    *self.shared.current_order.lock() = None;
                }
                Err(LoopExit::StopRequested)
            }
            received = &mut receiver => received.map_err(|_| LoopExit::HandoffClosed),
        }
    }

    /// Process one order; `Some(exit)` when the worker was stopped meanwhile
    async fn cook(&self, order: Order) -> Result<Option<LoopExit>> {
        debug!(
            worker_id = %self.worker_id,
            order_id = order.id.value(),
            is_vip = order.is_vip,
            "Processing order"
        );

        let outcome = tokio::select! {
            biased;
            _ = self.shared.cancel.cancelled() => ProcessOutcome::Cancelled,
            result = self.processor.process(&order) => ProcessOutcome::Finished(result),
        };

        let exit = match outcome {
            ProcessOutcome::Cancelled => {
                self.release(order.id);
                Ok(Some(LoopExit::StopRequested))
            }
            ProcessOutcome::Finished(Ok(())) => {
                self.queue.complete(order.id)?;
                self.shared.orders_completed.fetch_add(1, Ordering::AcqRel);
                Ok(None)
            }
            ProcessOutcome::Finished(Err(e)) => {
                self.release(order.id);
                Err(DispatchError::processing_failed(
                    self.worker_id,
                    order.id,
                    format!("{e:#}"),
                ))
            }
        };

        *self.shared.current_order.lock() = None;
        exit
    }

    fn release(&self, order_id: OrderId) {
        if !self.queue.release(order_id) {
            warn!(
                worker_id = %self.worker_id,
                order_id = order_id.value(),
                "Released order was not in flight"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::handoff;
    use crate::dispatch::processor::SimulatedCook;
    use async_trait::async_trait;

    #[derive(Debug)]
    struct BurntKitchen;

    #[async_trait]
    impl OrderProcessor for BurntKitchen {
        async fn process(&self, _order: &Order) -> anyhow::Result<()> {
            anyhow::bail!("grill exploded")
        }

        fn name(&self) -> &str {
            "burnt-kitchen"
        }
    }

    fn cook(ms: u64) -> Arc<dyn OrderProcessor> {
        Arc::new(SimulatedCook::new(Duration::from_millis(ms)))
    }

    fn queue_with_claimed_order(id: u64) -> (Arc<DispatchQueue>, Order) {
        let queue = Arc::new(DispatchQueue::new());
        queue.add_order(Order::new(OrderId::new(id), false, "pasta"));
        let order = queue.claim(OrderId::new(id)).unwrap();
        (queue, order)
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn test_worker_completes_handed_over_order() {
        let (queue, order) = queue_with_claimed_order(1);
        let (port, mut desk) = handoff::channel(8);
        let worker = Worker::new(cook(20));

        worker.start(&Handle::current(), Arc::clone(&queue), port).unwrap();
        assert_eq!(worker.state(), WorkerState::Running);

        wait_until(|| {
            desk.collect_idle();
            desk.idle_count() == 1
        })
        .await;
        desk.try_offer(order).unwrap();

        wait_until(|| queue.completed_len() == 1).await;
        assert_eq!(queue.pending_len(), 0);
        wait_until(|| worker.orders_completed() == 1).await;

        worker.stop();
        worker.join(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_mid_processing_releases_order() {
        let (queue, order) = queue_with_claimed_order(1);
        let (port, mut desk) = handoff::channel(8);
        let worker = Worker::new(cook(10_000));
        worker.start(&Handle::current(), Arc::clone(&queue), port).unwrap();

        wait_until(|| {
            desk.collect_idle();
            desk.idle_count() == 1
        })
        .await;
        desk.try_offer(order).unwrap();
        wait_until(|| worker.current_order() == Some(OrderId::new(1))).await;

        worker.stop();
        worker.join(Duration::from_secs(1)).await.unwrap();

        let pending = queue.snapshot_pending();
        assert_eq!(pending.len(), 1);
        assert!(!pending[0].is_processing);
        assert!(!pending[0].is_complete);
        assert_eq!(queue.completed_len(), 0);
        assert_eq!(worker.state(), WorkerState::Stopped);
    }

    #[tokio::test]
    async fn test_order_handed_over_at_stop_is_released() {
        let (queue, order) = queue_with_claimed_order(2);
        let (port, mut desk) = handoff::channel(8);
        let worker = Worker::new(cook(10));
        worker.start(&Handle::current(), Arc::clone(&queue), port).unwrap();

        wait_until(|| {
            desk.collect_idle();
            desk.idle_count() == 1
        })
        .await;

        // Single-threaded runtime: the worker cannot run between these two calls
        worker.stop();
        desk.try_offer(order).unwrap();
        assert_eq!(worker.current_order(), Some(OrderId::new(2)));

        worker.join(Duration::from_secs(1)).await.unwrap();

        let pending = queue.snapshot_pending();
        assert_eq!(pending.len(), 1);
        assert!(!pending[0].is_processing);
        assert!(!pending[0].is_complete);
        assert_eq!(queue.completed_len(), 0);
        assert_eq!(worker.current_order(), None);
        assert_eq!(worker.orders_completed(), 0);
    }

    #[tokio::test]
    async fn test_handoff_attributes_order_before_worker_reads_it() {
        let (queue, order) = queue_with_claimed_order(4);
        let (port, mut desk) = handoff::channel(8);
        let worker = Worker::new(cook(10_000));
        worker.start(&Handle::current(), Arc::clone(&queue), port).unwrap();

        wait_until(|| {
            desk.collect_idle();
            desk.idle_count() == 1
        })
        .await;
        desk.try_offer(order).unwrap();

        // Recorded before the worker task has been polled again
        assert_eq!(worker.current_order(), Some(OrderId::new(4)));
        assert_eq!(worker.status().current_order, Some(OrderId::new(4)));

        worker.stop();
        worker.join(Duration::from_secs(1)).await.unwrap();
        assert_eq!(queue.dispatchable_ids(), vec![OrderId::new(4)]);
    }

    #[tokio::test]
    async fn test_stop_is_idempotent_and_start_requires_idle() {
        let queue = Arc::new(DispatchQueue::new());
        let (port, _desk) = handoff::channel(8);
        let worker = Worker::new(cook(10));

        worker.stop();
        worker.stop();
        assert_eq!(worker.state(), WorkerState::Stopped);

        let result = worker.start(&Handle::current(), queue, port);
        assert!(matches!(result, Err(DispatchError::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_processing_failure_is_surfaced_and_order_released() {
        let (queue, order) = queue_with_claimed_order(5);
        let (port, mut desk) = handoff::channel(8);
        let worker = Worker::new(Arc::new(BurntKitchen));
        worker.start(&Handle::current(), Arc::clone(&queue), port).unwrap();

        wait_until(|| {
            desk.collect_idle();
            desk.idle_count() == 1
        })
        .await;
        desk.try_offer(order).unwrap();
        wait_until(|| worker.is_finished()).await;

        let result = worker.take_finished().expect("task finished");
        assert!(matches!(
            result,
            Err(DispatchError::ProcessingFailed { order_id, .. }) if order_id == OrderId::new(5)
        ));
        assert!(!worker.is_stop_requested());
        assert_eq!(queue.dispatchable_ids(), vec![OrderId::new(5)]);
    }

    #[tokio::test]
    async fn test_closed_handoff_ends_loop() {
        let queue = Arc::new(DispatchQueue::new());
        let (port, mut desk) = handoff::channel(8);
        let worker = Worker::new(cook(10));
        worker.start(&Handle::current(), queue, port).unwrap();

        desk.close();
        worker.join(Duration::from_secs(1)).await.unwrap();
        assert_eq!(worker.state(), WorkerState::Stopped);
    }
}
