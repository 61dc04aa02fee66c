mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use common::builders::*;
use kitchen_dispatch::dispatch::OrderProcessor;
use kitchen_dispatch::{DispatchError, Dispatcher, Order, ScaleOutcome};

const WAIT: Duration = Duration::from_secs(3);

fn ids(orders: &[Order]) -> Vec<u64> {
    orders.iter().map(|order| order.id.value()).collect()
}

fn in_flight(dispatcher: &Dispatcher) -> usize {
    dispatcher.status().orders.in_flight
}

#[tokio::test]
async fn test_vip_order_is_queued_ahead_of_normal_order() {
    let dispatcher = Dispatcher::new(fast_config(50, 10)).unwrap();

    let a = dispatcher.submit_order(false, "A");
    let b = dispatcher.submit_order(true, "B");

    let pending = dispatcher.pending_snapshot();
    assert_eq!(ids(&pending), vec![b.value(), a.value()]);
    assert!(dispatcher.completed_snapshot().is_empty());
}

#[tokio::test]
async fn test_single_worker_completes_single_order() {
    let dispatcher = started_dispatcher(50, 10);
    let id = dispatcher.submit_order(false, "Noodles");
    dispatcher.set_worker_count(1).unwrap();

    assert!(wait_for(WAIT, || dispatcher.completed_snapshot().len() == 1).await);

    let completed = dispatcher.completed_snapshot();
    assert_eq!(completed[0].id, id);
    assert!(completed[0].is_complete);
    assert!(completed[0].completed_at.is_some());
    assert!(dispatcher.pending_snapshot().is_empty());

    dispatcher.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_single_worker_completes_vip_orders_first() {
    let dispatcher = started_dispatcher(30, 10);
    dispatcher.submit_order(false, "first normal");
    dispatcher.submit_order(false, "second normal");
    dispatcher.submit_order(true, "vip");
    dispatcher.set_worker_count(1).unwrap();

    assert!(wait_for(WAIT, || dispatcher.completed_snapshot().len() == 3).await);
    assert_eq!(ids(&dispatcher.completed_snapshot()), vec![3, 1, 2]);

    dispatcher.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_two_workers_process_in_parallel() {
    let dispatcher = started_dispatcher(300, 10);
    dispatcher.set_worker_count(1).unwrap();
    dispatcher.set_worker_count(1).unwrap();
    // Let both workers register as idle
    tokio::time::sleep(Duration::from_millis(50)).await;

    let started = Instant::now();
    dispatcher.submit_order(false, "one");
    dispatcher.submit_order(false, "two");

    assert!(wait_for(WAIT, || dispatcher.completed_snapshot().len() == 2).await);
    assert!(
        started.elapsed() < Duration::from_millis(550),
        "two orders took {:?}, expected roughly one processing duration",
        started.elapsed()
    );

    dispatcher.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_scale_down_mid_processing_returns_order_then_completes() {
    let dispatcher = started_dispatcher(300, 10);
    let id = dispatcher.submit_order(true, "Soufflé");
    dispatcher.set_worker_count(1).unwrap();

    assert!(wait_for(WAIT, || in_flight(&dispatcher) == 1).await);
    assert!(matches!(
        dispatcher.set_worker_count(-1).unwrap(),
        ScaleOutcome::Removed { active_workers: 0, .. }
    ));

    assert!(wait_for(WAIT, || in_flight(&dispatcher) == 0).await);
    let pending = dispatcher.pending_snapshot();
    assert_eq!(ids(&pending), vec![id.value()]);
    assert!(!pending[0].is_processing);
    assert!(!pending[0].is_complete);
    assert!(dispatcher.completed_snapshot().is_empty());

    dispatcher.set_worker_count(1).unwrap();
    assert!(wait_for(WAIT, || dispatcher.completed_snapshot().len() == 1).await);
    assert!(dispatcher.pending_snapshot().is_empty());

    dispatcher.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_scale_to_zero_and_back_drains_all_orders() {
    let dispatcher = started_dispatcher(40, 10);
    for n in 0..6 {
        dispatcher.submit_order(n % 2 == 0, format!("dish-{n}"));
    }
    dispatcher.set_worker_count(1).unwrap();
    dispatcher.set_worker_count(1).unwrap();

    assert!(wait_for(WAIT, || in_flight(&dispatcher) > 0).await);
    dispatcher.set_worker_count(-1).unwrap();
    dispatcher.set_worker_count(-1).unwrap();
    assert_eq!(
        dispatcher.set_worker_count(-1).unwrap(),
        ScaleOutcome::PoolEmpty
    );
    assert_eq!(dispatcher.worker_count(), 0);
    assert!(wait_for(WAIT, || in_flight(&dispatcher) == 0).await);

    dispatcher.set_worker_count(1).unwrap();
    assert!(wait_for(WAIT, || dispatcher.completed_snapshot().len() == 6).await);
    assert!(dispatcher.pending_snapshot().is_empty());

    dispatcher.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_completed_orders_never_appear_in_pending() {
    let dispatcher = started_dispatcher(5, 5);
    for n in 0..30 {
        dispatcher.submit_order(n % 3 == 0, "batch");
    }
    for _ in 0..3 {
        dispatcher.set_worker_count(1).unwrap();
    }

    let drained = wait_for(WAIT, || {
        let snapshot = dispatcher.snapshot();
        assert_eq!(snapshot.pending.len() + snapshot.completed.len(), 30);
        for done in &snapshot.completed {
            assert!(done.is_complete);
            assert!(!snapshot.pending.iter().any(|p| p.id == done.id));
        }
        snapshot.completed.len() == 30
    })
    .await;
    assert!(drained);

    dispatcher.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_shutdown_releases_in_flight_orders() {
    let dispatcher = started_dispatcher(10_000, 10);
    dispatcher.submit_order(false, "Slow roast");
    dispatcher.set_worker_count(1).unwrap();
    assert!(wait_for(WAIT, || in_flight(&dispatcher) == 1).await);

    dispatcher.shutdown().await.unwrap();

    let status = dispatcher.status();
    assert!(!status.running);
    assert_eq!(status.orders.pending, 1);
    assert_eq!(status.orders.in_flight, 0);
    assert_eq!(dispatcher.worker_count(), 0);
    assert!(matches!(
        dispatcher.set_worker_count(1),
        Err(DispatchError::InvalidState(_))
    ));
}

#[derive(Debug, Default)]
struct FailsOnce {
    failed: AtomicBool,
}

#[async_trait]
impl OrderProcessor for FailsOnce {
    async fn process(&self, _order: &Order) -> anyhow::Result<()> {
        if !self.failed.swap(true, Ordering::SeqCst) {
            anyhow::bail!("oven fault");
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok(())
    }

    fn name(&self) -> &str {
        "fails-once"
    }
}

#[tokio::test]
async fn test_failed_worker_is_reaped_and_order_retried() {
    let dispatcher = started_dispatcher_with(Arc::new(FailsOnce::default()), 10);
    dispatcher.submit_order(false, "Pizza");
    dispatcher.set_worker_count(1).unwrap();

    assert!(wait_for(WAIT, || dispatcher.status().pool.failed_workers_reaped == 1).await);
    assert_eq!(dispatcher.worker_count(), 0);
    assert_eq!(dispatcher.pending_snapshot().len(), 1);

    dispatcher.set_worker_count(1).unwrap();
    assert!(wait_for(WAIT, || dispatcher.completed_snapshot().len() == 1).await);

    dispatcher.shutdown().await.unwrap();
}

#[derive(Debug, Default)]
struct PanicsOnce {
    panicked: AtomicBool,
}

#[async_trait]
impl OrderProcessor for PanicsOnce {
    async fn process(&self, _order: &Order) -> anyhow::Result<()> {
        if !self.panicked.swap(true, Ordering::SeqCst) {
            panic!("deep fryer seized");
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok(())
    }

    fn name(&self) -> &str {
        "panics-once"
    }
}

#[tokio::test]
async fn test_panicked_worker_releases_order_for_retry() {
    let dispatcher = started_dispatcher_with(Arc::new(PanicsOnce::default()), 10);
    dispatcher.submit_order(true, "Tempura");
    dispatcher.set_worker_count(1).unwrap();

    assert!(wait_for(WAIT, || dispatcher.status().pool.failed_workers_reaped == 1).await);
    assert_eq!(dispatcher.worker_count(), 0);
    let pending = dispatcher.pending_snapshot();
    assert_eq!(pending.len(), 1);
    assert!(!pending[0].is_processing);
    assert_eq!(in_flight(&dispatcher), 0);

    dispatcher.set_worker_count(1).unwrap();
    assert!(wait_for(WAIT, || dispatcher.completed_snapshot().len() == 1).await);
    assert!(dispatcher.pending_snapshot().is_empty());

    dispatcher.shutdown().await.unwrap();
}
