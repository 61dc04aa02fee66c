//! # Scheduling Loop
//!
//! Fixed-tick loop that matches pending orders with idle workers.
//!
//! Each tick reaps terminated workers, collects idle-worker slots from the
//! handoff desk and walks the dispatchable orders in priority order. An order
//! is claimed before it is offered so no other path can take it meanwhile; if
//! no worker accepts the offer the claim is released and the order waits for
//! the next tick. Nothing in a tick blocks.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace};

use super::handoff::HandoffDesk;
use super::pool::PoolManager;
use super::queue::DispatchQueue;
use crate::constants::operations;
use crate::logging::log_order_operation;

/// Summary of one scheduling pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    /// Workers removed because their task ended without a stop request
    pub reaped: usize,
    /// Slots discarded because their worker had stopped
    pub stale_slots: usize,
    /// Idle slots available at the start of the walk
    pub idle_workers: usize,
    /// Orders claimed and offered
    pub offered: usize,
    /// Offers a worker accepted
    pub handed_off: usize,
    /// Offers nobody accepted; released back to pending
    pub returned: usize,
}

impl TickReport {
    pub fn is_idle(&self) -> bool {
        self.offered == 0 && self.reaped == 0 && self.stale_slots == 0
    }
}

/// Owns the scheduler side of the handoff and drives it on a fixed interval
#[derive(Debug)]
pub struct Scheduler {
    queue: Arc<DispatchQueue>,
    pool: Arc<PoolManager>,
    desk: HandoffDesk,
    tick_interval: Duration,
}

impl Scheduler {
    pub fn new(
        queue: Arc<DispatchQueue>,
        pool: Arc<PoolManager>,
        desk: HandoffDesk,
        tick_interval: Duration,
    ) -> Self {
        Self {
            queue,
            pool,
            desk,
            tick_interval,
        }
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Run one scheduling pass
    pub fn run_tick(&mut self) -> TickReport {
        let mut report = TickReport {
            reaped: self.pool.reap_terminated().len(),
            stale_slots: self.desk.collect_idle(),
            idle_workers: self.desk.idle_count(),
            ..TickReport::default()
        };

        for order_id in self.queue.dispatchable_ids() {
            if self.desk.idle_count() == 0 {
                break;
            }

            // Claimed elsewhere since the id list was taken
            let Some(order) = self.queue.claim(order_id) else {
                continue;
            };
            log_order_operation(operations::ORDER_CLAIMED, &order, None);
            report.offered += 1;

            match self.desk.try_offer(order) {
                Ok(()) => report.handed_off += 1,
                Err(order) => {
                    report.returned += 1;
                    self.queue.release(order.id);
                }
            }
        }

        if report.is_idle() {
            trace!("Scheduling tick found nothing to do");
        } else {
            debug!(
                reaped = report.reaped,
                stale_slots = report.stale_slots,
                idle_workers = report.idle_workers,
                offered = report.offered,
                handed_off = report.handed_off,
                returned = report.returned,
                "Scheduling tick complete"
            );
        }
        report
    }

    /// Tick until `shutdown` is cancelled, then close the handoff
    ///
    /// Closing the desk wakes every worker still waiting for an order.
    #[instrument(skip_all)]
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!(
            tick_interval_ms = self.tick_interval.as_millis() as u64,
            "⏱️ SCHEDULER: Starting scheduling loop"
        );

        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    self.run_tick();
                }
            }
        }

        self.desk.close();
        info!("🛑 SCHEDULER: Scheduling loop stopped");
    }
}
