//! # Handoff Channel
//!
//! Rendezvous between the scheduling loop and idle workers.
//!
//! An idle worker registers a one-shot slot through its [`HandoffPort`] and
//! waits on the paired receiver. The scheduling loop owns the [`HandoffDesk`],
//! which collects registered slots and offers each order to exactly one of
//! them. An offer never blocks: it succeeds only when some worker is waiting,
//! so orders are never parked in a buffer that no worker will drain.
//!
//! Slots belonging to stopped workers are detected through
//! [`oneshot::Sender::is_closed`] and discarded on collection.
//!
//! Each slot carries the worker's [`OrderHolder`]. The desk records the order
//! id there before sending, so an order is attributed to its worker from the
//! moment of handoff, even while it still sits unread in the one-shot channel.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::models::{Order, OrderId};

/// Id of the order a worker currently holds
pub type OrderHolder = Arc<Mutex<Option<OrderId>>>;

#[derive(Debug)]
struct OrderSlot {
    sender: oneshot::Sender<Order>,
    holder: OrderHolder,
}

impl OrderSlot {
    fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Receiving end of a registered slot; resolves once an order is handed over
pub type OrderReceiver = oneshot::Receiver<Order>;

/// Create a handoff channel whose registration buffer holds `buffer_size` slots
pub fn channel(buffer_size: usize) -> (HandoffPort, HandoffDesk) {
    let (slots_tx, slots_rx) = mpsc::channel(buffer_size);
    (
        HandoffPort { slots: slots_tx },
        HandoffDesk {
            slots: slots_rx,
            idle: VecDeque::new(),
        },
    )
}

/// Worker side of the handoff; cheap to clone, one per worker
#[derive(Debug, Clone)]
pub struct HandoffPort {
    slots: mpsc::Sender<OrderSlot>,
}

impl HandoffPort {
    /// Announce that the caller is idle and ready for one order
    ///
    /// `holder` receives the order id at handoff. Returns `None` once the desk
    /// has been closed or dropped.
    pub async fn register(&self, holder: &OrderHolder) -> Option<OrderReceiver> {
        let (sender, receiver) = oneshot::channel();
        let slot = OrderSlot {
            sender,
            holder: Arc::clone(holder),
        };
        self.slots.send(slot).await.ok()?;
        Some(receiver)
    }

    pub fn is_closed(&self) -> bool {
        self.slots.is_closed()
    }
}

/// Scheduler side of the handoff
#[derive(Debug)]
pub struct HandoffDesk {
    slots: mpsc::Receiver<OrderSlot>,
    /// Registered slots in arrival order
    idle: VecDeque<OrderSlot>,
}

impl HandoffDesk {
    /// Drain newly registered slots and discard those whose worker is gone
    ///
    /// Returns the number of stale slots discarded.
    pub fn collect_idle(&mut self) -> usize {
        while let Ok(slot) = self.slots.try_recv() {
            self.idle.push_back(slot);
        }

        let before = self.idle.len();
        self.idle.retain(|slot| !slot.is_closed());
        let stale = before - self.idle.len();

        if stale > 0 {
            debug!(stale, idle = self.idle.len(), "Discarded stale worker slots");
        }
        stale
    }

    /// Number of collected slots believed to have a waiting worker
    pub fn idle_count(&self) -> usize {
        self.idle.len()
    }

    /// Hand the order to one waiting worker without blocking
    ///
    /// Gives the order back when no collected slot accepts it.
    pub fn try_offer(&mut self, mut order: Order) -> std::result::Result<(), Order> {
        while let Some(slot) = self.idle.pop_front() {
            *slot.holder.lock() = Some(order.id);
            match slot.sender.send(order) {
                Ok(()) => return Ok(()),
                // Worker stopped after collection; try the next one
                Err(returned) => {
                    *slot.holder.lock() = None;
                    order = returned;
                }
            }
        }
        Err(order)
    }

    /// Refuse further registrations and wake every waiting worker
    ///
    /// Waiting workers observe a closed slot and leave their loop.
    pub fn close(&mut self) {
        self.slots.close();
        while let Ok(slot) = self.slots.try_recv() {
            drop(slot);
        }
        self.idle.clear();
    }
}
