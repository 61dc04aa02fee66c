//! # Dispatch Queue
//!
//! Pending and completed order collections behind a single lock.
//!
//! Every order state transition (claim, release, complete) happens inside the
//! same critical section, so an order is observed in exactly one collection
//! and in exactly one state by any reader. Snapshots are owned copies.

use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use crate::constants::operations;
use crate::error::{DispatchError, Result};
use crate::logging::log_order_operation;
use crate::models::{Order, OrderId};

#[derive(Debug, Default)]
struct QueueState {
    /// Not-yet-complete orders, VIP first, stable on insertion order
    pending: Vec<Order>,
    /// Completed orders in completion order
    completed: Vec<Order>,
    /// Last id handed out by `submit`
    last_id: u64,
}

impl QueueState {
    fn position(&self, id: OrderId) -> Option<usize> {
        self.pending.iter().position(|order| order.id == id)
    }

    fn insert(&mut self, order: Order) {
        self.pending.push(order);
        self.pending.sort_by(Order::priority_cmp);
    }
}

/// Counts of orders by lifecycle state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub pending: usize,
    pub in_flight: usize,
    pub completed: usize,
}

/// Consistent view of both collections
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueueSnapshot {
    pub pending: Vec<Order>,
    pub completed: Vec<Order>,
}

/// Priority-ordered order store shared by the dispatcher, scheduler and workers
#[derive(Debug, Default)]
pub struct DispatchQueue {
    state: Mutex<QueueState>,
}

impl DispatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an order and re-sort pending VIP-first
    ///
    /// `sort_by` is stable, so orders of equal priority keep insertion order.
    pub fn add_order(&self, order: Order) {
        log_order_operation(operations::ORDER_SUBMITTED, &order, None);
        self.state.lock().insert(order);
    }

    /// Allocate the next sequential id and insert a new order under one lock
    ///
    /// Ids start at 1. Allocation and insertion share the critical section, so
    /// equal-priority orders always appear in id order.
    pub fn submit(&self, is_vip: bool, content: impl Into<String>) -> Order {
        let order = {
            let mut state = self.state.lock();
            state.last_id += 1;
            let order = Order::new(OrderId::new(state.last_id), is_vip, content);
            state.insert(order.clone());
            order
        };

        log_order_operation(operations::ORDER_SUBMITTED, &order, None);
        order
    }

    /// Id the next `submit` will allocate
    pub fn next_order_id(&self) -> OrderId {
        OrderId::new(self.state.lock().last_id + 1)
    }

    /// Move a pending order to in-flight
    ///
    /// Returns a copy of the claimed order, or `None` when the order is no
    /// longer pending (already claimed, completed or unknown).
    pub fn claim(&self, id: OrderId) -> Option<Order> {
        let claimed = {
            let mut state = self.state.lock();
            let index = state.position(id)?;
            let order = &mut state.pending[index];
            if !order.is_pending() {
                return None;
            }
            order.is_processing = true;
            order.clone()
        };

        debug!(order_id = id.value(), "Order claimed for handoff");
        Some(claimed)
    }

    /// Return an in-flight order to pending so it can be offered again
    ///
    /// Returns `false` when the order was not in flight.
    pub fn release(&self, id: OrderId) -> bool {
        let released = {
            let mut state = self.state.lock();
            match state.position(id) {
                Some(index) if state.pending[index].is_processing => {
                    state.pending[index].is_processing = false;
                    Some(state.pending[index].clone())
                }
                _ => None,
            }
        };

        match released {
            Some(order) => {
                log_order_operation(operations::ORDER_RELEASED, &order, None);
                true
            }
            None => false,
        }
    }

    /// Atomically move an in-flight order from pending to completed
    pub fn complete(&self, id: OrderId) -> Result<Order> {
        let completed = {
            let mut state = self.state.lock();
            let index = state
                .position(id)
                .filter(|&index| state.pending[index].is_processing)
                .ok_or(DispatchError::OrderNotInFlight { order_id: id })?;

            let mut order = state.pending.remove(index);
            order.is_complete = true;
            order.is_processing = false;
            order.completed_at = Some(Utc::now());
            state.completed.push(order.clone());
            order
        };

        log_order_operation(operations::ORDER_COMPLETED, &completed, None);
        Ok(completed)
    }

    /// Copy of the pending collection in priority order
    pub fn snapshot_pending(&self) -> Vec<Order> {
        self.state.lock().pending.clone()
    }

    /// Copy of the completed collection in completion order
    pub fn snapshot_completed(&self) -> Vec<Order> {
        self.state.lock().completed.clone()
    }

    /// Copy of both collections taken under one lock
    ///
    /// Separate `snapshot_pending` and `snapshot_completed` calls may straddle a
    /// completion; use this when the two views must agree.
    pub fn snapshot(&self) -> QueueSnapshot {
        let state = self.state.lock();
        QueueSnapshot {
            pending: state.pending.clone(),
            completed: state.completed.clone(),
        }
    }

    /// Ids of orders that may be offered this tick, in priority order
    pub fn dispatchable_ids(&self) -> Vec<OrderId> {
        self.state
            .lock()
            .pending
            .iter()
            .filter(|order| order.state().is_dispatchable())
            .map(|order| order.id)
            .collect()
    }

    pub fn pending_len(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn completed_len(&self) -> usize {
        self.state.lock().completed.len()
    }

    pub fn stats(&self) -> QueueStats {
        let state = self.state.lock();
        let in_flight = state
            .pending
            .iter()
            .filter(|order| order.is_processing)
            .count();

        QueueStats {
            pending: state.pending.len() - in_flight,
            in_flight,
            completed: state.completed.len(),
        }
    }
}
