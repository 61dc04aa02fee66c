//! # System Constants
//!
//! Default timings, channel sizes and the order lifecycle states that define
//! the operational boundaries of the dispatcher.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Time a simulated cook spends on one order
pub const DEFAULT_PROCESSING_DURATION_MS: u64 = 3_000;

/// Interval between scheduling loop scans
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1_000;

/// How long shutdown waits for a stopped worker to release its order
pub const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 5_000;

/// Capacity of the idle-worker registration channel
pub const DEFAULT_HANDOFF_BUFFER_SIZE: usize = 256;

/// Workers started by `Dispatcher::start`
pub const DEFAULT_INITIAL_WORKERS: usize = 0;

/// Upper bound on concurrently active workers
pub const DEFAULT_MAX_WORKERS: usize = 64;

/// Order operation names used in structured logs
pub mod operations {
    pub const ORDER_SUBMITTED: &str = "order.submitted";
    pub const ORDER_CLAIMED: &str = "order.claimed";
    pub const ORDER_RELEASED: &str = "order.released";
    pub const ORDER_COMPLETED: &str = "order.completed";
}

/// Lifecycle state of an order, derived from its processing and completion flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    /// Waiting for a worker
    Pending,
    /// Claimed by exactly one worker
    InFlight,
    /// Finished; terminal
    Complete,
}

impl OrderState {
    /// Whether the scheduling loop may offer an order in this state
    pub fn is_dispatchable(self) -> bool {
        matches!(self, OrderState::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderState::Pending => "pending",
            OrderState::InFlight => "in_flight",
            OrderState::Complete => "complete",
        }
    }
}

impl fmt::Display for OrderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Idle,
    Running,
    Stopped,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerState::Idle => "idle",
            WorkerState::Running => "running",
            WorkerState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}
