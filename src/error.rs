//! # Dispatch Error Types
//!
//! Structured error handling for the dispatcher using thiserror.
//!
//! Cancellation of a worker is deliberately absent from this taxonomy: it is an
//! expected outcome that is recovered inside the worker by releasing the order
//! back to pending. Everything here is either a caller mistake or an invariant
//! violation that must reach a supervisor.

use thiserror::Error;

use crate::config::ConfigurationError;
use crate::dispatch::WorkerId;
use crate::models::OrderId;

/// Errors produced by the dispatch queue, workers and pool
#[derive(Error, Debug)]
pub enum DispatchError {
    /// An order processor failed for a reason other than cancellation
    #[error("Worker {worker_id} failed while processing order {order_id}: {message}")]
    ProcessingFailed {
        worker_id: WorkerId,
        order_id: OrderId,
        message: String,
    },

    /// A completion or release targeted an order that is not in flight
    #[error("Order {order_id} is not in flight")]
    OrderNotInFlight { order_id: OrderId },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("{component} did not stop within {timeout_ms}ms")]
    ShutdownTimeout { component: String, timeout_ms: u64 },

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

impl DispatchError {
    /// Create a processing failure for the given worker and order
    pub fn processing_failed(
        worker_id: WorkerId,
        order_id: OrderId,
        message: impl Into<String>,
    ) -> Self {
        Self::ProcessingFailed {
            worker_id,
            order_id,
            message: message.into(),
        }
    }

    /// Create a shutdown timeout error
    pub fn shutdown_timeout(component: impl Into<String>, timeout_ms: u64) -> Self {
        Self::ShutdownTimeout {
            component: component.into(),
            timeout_ms,
        }
    }

    /// Whether this error signals a broken invariant rather than caller misuse
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ProcessingFailed { .. } | Self::OrderNotInFlight { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, DispatchError>;
