//! Order processing seam used by workers.

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

use crate::models::Order;

/// Work performed by a worker while it holds an order
///
/// Implementations must be cancel-safe: the worker drops the returned future
/// when it is stopped mid-processing and releases the order itself. Any
/// returned error is treated as fatal for the worker.
#[async_trait]
pub trait OrderProcessor: Send + Sync + fmt::Debug + 'static {
    async fn process(&self, order: &Order) -> anyhow::Result<()>;

    /// Name of this processor for logging purposes
    fn name(&self) -> &str;
}

/// Simulated cook that holds each order for a fixed duration
#[derive(Debug, Clone)]
pub struct SimulatedCook {
    duration: Duration,
}

impl SimulatedCook {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}

#[async_trait]
impl OrderProcessor for SimulatedCook {
    async fn process(&self, _order: &Order) -> anyhow::Result<()> {
        tokio::time::sleep(self.duration).await;
        Ok(())
    }

    fn name(&self) -> &str {
        "simulated-cook"
    }
}
