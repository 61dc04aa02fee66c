//! # Dispatcher Configuration System
//!
//! Layered configuration for the dispatcher. Defaults come from
//! [`DispatchConfig::default`], are overridden by optional TOML files and
//! finally by `DISPATCH__SECTION__KEY` environment variables.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use kitchen_dispatch::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let duration = manager.config().worker.processing_duration();
//! let tick = manager.config().scheduler.tick_interval();
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure mirroring `config/dispatch.toml`
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Per-worker processing settings
    pub worker: WorkerConfig,

    /// Scheduling loop cadence
    pub scheduler: SchedulerConfig,

    /// Worker pool sizing
    pub pool: PoolConfig,

    /// Channel buffer sizes
    pub channels: ChannelsConfig,

    /// Log output settings
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Fixed time spent on each order
    pub processing_duration_ms: u64,
    /// Time allowed for a stopped worker to wind down during shutdown
    pub shutdown_timeout_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            processing_duration_ms: constants::DEFAULT_PROCESSING_DURATION_MS,
            shutdown_timeout_ms: constants::DEFAULT_SHUTDOWN_TIMEOUT_MS,
        }
    }
}

impl WorkerConfig {
    pub fn processing_duration(&self) -> Duration {
        Duration::from_millis(self.processing_duration_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub tick_interval_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: constants::DEFAULT_TICK_INTERVAL_MS,
        }
    }
}

impl SchedulerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Workers started with the dispatcher
    pub initial_workers: usize,
    /// Scale-up is refused beyond this many active workers
    pub max_workers: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            initial_workers: constants::DEFAULT_INITIAL_WORKERS,
            max_workers: constants::DEFAULT_MAX_WORKERS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ChannelsConfig {
    /// Idle-worker registration buffer
    /// Holds at most one slot per live worker plus stale slots awaiting pruning
    pub handoff_buffer_size: usize,
}

impl Default for ChannelsConfig {
    fn default() -> Self {
        Self {
            handoff_buffer_size: constants::DEFAULT_HANDOFF_BUFFER_SIZE,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive; falls back to the environment default when unset
    pub level: Option<String>,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl DispatchConfig {
    /// Validate cross-field constraints
    pub fn validate(&self) -> ConfigResult<()> {
        if self.worker.processing_duration_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "worker.processing_duration_ms",
                self.worker.processing_duration_ms,
                "must be greater than zero",
            ));
        }

        if self.scheduler.tick_interval_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "scheduler.tick_interval_ms",
                self.scheduler.tick_interval_ms,
                "must be greater than zero",
            ));
        }

        if self.channels.handoff_buffer_size == 0 {
            return Err(ConfigurationError::invalid_value(
                "channels.handoff_buffer_size",
                self.channels.handoff_buffer_size,
                "must be greater than zero",
            ));
        }

        if self.pool.max_workers == 0 {
            return Err(ConfigurationError::invalid_value(
                "pool.max_workers",
                self.pool.max_workers,
                "must be greater than zero",
            ));
        }

        if self.pool.initial_workers > self.pool.max_workers {
            return Err(ConfigurationError::invalid_value(
                "pool.initial_workers",
                self.pool.initial_workers,
                format!("exceeds pool.max_workers ({})", self.pool.max_workers),
            ));
        }

        Ok(())
    }
}
