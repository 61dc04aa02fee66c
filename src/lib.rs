#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Kitchen Dispatch
//!
//! Order-fulfillment dispatcher for a simulated kitchen.
//!
//! ## Overview
//!
//! Orders arrive, are queued with VIP priority, and are handed to a
//! dynamically sized pool of cooking-bot workers. Each worker processes one
//! order at a time for a fixed duration and then reports completion. Workers
//! can be added or removed one at a time at runtime; removing a worker that
//! holds an order returns the order to the queue.
//!
//! ## Module Organization
//!
//! - [`models`] - Order data model
//! - [`dispatch`] - Queue, handoff, workers, pool, scheduling loop and the [`Dispatcher`]
//! - [`config`] - Layered configuration management
//! - [`constants`] - Defaults and lifecycle states
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use kitchen_dispatch::config::ConfigManager;
//! use kitchen_dispatch::Dispatcher;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let dispatcher = Dispatcher::new(manager.config().clone())?;
//! dispatcher.start()?;
//!
//! let order_id = dispatcher.submit_order(true, "Ramen");
//! dispatcher.set_worker_count(1)?;
//! println!("Submitted order {order_id}");
//!
//! dispatcher.shutdown().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # Unit and integration tests
//! ```

pub mod config;
pub mod constants;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod models;

pub use config::{ConfigManager, ConfigurationError, DispatchConfig};
pub use constants::{OrderState, WorkerState};
pub use dispatch::{Dispatcher, DispatcherStatus, PoolStatus, ScaleOutcome, WorkerId};
pub use error::{DispatchError, Result};
pub use models::{Order, OrderId};
