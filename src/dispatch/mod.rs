//! # Order Dispatch
//!
//! Components that move orders from submission to completion.
//!
//! ## Architecture
//!
//! ```text
//! Dispatcher ──submit──▶ DispatchQueue ◀──complete/release── Worker (xN)
//!     │                       ▲                                 ▲
//!     │ scale ±1              │ claim/release                   │ one order
//!     ▼                       │                                 │
//! PoolManager          Scheduler ──try_offer──▶ HandoffDesk ── HandoffPort
//! ```
//!
//! - [`queue`] - priority-ordered pending and completed collections
//! - [`handoff`] - non-blocking rendezvous between scheduler and idle workers
//! - [`worker`] - one Tokio task consuming one order at a time
//! - [`processor`] - the work done while a worker holds an order
//! - [`pool`] - LIFO scaling and reaping of workers
//! - [`scheduler`] - fixed-tick matching of pending orders to idle workers
//! - [`service`] - the [`Dispatcher`] facade wiring everything together

pub mod handoff;
pub mod pool;
pub mod processor;
pub mod queue;
pub mod scheduler;
pub mod service;
pub mod worker;

pub use handoff::{HandoffDesk, HandoffPort, OrderReceiver};
pub use pool::{PoolManager, PoolStatus, ScaleOutcome};
pub use processor::{OrderProcessor, SimulatedCook};
pub use queue::{DispatchQueue, QueueSnapshot, QueueStats};
pub use scheduler::{Scheduler, TickReport};
pub use service::{Dispatcher, DispatcherStatus};
pub use worker::{Worker, WorkerId, WorkerStatus};
