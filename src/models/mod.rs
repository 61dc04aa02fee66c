pub mod order;

// Re-export core models for easy access
pub use order::{Order, OrderId};
