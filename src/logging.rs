//! # Structured Logging Module
//!
//! Environment-aware structured logging for the dispatcher's concurrent
//! workers and scheduling loop.

use chrono::Utc;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::LoggingConfig;
use crate::models::Order;

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration
///
/// `RUST_LOG` takes precedence, then `logging.level`, then the default level
/// for the detected environment. Safe to call more than once.
pub fn init_structured_logging(environment: &str, logging: &LoggingConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let level = logging
            .level
            .clone()
            .unwrap_or_else(|| get_log_level(environment).to_string());
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

        let console_layer = if logging.json {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .json()
                .with_filter(filter)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(true)
                .with_filter(filter)
                .boxed()
        };

        // Use try_init to avoid panic if global subscriber already set
        if tracing_subscriber::registry()
            .with(console_layer)
            .try_init()
            .is_err()
        {
            tracing::debug!(
                "Global tracing subscriber already initialized - continuing with existing subscriber"
            );
        }

        tracing::info!(
            pid = std::process::id(),
            environment = %environment,
            level = %level,
            json = logging.json,
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        "test" => "warn",
        _ => "debug",
    }
}

/// Log structured data for an order state transition
pub fn log_order_operation(operation: &str, order: &Order, details: Option<&str>) {
    tracing::info!(
        operation = %operation,
        order_id = order.id.value(),
        is_vip = order.is_vip,
        state = %order.state(),
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "📋 ORDER_OPERATION"
    );
}
