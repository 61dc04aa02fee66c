//! # Kitchen Dispatch Demo
//!
//! Loads configuration, starts a dispatcher, submits a batch of orders, scales
//! the worker pool and prints JSON snapshots until every order is complete.
//!
//! Configuration follows the library's layering: `config/dispatch.toml`,
//! `config/dispatch.<env>.toml` and `DISPATCH__SECTION__KEY` variables.

use anyhow::Context;
use std::time::Duration;
use tracing::{info, warn};

use kitchen_dispatch::config::ConfigManager;
use kitchen_dispatch::logging::init_structured_logging;
use kitchen_dispatch::Dispatcher;

const DEMO_ORDERS: &[(bool, &str)] = &[
    (false, "Classic Burger"),
    (false, "Fries"),
    (true, "Wagyu Steak"),
    (false, "Caesar Salad"),
    (true, "Lobster Roll"),
    (false, "Milkshake"),
];

const DEMO_WORKERS: usize = 2;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let manager = ConfigManager::load().context("failed to load dispatch configuration")?;
    let config = manager.config().clone();
    init_structured_logging(manager.environment(), &config.logging);

    info!(
        environment = manager.environment(),
        config_directory = %manager.config_directory().display(),
        "Starting kitchen dispatch demo"
    );

    let dispatcher = Dispatcher::new(config).context("failed to build dispatcher")?;
    dispatcher.start()?;

    for (is_vip, content) in DEMO_ORDERS {
        dispatcher.submit_order(*is_vip, *content);
    }
    for _ in dispatcher.worker_count()..DEMO_WORKERS {
        dispatcher.set_worker_count(1)?;
    }

    let poll_interval = dispatcher.config().scheduler.tick_interval();
    let interrupted = tokio::select! {
        _ = wait_until_drained(&dispatcher, poll_interval) => false,
        _ = tokio::signal::ctrl_c() => true,
    };
    if interrupted {
        warn!("Interrupted, shutting down with orders still pending");
    }

    dispatcher.shutdown().await?;
    println!("{}", serde_json::to_string_pretty(&dispatcher.snapshot())?);
    Ok(())
}

async fn wait_until_drained(dispatcher: &Dispatcher, poll_interval: Duration) {
    loop {
        let status = dispatcher.status();
        match serde_json::to_string(&status) {
            Ok(json) => println!("{json}"),
            Err(e) => warn!(error = %e, "Failed to serialize status"),
        }

        if status.orders.pending == 0 && status.orders.in_flight == 0 {
            return;
        }
        tokio::time::sleep(poll_interval).await;
    }
}
