use std::sync::Arc;
use std::time::Duration;

use kitchen_dispatch::dispatch::OrderProcessor;
use kitchen_dispatch::{DispatchConfig, Dispatcher};

/// Configuration with test-sized timings
pub fn fast_config(processing_ms: u64, tick_ms: u64) -> DispatchConfig {
    let mut config = DispatchConfig::default();
    config.worker.processing_duration_ms = processing_ms;
    config.worker.shutdown_timeout_ms = 1_000;
    config.scheduler.tick_interval_ms = tick_ms;
    config
}

/// Build and start a dispatcher with the simulated cook
pub fn started_dispatcher(processing_ms: u64, tick_ms: u64) -> Dispatcher {
    let dispatcher =
        Dispatcher::new(fast_config(processing_ms, tick_ms)).expect("dispatcher builds");
    dispatcher.start().expect("dispatcher starts");
    dispatcher
}

/// Build and start a dispatcher with a custom processor
pub fn started_dispatcher_with(processor: Arc<dyn OrderProcessor>, tick_ms: u64) -> Dispatcher {
    let dispatcher = Dispatcher::with_processor(fast_config(50, tick_ms), processor)
        .expect("dispatcher builds");
    dispatcher.start().expect("dispatcher starts");
    dispatcher
}

/// Poll `condition` every few milliseconds until it holds or `timeout` elapses
pub async fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    tokio::time::timeout(timeout, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .is_ok()
}
