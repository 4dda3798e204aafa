//! Lifecycle of a block counter and the task that drives it.

use super::follower::{BlockHeightSource, ChainFollower};
use super::height::BlockCounter;
use super::ticker::BlockTicker;
use crate::runtime::config::CoordinationConfig;
use crate::runtime::telemetry::{self, Telemetry};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Owns the driver and metrics tasks of one [`BlockCounter`]. Created once
/// per chain connection.
pub struct BlockCounterService {
    counter: BlockCounter,
    telemetry: Arc<Telemetry>,
    shutdown: CancellationToken,
    driver_handle: Option<JoinHandle<()>>,
    metrics_handle: Option<JoinHandle<()>>,
}

impl BlockCounterService {
    /// Starts a self-contained counter that mines one block per
    /// `tick_interval`.
    pub fn local(config: &CoordinationConfig) -> Self {
        let tick_interval = config.tick_interval();
        Self::start(config, |counter, shutdown| {
            BlockTicker::spawn(counter, tick_interval, shutdown)
        })
    }

    /// Starts a counter that follows the heights pushed by `source`.
    pub fn chain<S: BlockHeightSource>(config: &CoordinationConfig, source: Arc<S>) -> Self {
        let initial_backoff = config.resubscribe_initial_backoff();
        let max_backoff = config.resubscribe_max_backoff();
        Self::start(config, |counter, shutdown| {
            ChainFollower::spawn(counter, source, initial_backoff, max_backoff, shutdown)
        })
    }

    fn start<F>(config: &CoordinationConfig, spawn_driver: F) -> Self
    where
        F: FnOnce(BlockCounter, CancellationToken) -> JoinHandle<()>,
    {
        let telemetry = Arc::new(Telemetry::default());
        let counter = BlockCounter::with_telemetry(
            config.initial_height(),
            config.watcher_capacity(),
            telemetry.clone(),
        );
        let shutdown = CancellationToken::new();
        let driver_handle = spawn_driver(counter.clone(), shutdown.child_token());
        let metrics_handle = telemetry::spawn_metrics_reporter(
            telemetry.clone(),
            counter.clone(),
            shutdown.child_token(),
            config.metrics_interval(),
        );

        tracing::info!(
            initial_height = config.initial_height(),
            "block counter service started"
        );

        Self {
            counter,
            telemetry,
            shutdown,
            driver_handle: Some(driver_handle),
            metrics_handle: Some(metrics_handle),
        }
    }

    pub fn counter(&self) -> BlockCounter {
        self.counter.clone()
    }

    pub fn telemetry(&self) -> Arc<Telemetry> {
        self.telemetry.clone()
    }

    /// Stops the driver, waits for the background tasks and closes the
    /// counter so outstanding waiters are released.
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();

        if let Some(handle) = self.driver_handle.take() {
            if let Err(err) = handle.await {
                tracing::warn!(error = %err, "block counter driver task panicked");
            }
        }

        if let Some(handle) = self.metrics_handle.take() {
            if let Err(err) = handle.await {
                tracing::warn!(error = %err, "metrics reporter task panicked");
            }
        }

        self.counter.close();
    }
}

impl Drop for BlockCounterService {
    fn drop(&mut self) {
        self.shutdown.cancel();
        self.counter.close();
    }
}
