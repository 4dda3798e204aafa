use crate::counter::height::BlockCounter;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio::{select, time};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Default interval used by the metrics reporter task.
pub const DEFAULT_METRICS_INTERVAL: Duration = Duration::from_secs(5);

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// Installs a basic tracing subscriber (if one is not already active).
///
/// The subscriber honours `RUST_LOG` if it is present, otherwise it falls back to `info`.
/// Calling this function multiple times is harmless.
pub fn init_tracing() {
    if TRACING_INIT.get().is_some() {
        return;
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .try_init();

    let _ = TRACING_INIT.set(());
}

/// Rolling counters for block observation and result publication.
#[derive(Default, Debug)]
pub struct Telemetry {
    blocks_observed: AtomicU64,
    waiters_fired: AtomicU64,
    watcher_drops: AtomicU64,
    resubscriptions: AtomicU64,
    malformed_heights: AtomicU64,
    submissions: AtomicU64,
    publications_observed: AtomicU64,
}

impl Telemetry {
    pub fn record_blocks_observed(&self, count: u64) {
        self.blocks_observed.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_waiters_fired(&self, count: u64) {
        if count == 0 {
            return;
        }
        self.waiters_fired.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_watcher_drops(&self, count: u64) {
        self.watcher_drops.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_resubscription(&self) {
        self.resubscriptions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed_height(&self) {
        self.malformed_heights.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_submission(&self) {
        self.submissions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_publication_observed(&self) {
        self.publications_observed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            blocks_observed: self.blocks_observed.load(Ordering::Relaxed),
            waiters_fired: self.waiters_fired.load(Ordering::Relaxed),
            watcher_drops: self.watcher_drops.load(Ordering::Relaxed),
            resubscriptions: self.resubscriptions.load(Ordering::Relaxed),
            malformed_heights: self.malformed_heights.load(Ordering::Relaxed),
            submissions: self.submissions.load(Ordering::Relaxed),
            publications_observed: self.publications_observed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct TelemetrySnapshot {
    pub blocks_observed: u64,
    pub waiters_fired: u64,
    pub watcher_drops: u64,
    pub resubscriptions: u64,
    pub malformed_heights: u64,
    pub submissions: u64,
    pub publications_observed: u64,
}

/// Spawns a background task that periodically logs the height, block rate,
/// waiter activity and publication counters.
pub fn spawn_metrics_reporter(
    telemetry: Arc<Telemetry>,
    counter: BlockCounter,
    shutdown: CancellationToken,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut last_snapshot = telemetry.snapshot();
        let mut last_tick = time::Instant::now();

        loop {
            select! {
                _ = shutdown.cancelled() => {
                    tracing::info!(target: "blockcoord::metrics", "metrics reporter shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    let current_snapshot = telemetry.snapshot();
                    let blocks_delta = current_snapshot
                        .blocks_observed
                        .saturating_sub(last_snapshot.blocks_observed);
                    let elapsed = last_tick.elapsed().as_secs_f64();
                    let block_rate = if elapsed <= f64::EPSILON {
                        0.0
                    } else {
                        blocks_delta as f64 / elapsed
                    };

                    tracing::info!(
                        target: "blockcoord::metrics",
                        height = counter.current_block(),
                        block_rate = format!("{block_rate:.2}"),
                        waiters_fired = current_snapshot.waiters_fired,
                        watcher_drops = current_snapshot.watcher_drops,
                        resubscriptions = current_snapshot.resubscriptions,
                        malformed_heights = current_snapshot.malformed_heights,
                        submissions = current_snapshot.submissions,
                        publications_observed = current_snapshot.publications_observed,
                        "coordination metrics snapshot"
                    );

                    last_snapshot = current_snapshot;
                    last_tick = time::Instant::now();
                }
            }
        }
    })
}
