//! Self-contained block source: one block per fixed period.

use super::height::BlockCounter;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

pub struct BlockTicker;

impl BlockTicker {
    /// Spawns the task that mines one local block every `tick_interval`. The
    /// first block lands one full interval after the call.
    pub fn spawn(
        counter: BlockCounter,
        tick_interval: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + tick_interval, tick_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        break;
                    }
                    _ = ticker.tick() => {
                        match counter.increment() {
                            Some(height) => tracing::trace!(height, "local block mined"),
                            None => break,
                        }
                    }
                }
            }

            tracing::info!(
                height = counter.current_block(),
                "local block ticker stopped"
            );
        })
    }
}
