//! Chain-backed block source: follows a live height subscription and keeps
//! the counter monotonic across reconnects.

use super::backoff::{
    next_backoff, retry_until_cancelled, sleep_with_cancellation, ResubscribeBackoff,
};
use super::height::BlockCounter;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Stream of latest-height notifications. `Err` items are malformed updates;
/// the end of the stream means the subscription was lost.
pub type HeightStream = BoxStream<'static, anyhow::Result<u64>>;

/// A chain node connection able to push the latest block height.
pub trait BlockHeightSource: Send + Sync + 'static {
    fn subscribe(&self) -> BoxFuture<'_, anyhow::Result<HeightStream>>;
}

pub struct ChainFollower;

impl ChainFollower {
    /// Spawns the follow loop. Subscription failures and losses are retried
    /// with exponential backoff until `shutdown` fires; they never reach
    /// waiters.
    pub fn spawn<S: BlockHeightSource>(
        counter: BlockCounter,
        source: Arc<S>,
        initial_backoff: Duration,
        max_backoff: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let telemetry = counter.telemetry();
            // Grows while subscriptions end before delivering any height.
            let mut loss_backoff = initial_backoff;

            'follow: loop {
                let backoff = ResubscribeBackoff::new(loss_backoff, max_backoff, &shutdown);
                let subscribed = retry_until_cancelled(
                    backoff,
                    |_| source.subscribe(),
                    |attempt, delay, err| {
                        telemetry.record_resubscription();
                        tracing::warn!(
                            attempt,
                            backoff_ms = delay.as_millis().min(u128::from(u64::MAX)) as u64,
                            error = %err,
                            "block height subscription failed; retrying"
                        );
                    },
                )
                .await;

                let Some(mut heights) = subscribed else {
                    break;
                };
                tracing::info!(
                    height = counter.current_block(),
                    "subscribed to chain block heights"
                );

                let mut delivered = false;
                loop {
                    tokio::select! {
                        _ = shutdown.cancelled() => break 'follow,
                        update = heights.next() => match update {
                            Some(Ok(height)) => {
                                delivered = true;
                                Self::follow(&counter, height);
                            }
                            Some(Err(err)) => {
                                telemetry.record_malformed_height();
                                tracing::warn!(error = %err, "dropping malformed block height update");
                            }
                            None => {
                                telemetry.record_resubscription();
                                tracing::warn!(
                                    height = counter.current_block(),
                                    "block height subscription lost; resubscribing"
                                );
                                break;
                            }
                        }
                    }
                }

                if delivered {
                    loss_backoff = initial_backoff;
                }
                let delay = loss_backoff;
                loss_backoff = next_backoff(loss_backoff, max_backoff);

                if counter.is_closed() || !sleep_with_cancellation(delay, &shutdown).await {
                    break;
                }
            }

            tracing::info!(
                height = counter.current_block(),
                "chain block follower stopped"
            );
        })
    }

    fn follow(counter: &BlockCounter, height: u64) {
        let current = counter.current_block();
        if height <= current {
            tracing::trace!(height, current, "ignoring non-advancing block height");
            return;
        }

        let advanced = counter.advance_to(height);
        if advanced > 1 {
            tracing::debug!(from = current, to = height, "caught up on skipped block heights");
        }
    }
}
