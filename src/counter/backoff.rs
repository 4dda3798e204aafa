use std::future::Future;
use std::time::Duration;
use tokio::task::yield_now;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// Exponential backoff used when (re)subscribing to a block height source.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ResubscribeBackoff<'a> {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub cancellation: &'a CancellationToken,
}

impl<'a> ResubscribeBackoff<'a> {
    pub(crate) fn new(
        initial_delay: Duration,
        max_delay: Duration,
        cancellation: &'a CancellationToken,
    ) -> Self {
        Self {
            initial_delay,
            max_delay: max_delay.max(initial_delay),
            cancellation,
        }
    }
}

/// Runs `operation` until it succeeds, sleeping with doubling delays between
/// failures. Returns `None` once the cancellation token fires.
pub(crate) async fn retry_until_cancelled<T, F, Fut, L>(
    config: ResubscribeBackoff<'_>,
    mut operation: F,
    mut on_retry: L,
) -> Option<T>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
    L: FnMut(usize, Duration, &anyhow::Error),
{
    let mut attempt = 0;
    let mut backoff = config.initial_delay;

    loop {
        attempt += 1;
        if config.cancellation.is_cancelled() {
            return None;
        }

        let outcome = tokio::select! {
            _ = config.cancellation.cancelled() => return None,
            outcome = operation(attempt) => outcome,
        };

        match outcome {
            Ok(value) => return Some(value),
            Err(err) => {
                on_retry(attempt, backoff, &err);
                if !sleep_with_cancellation(backoff, config.cancellation).await {
                    return None;
                }
                backoff = next_backoff(backoff, config.max_delay);
            }
        }
    }
}

/// Sleeps for `delay` unless cancelled first. Returns `false` on cancellation.
pub(crate) async fn sleep_with_cancellation(
    delay: Duration,
    cancellation: &CancellationToken,
) -> bool {
    if delay.is_zero() {
        yield_now().await;
        return !cancellation.is_cancelled();
    }

    tokio::select! {
        _ = cancellation.cancelled() => false,
        _ = sleep(delay) => true,
    }
}

pub(crate) fn next_backoff(current: Duration, max_backoff: Duration) -> Duration {
    if current.is_zero() {
        return max_backoff.min(Duration::from_millis(1));
    }

    current.saturating_mul(2).min(max_backoff)
}
