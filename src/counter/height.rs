//! Monotonic block height with one-shot height waiters and best-effort
//! height watchers.

use crate::runtime::telemetry::Telemetry;
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;

/// Default buffer of every [`BlockCounter::watch_blocks`] receiver.
pub const DEFAULT_WATCHER_CAPACITY: usize = 16;

const HEIGHT_FEED_CAPACITY: usize = 256;

/// Error surfaced when the counter no longer advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BlockCounterError {
    #[error("block counter is closed")]
    Closed,
}

struct CounterState {
    height: u64,
    closed: bool,
    waiters: BTreeMap<u64, Vec<oneshot::Sender<u64>>>,
}

struct CounterInner {
    state: Mutex<CounterState>,
    feed: broadcast::Sender<u64>,
    closed: CancellationToken,
    watcher_capacity: usize,
    telemetry: Arc<Telemetry>,
}

/// Shared view of the chain height. Cloning is cheap; every clone observes the
/// same height and waiter registry.
///
/// The height only moves forward, driven either by a
/// [`BlockTicker`](super::ticker::BlockTicker), one block per tick, or a
/// [`ChainFollower`](super::follower::ChainFollower), which jumps straight to
/// each height the chain reports.
#[derive(Clone)]
pub struct BlockCounter {
    inner: Arc<CounterInner>,
}

impl std::fmt::Debug for BlockCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("BlockCounter")
            .field("height", &state.height)
            .field("closed", &state.closed)
            .field("pending_heights", &state.waiters.len())
            .finish()
    }
}

impl BlockCounter {
    pub fn new(initial_height: u64) -> Self {
        Self::with_telemetry(
            initial_height,
            DEFAULT_WATCHER_CAPACITY,
            Arc::new(Telemetry::default()),
        )
    }

    pub fn with_telemetry(
        initial_height: u64,
        watcher_capacity: usize,
        telemetry: Arc<Telemetry>,
    ) -> Self {
        let (feed, _) = broadcast::channel(HEIGHT_FEED_CAPACITY);
        Self {
            inner: Arc::new(CounterInner {
                state: Mutex::new(CounterState {
                    height: initial_height,
                    closed: false,
                    waiters: BTreeMap::new(),
                }),
                feed,
                closed: CancellationToken::new(),
                watcher_capacity: watcher_capacity.max(1),
                telemetry,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CounterState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Latest observed block height.
    pub fn current_block(&self) -> u64 {
        self.lock().height
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn telemetry(&self) -> Arc<Telemetry> {
        self.inner.telemetry.clone()
    }

    /// Resolves once the height reaches `target`. Returns immediately when the
    /// target has already been reached (including the genesis height `0`).
    pub async fn wait_for_block_height(&self, target: u64) -> Result<u64, BlockCounterError> {
        self.block_height_waiter(target)?.await
    }

    /// Registers a one-shot waiter that resolves with `target` once the height
    /// reaches it.
    pub fn block_height_waiter(&self, target: u64) -> Result<BlockWaiter, BlockCounterError> {
        self.register(|_| target)
    }

    /// Registers a one-shot waiter for `offset` blocks past the current height.
    /// The current height is read under the same lock as the registration, so
    /// an increment cannot slip in between.
    pub fn block_waiter(&self, offset: u64) -> Result<BlockWaiter, BlockCounterError> {
        self.register(|height| height.saturating_add(offset))
    }

    fn register(&self, target_for: impl FnOnce(u64) -> u64) -> Result<BlockWaiter, BlockCounterError> {
        let (tx, receiver) = oneshot::channel();
        let mut state = self.lock();
        if state.closed {
            return Err(BlockCounterError::Closed);
        }

        let target = target_for(state.height);
        if target <= state.height {
            drop(state);
            let _ = tx.send(target);
            self.inner.telemetry.record_waiters_fired(1);
        } else {
            state.waiters.entry(target).or_default().push(tx);
        }

        Ok(BlockWaiter { target, receiver })
    }

    /// Streams every height observed after this call until `cancellation` is
    /// triggered or the counter closes, at which point the receiver yields
    /// `None`.
    ///
    /// Delivery is best-effort: a consumer that falls more than the configured
    /// capacity behind misses heights; the counter itself never waits on it.
    /// Must be called from within a Tokio runtime.
    pub fn watch_blocks(&self, cancellation: CancellationToken) -> mpsc::Receiver<u64> {
        let (tx, rx) = mpsc::channel(self.inner.watcher_capacity);
        let mut feed = self.inner.feed.subscribe();
        let closed = self.inner.closed.clone();
        let telemetry = self.inner.telemetry.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancellation.cancelled() => break,
                    _ = closed.cancelled() => break,
                    _ = tx.closed() => break,
                    update = feed.recv() => match update {
                        Ok(height) => match tx.try_send(height) {
                            Ok(()) => {}
                            Err(TrySendError::Full(_)) => {
                                telemetry.record_watcher_drops(1);
                                tracing::trace!(height, "block watcher is full; dropping height");
                            }
                            Err(TrySendError::Closed(_)) => break,
                        },
                        Err(RecvError::Lagged(skipped)) => {
                            telemetry.record_watcher_drops(skipped);
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            }
        });

        rx
    }

    /// Advances the height by one block and fires the waiters registered for
    /// it. Returns `None` once the counter is closed.
    pub(crate) fn increment(&self) -> Option<u64> {
        let (height, fired) = {
            let mut state = self.lock();
            if state.closed {
                return None;
            }
            state.height += 1;
            let fired = Self::take_reached(&mut state);
            (state.height, fired)
        };

        self.dispatch(height, 1, fired);
        Some(height)
    }

    /// Jumps to `target` in a single step, firing every waiter at or below it.
    /// Heights at or below the current one are ignored. Returns the number of
    /// blocks advanced.
    pub(crate) fn advance_to(&self, target: u64) -> u64 {
        let (advanced, fired) = {
            let mut state = self.lock();
            if state.closed || target <= state.height {
                return 0;
            }
            let advanced = target - state.height;
            state.height = target;
            (advanced, Self::take_reached(&mut state))
        };

        self.dispatch(target, advanced, fired);
        advanced
    }

    fn take_reached(state: &mut CounterState) -> BTreeMap<u64, Vec<oneshot::Sender<u64>>> {
        match state.height.checked_add(1) {
            Some(next) => {
                let pending = state.waiters.split_off(&next);
                std::mem::replace(&mut state.waiters, pending)
            }
            None => std::mem::take(&mut state.waiters),
        }
    }

    fn dispatch(
        &self,
        height: u64,
        advanced: u64,
        fired: BTreeMap<u64, Vec<oneshot::Sender<u64>>>,
    ) {
        let mut count = 0u64;
        for (target, senders) in fired {
            for sender in senders {
                let _ = sender.send(target);
                count += 1;
            }
        }

        let telemetry = &self.inner.telemetry;
        telemetry.record_blocks_observed(advanced);
        telemetry.record_waiters_fired(count);
        let _ = self.inner.feed.send(height);
    }

    /// Stops the counter: pending waiters resolve with
    /// [`BlockCounterError::Closed`] and watchers are closed.
    pub(crate) fn close(&self) {
        let abandoned = {
            let mut state = self.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            std::mem::take(&mut state.waiters)
        };

        let pending: usize = abandoned.values().map(Vec::len).sum();
        drop(abandoned);
        self.inner.closed.cancel();
        tracing::debug!(
            height = self.current_block(),
            pending_waiters = pending,
            "block counter closed"
        );
    }
}

/// One-shot future resolving with its target height.
#[derive(Debug)]
pub struct BlockWaiter {
    target: u64,
    receiver: oneshot::Receiver<u64>,
}

impl BlockWaiter {
    pub fn target(&self) -> u64 {
        self.target
    }
}

impl Future for BlockWaiter {
    type Output = Result<u64, BlockCounterError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|fired| fired.map_err(|_| BlockCounterError::Closed))
    }
}
