use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use blockcoord::{BlockHeightSource, HeightStream};
use futures::future::BoxFuture;
use futures::{stream, StreamExt};
use tokio::sync::mpsc;

/// Height source driven by the test: every subscription gets its own feed,
/// and the test pushes heights into the latest one or cuts all of them.
#[derive(Default)]
pub struct ChannelHeightSource {
    feeds: Mutex<Vec<mpsc::UnboundedSender<Result<u64>>>>,
    subscriptions: AtomicUsize,
    refuse_next: AtomicUsize,
}

impl ChannelHeightSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn subscriptions(&self) -> usize {
        self.subscriptions.load(Ordering::SeqCst)
    }

    /// Makes the next `count` subscribe attempts fail.
    pub fn refuse_next(&self, count: usize) {
        self.refuse_next.store(count, Ordering::SeqCst);
    }

    pub fn push(&self, height: u64) {
        self.send(Ok(height));
    }

    pub fn push_malformed(&self, reason: &str) {
        self.send(Err(anyhow!("{reason}")));
    }

    /// Ends every open subscription.
    pub fn disconnect(&self) {
        self.feeds.lock().unwrap().clear();
    }

    fn send(&self, item: Result<u64>) {
        if let Some(feed) = self.feeds.lock().unwrap().last() {
            let _ = feed.send(item);
        }
    }
}

impl BlockHeightSource for ChannelHeightSource {
    fn subscribe(&self) -> BoxFuture<'_, Result<HeightStream>> {
        Box::pin(async move {
            let refused = self
                .refuse_next
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                .is_ok();
            if refused {
                return Err(anyhow!("node unavailable"));
            }

            let (tx, rx) = mpsc::unbounded_channel();
            self.feeds.lock().unwrap().push(tx);
            self.subscriptions.fetch_add(1, Ordering::SeqCst);

            let heights = stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|item| (item, rx))
            });
            Ok(heights.boxed())
        })
    }
}
