//! In-memory [`ResultChain`] for simulations and tests.

use super::chain::{MemberIndex, PublicationStream, PublishedResult, ResultChain};
use crate::counter::BlockCounter;
use anyhow::bail;
use futures::future::BoxFuture;
use futures::stream;
use std::fmt::Debug;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

const PUBLICATION_FEED_CAPACITY: usize = 64;

struct LocalChainState<R> {
    submissions: Vec<PublishedResult<R>>,
    submission_failure: Option<String>,
}

/// Accepts each distinct result once, stamps it with the current block height
/// and announces it to every subscriber.
pub struct LocalResultChain<R> {
    counter: BlockCounter,
    state: Mutex<LocalChainState<R>>,
    publications: broadcast::Sender<PublishedResult<R>>,
}

impl<R> LocalResultChain<R>
where
    R: Clone + PartialEq + Debug + Send + Sync + 'static,
{
    pub fn new(counter: BlockCounter) -> Self {
        let (publications, _) = broadcast::channel(PUBLICATION_FEED_CAPACITY);
        Self {
            counter,
            state: Mutex::new(LocalChainState {
                submissions: Vec::new(),
                submission_failure: None,
            }),
            publications,
        }
    }

    fn lock(&self) -> MutexGuard<'_, LocalChainState<R>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Accepted submissions in chain order.
    pub fn submissions(&self) -> Vec<PublishedResult<R>> {
        self.lock().submissions.clone()
    }

    /// Number of open publication subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.publications.receiver_count()
    }

    /// Makes every subsequent submission fail with `reason`, or restores
    /// normal behaviour with `None`.
    pub fn set_submission_failure(&self, reason: Option<&str>) {
        self.lock().submission_failure = reason.map(str::to_owned);
    }
}

impl<R> ResultChain for LocalResultChain<R>
where
    R: Clone + PartialEq + Debug + Send + Sync + 'static,
{
    type Result = R;

    fn block_counter(&self) -> anyhow::Result<BlockCounter> {
        if self.counter.is_closed() {
            bail!("local chain block counter is closed");
        }
        Ok(self.counter.clone())
    }

    fn on_result_published(&self) -> anyhow::Result<PublicationStream<R>> {
        let receiver = self.publications.subscribe();
        let publications = stream::unfold(receiver, |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok(published) => return Some((published, receiver)),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "publication subscriber lagged");
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        });
        Ok(Box::pin(publications))
    }

    fn is_result_published<'a>(
        &'a self,
        result: &'a R,
    ) -> BoxFuture<'a, anyhow::Result<Option<PublishedResult<R>>>> {
        Box::pin(async move {
            Ok(self
                .lock()
                .submissions
                .iter()
                .find(|published| &published.result == result)
                .cloned())
        })
    }

    fn submit_result<'a>(
        &'a self,
        member: MemberIndex,
        result: &'a R,
    ) -> BoxFuture<'a, anyhow::Result<PublishedResult<R>>> {
        Box::pin(async move {
            let published = {
                let mut state = self.lock();
                if let Some(reason) = &state.submission_failure {
                    bail!("submission rejected: {reason}");
                }
                if let Some(existing) = state
                    .submissions
                    .iter()
                    .find(|published| &published.result == result)
                {
                    bail!(
                        "result already submitted by member {} at block {}",
                        existing.submitter,
                        existing.block_number
                    );
                }

                let published = PublishedResult {
                    result: result.clone(),
                    submitter: member,
                    block_number: self.counter.current_block(),
                };
                state.submissions.push(published.clone());
                published
            };

            tracing::debug!(
                submitter = member,
                block_number = published.block_number,
                "local chain accepted result"
            );
            let _ = self.publications.send(published.clone());
            Ok(published)
        })
    }
}
