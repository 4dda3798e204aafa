use super::chain::{MemberIndex, PublishedResult, ResultChain};
use crate::counter::BlockCounterError;
use futures::StreamExt;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("publishing index must be >= 1")]
    InvalidPublishingIndex,
    #[error("could not watch for result publications: {0:#}")]
    Subscription(#[source] anyhow::Error),
    #[error("could not check if the result is already published: {0:#}")]
    PublicationCheck(#[source] anyhow::Error),
    #[error("block counter failure: {0:#}")]
    BlockCounter(#[source] anyhow::Error),
    #[error("block waiter failure: {0}")]
    BlockWaiter(#[from] BlockCounterError),
    #[error(transparent)]
    Submission(anyhow::Error),
}

/// Submits a computed result on chain once this member's eligibility window
/// opens, unless an earlier member publishes the same result first.
///
/// Member `i` (1-based publishing index) becomes eligible
/// `(i - 1) * block_step` blocks after publishing starts. Every member that
/// sees the publication before its window opens returns it without
/// submitting.
pub struct Publisher<C: ResultChain> {
    chain: Arc<C>,
    member: MemberIndex,
    publishing_index: usize,
    block_step: u64,
}

impl<C: ResultChain> Publisher<C> {
    pub fn new(
        chain: Arc<C>,
        member: MemberIndex,
        publishing_index: usize,
        block_step: u64,
    ) -> Result<Self, PublishError> {
        if publishing_index < 1 {
            return Err(PublishError::InvalidPublishingIndex);
        }

        Ok(Self {
            chain,
            member,
            publishing_index,
            block_step,
        })
    }

    pub fn publishing_index(&self) -> usize {
        self.publishing_index
    }

    /// Blocks between the start of publishing and this member's window.
    pub fn window_offset(&self) -> u64 {
        (self.publishing_index as u64 - 1).saturating_mul(self.block_step)
    }

    /// Runs the eligibility-window race for `result` and returns the accepted
    /// publication. There is no internal timeout; wrap the call in
    /// `tokio::time::timeout` if the caller needs one.
    pub async fn publish_result(
        &self,
        result: C::Result,
    ) -> Result<PublishedResult<C::Result>, PublishError> {
        // Subscribe before anything else so a publication landing while the
        // window is computed is not missed.
        let mut publications = self
            .chain
            .on_result_published()
            .map_err(PublishError::Subscription)?;

        if let Some(published) = self
            .chain
            .is_result_published(&result)
            .await
            .map_err(PublishError::PublicationCheck)?
        {
            tracing::debug!(
                member = self.member,
                block_number = published.block_number,
                "result already published; skipping submission"
            );
            return Ok(published);
        }

        let counter = self
            .chain
            .block_counter()
            .map_err(PublishError::BlockCounter)?;
        let mut window = counter.block_waiter(self.window_offset())?;
        let mut publications_open = true;

        tracing::debug!(
            member = self.member,
            publishing_index = self.publishing_index,
            eligible_at = window.target(),
            "waiting for publication window"
        );

        loop {
            tokio::select! {
                biased;

                published = publications.next(), if publications_open => match published {
                    Some(published) if published.result == result => {
                        counter.telemetry().record_publication_observed();
                        tracing::info!(
                            member = self.member,
                            submitter = published.submitter,
                            block_number = published.block_number,
                            "result published by another member"
                        );
                        return Ok(published);
                    }
                    Some(published) => {
                        counter.telemetry().record_publication_observed();
                        tracing::warn!(
                            member = self.member,
                            submitter = published.submitter,
                            block_number = published.block_number,
                            "observed publication of a different result; still waiting"
                        );
                    }
                    None => {
                        tracing::warn!(
                            member = self.member,
                            "publication stream ended; waiting for own window"
                        );
                        publications_open = false;
                    }
                },
                opened = &mut window => {
                    let height = opened?;
                    tracing::info!(
                        member = self.member,
                        publishing_index = self.publishing_index,
                        height,
                        "publication window open; submitting result"
                    );
                    counter.telemetry().record_submission();
                    return self
                        .chain
                        .submit_result(self.member, &result)
                        .await
                        .map_err(PublishError::Submission);
                }
            }
        }
    }
}
