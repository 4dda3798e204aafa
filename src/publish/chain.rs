use crate::counter::BlockCounter;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use std::fmt::Debug;

/// Identifier of a group member as known to the chain.
pub type MemberIndex = u32;

/// Publication event observed on chain for one logical request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedResult<R> {
    pub result: R,
    pub submitter: MemberIndex,
    pub block_number: u64,
}

/// Every publication for the request, by any member, in chain order.
pub type PublicationStream<R> = BoxStream<'static, PublishedResult<R>>;

/// Chain view of a single result-publication request.
///
/// Implementations are scoped to one logical request (one DKG execution, one
/// signing request); the publisher never passes a request id around.
pub trait ResultChain: Send + Sync {
    type Result: Clone + PartialEq + Debug + Send + Sync + 'static;

    /// Block counter of the chain connection.
    fn block_counter(&self) -> anyhow::Result<BlockCounter>;

    /// Subscribes to publications of any result for the request.
    fn on_result_published(&self) -> anyhow::Result<PublicationStream<Self::Result>>;

    /// Returns the publication of `result` if it is already on chain.
    fn is_result_published<'a>(
        &'a self,
        result: &'a Self::Result,
    ) -> BoxFuture<'a, anyhow::Result<Option<PublishedResult<Self::Result>>>>;

    /// Submits `result` on behalf of `member`. The returned publication, or the
    /// chain's rejection, is final.
    fn submit_result<'a>(
        &'a self,
        member: MemberIndex,
        result: &'a Self::Result,
    ) -> BoxFuture<'a, anyhow::Result<PublishedResult<Self::Result>>>;
}
