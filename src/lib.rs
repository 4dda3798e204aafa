pub mod counter;
pub mod publish;
pub mod retry;
pub mod runtime;

pub use counter::{
    BlockCounter, BlockCounterError, BlockCounterService, BlockHeightSource, BlockTicker,
    BlockWaiter, ChainFollower, HeightStream,
};
pub use publish::{
    LocalResultChain, MemberIndex, PublicationStream, PublishError, PublishedResult, Publisher,
    ResultChain,
};
pub use retry::{
    evaluate_retry_participants_for_key_generation, evaluate_retry_participants_for_signing,
    retry_seed, RetryError,
};
pub use runtime::config::{
    CoordinationConfig, CoordinationConfigBuilder, CoordinationConfigParams,
};
pub use runtime::telemetry::{init_tracing, Telemetry, TelemetrySnapshot};
