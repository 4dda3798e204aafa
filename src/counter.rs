//! Block height tracking: the shared counter, its local and chain-backed
//! drivers, and the service that owns them.

pub(crate) mod backoff;
pub mod follower;
pub mod height;
pub mod service;
pub mod ticker;

pub use follower::{BlockHeightSource, ChainFollower, HeightStream};
pub use height::{BlockCounter, BlockCounterError, BlockWaiter};
pub use service::BlockCounterService;
pub use ticker::BlockTicker;
