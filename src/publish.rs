//! Result publication: the chain collaborator interface, the
//! eligibility-window publisher and an in-memory chain.

pub mod chain;
pub mod local;
pub mod publisher;

pub use chain::{MemberIndex, PublicationStream, PublishedResult, ResultChain};
pub use local::LocalResultChain;
pub use publisher::{PublishError, Publisher};
