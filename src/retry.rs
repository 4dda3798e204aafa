//! Deterministic participant selection for retried signing and key
//! generation attempts.
//!
//! Every operator runs the same selection locally with the same inputs and
//! arrives at the same subset, so no coordination round is needed before a
//! retry. Members are given as a list of operator identities where an
//! operator appears once per seat it holds.

mod keygen;
mod seats;
mod seed;
mod shuffle;
mod signing;

pub use keygen::evaluate_retry_participants_for_key_generation;
pub use seats::RetryError;
pub use seed::retry_seed;
pub use signing::evaluate_retry_participants_for_signing;
