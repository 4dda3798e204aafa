#[path = "../support/mod.rs"]
mod support;

mod publish;
mod retry;
