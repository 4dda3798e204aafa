//! Runtime glue: validated configuration, tracing setup and telemetry.

pub mod config;
pub mod telemetry;
