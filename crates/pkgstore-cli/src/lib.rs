//! Command-line front end for pkgstore
//!
//! Loads layered configuration, opens the configured repositories and runs
//! one content operation per invocation.

pub mod config;
pub mod metrics;
pub mod telemetry;
