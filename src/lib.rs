//! Client-side failover with per-endpoint circuit breakers.
//!
//! An ordered list of equivalent endpoints is tried first-available; each endpoint carries
//! a closed / open / half-open breaker that decides whether it may receive traffic.

pub mod circuit;
pub mod cluster;
pub mod config;
pub mod observability;
pub mod transport;

pub use circuit::{Circuit, CircuitState};
pub use cluster::{EndpointRegistry, FailoverError, FailoverSelector, RequestKey, RetryPlan};
pub use config::FailoverConfig;
pub use transport::{Dispatcher, FailoverClient};
