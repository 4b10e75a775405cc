//! Transport collaborator boundary.
//!
//! # Data Flow
//! ```text
//! FailoverClient::execute(request)
//!     → selector: begin_invocation, select_destination
//!     → Dispatcher::dispatch(address, request)
//!     → success: selector.on_request_success → response
//!     → failure: selector.on_request_failure
//!         → RetryPlan: sleep(delay), dispatch replayed parameters to new address
//!         → terminal: TerminalFailure returned to the caller
//! ```
//!
//! # Design Decisions
//! - The failover core only needs "dispatch to X and tell me if it failed"
//! - Timeouts are the dispatcher's business; a timed-out call is just a failure
//! - `http.rs` is a reference dispatcher over reqwest

use std::future::Future;

pub mod client;
pub mod http;

pub use client::{FailoverClient, TerminalFailure};
pub use http::{DispatchError, HttpDispatcher, HttpRequest, HttpResponse};

/// Sends one request to one endpoint and reports whether it failed.
pub trait Dispatcher: Send + Sync {
    /// Everything needed to replay the call on another endpoint.
    type Request: Clone + Send + Sync + 'static;
    type Response: Send;
    type Error: std::error::Error + Send + Sync + 'static;

    fn dispatch(
        &self,
        address: &str,
        request: &Self::Request,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send;
}
