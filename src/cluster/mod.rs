//! Endpoint selection and failover subsystem.
//!
//! # Data Flow
//! ```text
//! Logical request starts
//!     → selector.rs begin_invocation (context tracked by key)
//!     → selector.rs select_destination
//!         → registry.rs first_available (scan in priority order)
//!     → collaborator dispatches
//!     → selector.rs notify_outcome
//!         → circuit for the selected address updated
//!     → on failure: request_retry → RetryPlan (new address, delay) or terminal error
//! ```
//!
//! # Design Decisions
//! - First available in configured order; no round-robin, no weights
//! - A fresh request always rescans from the top, so recovered nodes win again
//! - Terminal failures are returned, never swallowed

pub mod invocation;
pub mod registry;
pub mod selector;
pub mod types;

pub use invocation::{InvocationContext, InvocationPhase, RequestKey};
pub use registry::EndpointRegistry;
pub use selector::{FailoverSelector, RetryPlan};
pub use types::{FailoverError, FailoverResult};
