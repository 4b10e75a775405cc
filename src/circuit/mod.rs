//! Circuit breaker subsystem.
//!
//! # Data Flow
//! ```text
//! Selector scan:
//!     → breaker.rs is_available()
//!     → state.rs transition(state, AvailabilityCheck, now)
//!     → may swap Open → HalfOpen (the only timer check)
//!
//! Outcome report:
//!     → breaker.rs on_success() / on_error()
//!     → state.rs transition(state, Success | Error, now)
//!     → swap committed, transition logged and counted
//! ```
//!
//! # Design Decisions
//! - Per-endpoint breaker, local to the process
//! - Purely reactive to traffic outcomes; no background probing
//! - Lock-free reads on the hot availability path
//! - Time injected through `clock.rs` so boundaries are testable

pub mod breaker;
pub mod clock;
pub mod state;

pub use breaker::{Circuit, CircuitSnapshot};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use state::{transition, CircuitEvent, CircuitState, StateKind, Step};
