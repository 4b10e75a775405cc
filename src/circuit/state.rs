//! Circuit state machine.
//!
//! # States
//! - Closed: traffic flows, consecutive failures are counted
//! - Open: endpoint assumed down, traffic blocked until the reset timeout elapses
//! - Half-Open: cooldown elapsed, the next outcome decides
//!
//! # State Transitions
//! ```text
//! Closed(n) --error--> Closed(n+1)     if n+1 < threshold
//! Closed(n) --error--> Open(now)       otherwise
//! Closed(n) --success--> Closed(0)
//! Open(t)  --check--> Half-Open        if now - t > reset_timeout (reports available)
//! Open     --success/error--> Open     ignored
//! Half-Open --success--> Closed(0)
//! Half-Open --error--> Open(now)
//! ```
//!
//! All policy lives in [`transition`]; it is pure so concurrent callers can
//! recompute it freely inside a compare-and-swap loop.

use std::fmt;

use serde::Serialize;

use crate::config::BreakerConfig;

/// Breaker state for one endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed { failures: u32 },
    Open { tripped_at_ms: u64 },
    HalfOpen,
}

impl CircuitState {
    /// The initial state of every circuit.
    pub const fn closed() -> Self {
        CircuitState::Closed { failures: 0 }
    }

    pub fn kind(&self) -> StateKind {
        match self {
            CircuitState::Closed { .. } => StateKind::Closed,
            CircuitState::Open { .. } => StateKind::Open,
            CircuitState::HalfOpen => StateKind::HalfOpen,
        }
    }

    /// Whether the state lets traffic through without consulting the clock.
    pub fn admits_traffic(&self) -> bool {
        !matches!(self, CircuitState::Open { .. })
    }
}

impl Default for CircuitState {
    fn default() -> Self {
        Self::closed()
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed { failures } => write!(f, "closed(failures={})", failures),
            CircuitState::Open { tripped_at_ms } => write!(f, "open(tripped_at_ms={})", tripped_at_ms),
            CircuitState::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// State name without payload, for logs, metrics and snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StateKind {
    Closed,
    Open,
    HalfOpen,
}

impl StateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StateKind::Closed => "closed",
            StateKind::Open => "open",
            StateKind::HalfOpen => "half_open",
        }
    }

    /// Gauge encoding: 0 closed, 1 half-open, 2 open.
    pub fn gauge_value(&self) -> f64 {
        match self {
            StateKind::Closed => 0.0,
            StateKind::HalfOpen => 1.0,
            StateKind::Open => 2.0,
        }
    }
}

/// Something that happened to a circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitEvent {
    /// A selector asked whether the endpoint may receive traffic.
    AvailabilityCheck,
    /// A dispatch to the endpoint succeeded.
    Success,
    /// A dispatch to the endpoint failed.
    Error,
}

/// Result of applying one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub state: CircuitState,
    /// For availability checks, the answer; otherwise whether `state` admits traffic.
    pub available: bool,
}

impl Step {
    fn stay(state: CircuitState, available: bool) -> Self {
        Self { state, available }
    }
}

/// Compute the next state of a circuit.
pub fn transition(
    state: CircuitState,
    event: CircuitEvent,
    settings: &BreakerConfig,
    now_ms: u64,
) -> Step {
    use CircuitEvent::*;
    use CircuitState::*;

    match (state, event) {
        (Closed { .. }, AvailabilityCheck) | (HalfOpen, AvailabilityCheck) => Step::stay(state, true),

        (Open { tripped_at_ms }, AvailabilityCheck) => {
            let elapsed = now_ms.saturating_sub(tripped_at_ms);
            if elapsed > settings.reset_timeout_ms {
                Step::stay(HalfOpen, true)
            } else {
                Step::stay(state, false)
            }
        }

        (Closed { .. }, Success) | (HalfOpen, Success) => Step::stay(CircuitState::closed(), true),

        (Closed { failures }, Error) => {
            let failures = failures.saturating_add(1);
            if failures < settings.failure_threshold {
                Step::stay(Closed { failures }, true)
            } else {
                Step::stay(Open { tripped_at_ms: now_ms }, false)
            }
        }

        (HalfOpen, Error) => Step::stay(Open { tripped_at_ms: now_ms }, false),

        (Open { .. }, Success) | (Open { .. }, Error) => Step::stay(state, false),
    }
}
