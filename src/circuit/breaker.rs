//! Per-endpoint circuit breaker.
//!
//! # Responsibilities
//! - Own the breaker state of a single endpoint address
//! - Apply events through [`transition`] without blocking readers
//! - Log and count every state change
//!
//! # Design Decisions
//! - State is an immutable value behind `ArcSwap`; updates are load / compute / swap
//! - A lost race recomputes from the winner's state, so no transition is dropped
//! - Thresholds are shared with the whole registry, never copied per circuit

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::Serialize;

use crate::circuit::clock::Clock;
use crate::circuit::state::{transition, CircuitEvent, CircuitState, StateKind, Step};
use crate::config::BreakerConfig;
use crate::observability::metrics;

/// Breaker for one endpoint.
pub struct Circuit {
    address: String,
    settings: Arc<BreakerConfig>,
    clock: Arc<dyn Clock>,
    state: ArcSwap<CircuitState>,
}

impl Circuit {
    /// Create a closed circuit.
    pub fn new(address: impl Into<String>, settings: Arc<BreakerConfig>, clock: Arc<dyn Clock>) -> Self {
        Self {
            address: address.into(),
            settings,
            clock,
            state: ArcSwap::from_pointee(CircuitState::closed()),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn settings(&self) -> &BreakerConfig {
        &self.settings
    }

    /// Current state, without side effects.
    pub fn state(&self) -> CircuitState {
        **self.state.load()
    }

    /// Whether the endpoint may receive a request now.
    ///
    /// On an open circuit whose reset timeout has elapsed this moves the
    /// circuit to half-open and answers `true`.
    pub fn is_available(&self) -> bool {
        self.apply(CircuitEvent::AvailabilityCheck).available
    }

    /// Report a successful dispatch.
    pub fn on_success(&self) {
        self.apply(CircuitEvent::Success);
    }

    /// Report a failed dispatch.
    pub fn on_error(&self) {
        self.apply(CircuitEvent::Error);
    }

    /// Apply an event atomically and return the step that was committed.
    pub fn apply(&self, event: CircuitEvent) -> Step {
        let mut current = self.state.load();
        loop {
            let step = transition(**current, event, &self.settings, self.clock.now_millis());
            if step.state == **current {
                return step;
            }

            let previous = self.state.compare_and_swap(&*current, Arc::new(step.state));
            if Arc::ptr_eq(&*previous, &*current) {
                self.record_transition(**current, step.state);
                return step;
            }
            // Lost the race; recompute against the state that won.
            current = previous;
        }
    }

    fn record_transition(&self, from: CircuitState, to: CircuitState) {
        match to.kind() {
            StateKind::Open => {
                tracing::warn!(address = %self.address, from = %from, to = %to, "Tripping breaker")
            }
            StateKind::HalfOpen => {
                tracing::info!(address = %self.address, from = %from, "Breaker reset attempt")
            }
            StateKind::Closed if from.kind() != StateKind::Closed => {
                tracing::info!(address = %self.address, from = %from, "Breaker reset")
            }
            StateKind::Closed => {
                tracing::trace!(address = %self.address, from = %from, to = %to, "Failure count updated")
            }
        }

        if from.kind() != to.kind() {
            metrics::record_circuit_transition(&self.address, to.kind());
        }
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        let state = self.state();
        let (failures, tripped_at_ms) = match state {
            CircuitState::Closed { failures } => (failures, None),
            CircuitState::Open { tripped_at_ms } => (0, Some(tripped_at_ms)),
            CircuitState::HalfOpen => (0, None),
        };
        CircuitSnapshot {
            address: self.address.clone(),
            state: state.kind(),
            failures,
            tripped_at_ms,
            failure_threshold: self.settings.failure_threshold,
            reset_timeout_ms: self.settings.reset_timeout_ms,
        }
    }
}

impl fmt::Debug for Circuit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Circuit")
            .field("address", &self.address)
            .field("state", &self.state())
            .field("failure_threshold", &self.settings.failure_threshold)
            .field("reset_timeout_ms", &self.settings.reset_timeout_ms)
            .finish()
    }
}

impl fmt::Display for Circuit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Circuit [address={}, state={}, failure_threshold={}, reset_timeout_ms={}]",
            self.address,
            self.state(),
            self.settings.failure_threshold,
            self.settings.reset_timeout_ms
        )
    }
}

/// Point-in-time view of a circuit, for status output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CircuitSnapshot {
    pub address: String,
    pub state: StateKind,
    pub failures: u32,
    pub tripped_at_ms: Option<u64>,
    pub failure_threshold: u32,
    pub reset_timeout_ms: u64,
}
