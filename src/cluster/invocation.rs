//! Per-request retry state.
//!
//! # Lifecycle
//! ```text
//! Selecting ──select──▶ Dispatched ──success──▶ Succeeded
//!                          │  ▲
//!                   failure│  │retry (new address)
//!                          ▼  │
//!                     FailedRetrying ──no target / budget spent──▶ FailedTerminal
//! ```
//! Contexts in `Succeeded` or `FailedTerminal` are removed from the tracking map.

use std::fmt;

use serde::Serialize;
use uuid::Uuid;

/// Identity of one logical request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RequestKey(pub Uuid);

impl RequestKey {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestKey {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for RequestKey {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Where an invocation is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InvocationPhase {
    Selecting,
    Dispatched,
    Succeeded,
    FailedRetrying,
    FailedTerminal,
}

impl InvocationPhase {
    pub fn is_final(&self) -> bool {
        matches!(self, InvocationPhase::Succeeded | InvocationPhase::FailedTerminal)
    }
}

/// Retry state for one in-flight logical request.
#[derive(Debug, Clone)]
pub struct InvocationContext<P> {
    key: RequestKey,
    phase: InvocationPhase,
    selected_address: Option<String>,
    attempts: u32,
    parameters: P,
}

impl<P> InvocationContext<P> {
    pub fn new(key: RequestKey, parameters: P) -> Self {
        Self {
            key,
            phase: InvocationPhase::Selecting,
            selected_address: None,
            attempts: 0,
            parameters,
        }
    }

    pub fn key(&self) -> RequestKey {
        self.key
    }

    pub fn phase(&self) -> InvocationPhase {
        self.phase
    }

    pub fn selected_address(&self) -> Option<&str> {
        self.selected_address.as_deref()
    }

    /// Dispatches handed out so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn parameters(&self) -> &P {
        &self.parameters
    }

    pub(crate) fn dispatch_to(&mut self, address: &str) {
        self.selected_address = Some(address.to_string());
        self.attempts = self.attempts.saturating_add(1);
        self.phase = InvocationPhase::Dispatched;
    }

    pub(crate) fn set_phase(&mut self, phase: InvocationPhase) {
        self.phase = phase;
    }
}
