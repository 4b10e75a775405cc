//! Failover error definitions.

use thiserror::Error;

use crate::cluster::invocation::{InvocationPhase, RequestKey};

/// Errors surfaced by the failover selector.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailoverError {
    /// Every circuit in the registry reports unavailable. Terminal; never retried.
    #[error("No available targets")]
    NoAvailableTargets,

    /// The invocation used up its dispatch budget. Terminal.
    #[error("Giving up after {attempts} attempts")]
    AttemptsExhausted { attempts: u32 },

    /// An outcome referenced an address absent from the registry. Non-fatal; the outcome is dropped.
    #[error("Unknown address: {0}")]
    UnknownAddress(String),

    /// No in-flight invocation is tracked under this key.
    #[error("Unknown invocation {0}")]
    UnknownInvocation(RequestKey),

    /// An invocation with this key is already in flight.
    #[error("Invocation {0} already in flight")]
    DuplicateInvocation(RequestKey),

    /// The requested step is not legal from the invocation's current phase.
    #[error("Invocation {key} cannot {action} while {phase:?}")]
    InvalidPhase {
        key: RequestKey,
        phase: InvocationPhase,
        action: &'static str,
    },
}

impl FailoverError {
    /// Whether this error ends the logical request.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FailoverError::NoAvailableTargets | FailoverError::AttemptsExhausted { .. }
        )
    }
}

/// Result type for failover operations.
pub type FailoverResult<T> = Result<T, FailoverError>;
