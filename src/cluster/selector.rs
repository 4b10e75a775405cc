//! Failover target selection.
//!
//! # Responsibilities
//! - Pick the first available endpoint in priority order
//! - Track one invocation context per in-flight logical request
//! - Feed dispatch outcomes back into the matching circuit
//! - Decide between retrying on the next available endpoint and terminal failure
//!
//! # Design Decisions
//! - Every scan starts from the top of the registry (fail over, then fail back)
//! - The selector never sleeps; the retry delay is handed to the caller in [`RetryPlan`]
//! - Contexts live in a `DashMap`, so start/finish for one key are atomic with
//!   respect to lookups from the collaborator's cancellation path

use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::cluster::invocation::{InvocationContext, InvocationPhase, RequestKey};
use crate::cluster::registry::EndpointRegistry;
use crate::cluster::types::{FailoverError, FailoverResult};
use crate::config::FailoverConfig;
use crate::observability::metrics;

/// Instruction to replay a failed request against another endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPlan<P> {
    pub address: String,
    /// Pause the collaborator must observe before dispatching.
    pub delay: Duration,
    pub parameters: P,
    /// 1-based number of the dispatch this plan authorises.
    pub attempt: u32,
}

/// Routes requests across the registry and drives per-request retries.
#[derive(Debug)]
pub struct FailoverSelector<P> {
    registry: Arc<EndpointRegistry>,
    in_progress: DashMap<RequestKey, InvocationContext<P>>,
    delay_between_retries: Duration,
    max_attempts: u32,
}

impl<P: Clone> FailoverSelector<P> {
    /// Create a selector with no retry delay and the default attempt budget.
    pub fn new(registry: Arc<EndpointRegistry>) -> Self {
        let max_attempts = default_max_attempts(&registry);
        Self {
            registry,
            in_progress: DashMap::new(),
            delay_between_retries: Duration::ZERO,
            max_attempts,
        }
    }

    /// Build the registry and selector from loaded configuration.
    pub fn from_config(config: &FailoverConfig) -> Self {
        let registry = Arc::new(EndpointRegistry::from_config(&config.cluster, &config.breaker));
        let mut selector = Self::new(registry).with_delay_between_retries(config.cluster.delay_between_retries());
        if let Some(max_attempts) = config.cluster.max_attempts {
            selector = selector.with_max_attempts(max_attempts);
        }
        tracing::info!(
            delay_between_retries_ms = config.cluster.delay_between_retries_ms,
            max_attempts = selector.max_attempts,
            "Failover selector ready"
        );
        selector
    }

    pub fn with_delay_between_retries(mut self, delay: Duration) -> Self {
        self.delay_between_retries = delay;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn registry(&self) -> &Arc<EndpointRegistry> {
        &self.registry
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Number of logical requests currently tracked.
    pub fn in_flight(&self) -> usize {
        self.in_progress.len()
    }

    /// Copy of the context tracked under `key`, if any.
    pub fn invocation(&self, key: RequestKey) -> Option<InvocationContext<P>> {
        self.in_progress.get(&key).map(|ctx| ctx.value().clone())
    }

    /// Start tracking a logical request and the parameters needed to replay it.
    pub fn begin_invocation(&self, key: RequestKey, parameters: P) -> FailoverResult<()> {
        match self.in_progress.entry(key) {
            Entry::Occupied(_) => Err(FailoverError::DuplicateInvocation(key)),
            Entry::Vacant(slot) => {
                slot.insert(InvocationContext::new(key, parameters));
                Ok(())
            }
        }
    }

    /// Pick the destination for a request.
    ///
    /// For a tracked key in `Selecting`, the address is recorded and the context moves to
    /// `Dispatched`; if nothing is available the context is dropped. Untracked keys get a
    /// plain scan.
    pub fn select_destination(&self, key: RequestKey) -> FailoverResult<String> {
        match self.in_progress.entry(key) {
            Entry::Vacant(_) => self.scan(),
            Entry::Occupied(mut slot) => {
                let phase = slot.get().phase();
                if phase != InvocationPhase::Selecting {
                    return Err(FailoverError::InvalidPhase {
                        key,
                        phase,
                        action: "select a destination",
                    });
                }
                match self.scan() {
                    Ok(address) => {
                        slot.get_mut().dispatch_to(&address);
                        Ok(address)
                    }
                    Err(e) => {
                        slot.remove();
                        metrics::record_terminal_failure("no_available_targets");
                        Err(e)
                    }
                }
            }
        }
    }

    fn scan(&self) -> FailoverResult<String> {
        if self.registry.is_empty() {
            tracing::error!("No addresses configured");
            return Err(FailoverError::NoAvailableTargets);
        }
        match self.registry.first_available() {
            Some(circuit) => {
                tracing::debug!(address = %circuit.address(), "Selecting target");
                Ok(circuit.address().to_string())
            }
            None => {
                tracing::warn!("No available targets");
                Err(FailoverError::NoAvailableTargets)
            }
        }
    }

    /// Route an outcome to the circuit for `address`.
    ///
    /// Unknown addresses are reported as [`FailoverError::UnknownAddress`] and otherwise ignored.
    pub fn record_outcome(&self, key: RequestKey, address: &str, success: bool) -> FailoverResult<()> {
        let Some(circuit) = self.registry.lookup(address) else {
            tracing::warn!(request = %key, address = %address, success, "Outcome for unknown address dropped");
            metrics::record_unknown_address();
            return Err(FailoverError::UnknownAddress(address.to_string()));
        };

        if success {
            circuit.on_success();
        } else {
            circuit.on_error();
        }
        tracing::debug!(request = %key, success, circuit = %circuit, "Outcome recorded");
        Ok(())
    }

    /// Report the outcome of the current dispatch of a tracked request.
    ///
    /// Success releases the context. Failure leaves it in `FailedRetrying`, waiting for
    /// [`request_retry`](Self::request_retry) or [`release`](Self::release).
    pub fn notify_outcome(&self, key: RequestKey, success: bool) -> FailoverResult<()> {
        let Entry::Occupied(mut slot) = self.in_progress.entry(key) else {
            return Err(FailoverError::UnknownInvocation(key));
        };

        let phase = slot.get().phase();
        if phase != InvocationPhase::Dispatched {
            return Err(FailoverError::InvalidPhase {
                key,
                phase,
                action: "report an outcome",
            });
        }

        if let Some(address) = slot.get().selected_address() {
            // Unknown addresses are already logged; the outcome is simply lost.
            let _ = self.record_outcome(key, address, success);
        }

        if success {
            slot.get_mut().set_phase(InvocationPhase::Succeeded);
            slot.remove();
        } else {
            slot.get_mut().set_phase(InvocationPhase::FailedRetrying);
        }
        Ok(())
    }

    /// Choose a new endpoint for a request whose last dispatch failed.
    ///
    /// Terminal errors release the context; the caller must surface them.
    pub fn request_retry(&self, key: RequestKey) -> FailoverResult<RetryPlan<P>> {
        let Entry::Occupied(mut slot) = self.in_progress.entry(key) else {
            return Err(FailoverError::UnknownInvocation(key));
        };

        let phase = slot.get().phase();
        if phase != InvocationPhase::FailedRetrying {
            return Err(FailoverError::InvalidPhase {
                key,
                phase,
                action: "retry",
            });
        }

        let attempts = slot.get().attempts();
        match self.scan() {
            Ok(_) if attempts >= self.max_attempts => {
                tracing::error!(request = %key, attempts, "Retry budget exhausted");
                slot.get_mut().set_phase(InvocationPhase::FailedTerminal);
                slot.remove();
                metrics::record_terminal_failure("attempts_exhausted");
                Err(FailoverError::AttemptsExhausted { attempts })
            }
            Ok(address) => {
                tracing::error!(request = %key, address = %address, attempt = attempts + 1, "Connection error, retrying");
                metrics::record_retry(&address);
                let ctx = slot.get_mut();
                ctx.dispatch_to(&address);
                Ok(RetryPlan {
                    address,
                    delay: self.delay_between_retries,
                    parameters: ctx.parameters().clone(),
                    attempt: ctx.attempts(),
                })
            }
            Err(e) => {
                tracing::error!(request = %key, attempts, "No more failover nodes available");
                slot.get_mut().set_phase(InvocationPhase::FailedTerminal);
                slot.remove();
                metrics::record_terminal_failure("no_available_targets");
                Err(e)
            }
        }
    }

    /// Record a failed dispatch and pick the next endpoint.
    pub fn on_request_failure(&self, key: RequestKey) -> FailoverResult<RetryPlan<P>> {
        self.notify_outcome(key, false)?;
        self.request_retry(key)
    }

    /// Record a successful dispatch and release the context.
    pub fn on_request_success(&self, key: RequestKey) -> FailoverResult<()> {
        self.notify_outcome(key, true)
    }

    /// Stop tracking a request without recording an outcome.
    pub fn release(&self, key: RequestKey) -> Option<InvocationContext<P>> {
        let released = self.in_progress.remove(&key).map(|(_, ctx)| ctx);
        if let Some(ctx) = &released {
            tracing::debug!(request = %key, phase = ?ctx.phase(), "Invocation released");
        }
        released
    }
}

/// Enough dispatches to walk every endpoint up to its trip point once.
fn default_max_attempts(registry: &EndpointRegistry) -> u32 {
    let per_endpoint = registry.settings().failure_threshold.max(1);
    u32::try_from(registry.len())
        .unwrap_or(u32::MAX)
        .saturating_mul(per_endpoint)
        .max(1)
}
