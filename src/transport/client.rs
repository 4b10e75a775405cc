//! Failover-aware client driving a [`Dispatcher`].

use std::future::Future;
use std::sync::Arc;

use thiserror::Error;

use crate::cluster::{FailoverError, FailoverSelector, RequestKey};
use crate::transport::Dispatcher;

/// A logical request that could not be completed on any endpoint.
#[derive(Debug, Error)]
#[error("{reason}")]
pub struct TerminalFailure<E: std::error::Error + 'static> {
    pub reason: FailoverError,
    /// The error of the last dispatch attempt, if one was made.
    #[source]
    pub last_error: Option<E>,
}

impl<E: std::error::Error + 'static> From<FailoverError> for TerminalFailure<E> {
    fn from(reason: FailoverError) -> Self {
        Self {
            reason,
            last_error: None,
        }
    }
}

/// Releases the invocation if the request future is dropped mid-flight.
struct InvocationGuard<'a, P: Clone> {
    selector: &'a FailoverSelector<P>,
    key: RequestKey,
}

impl<P: Clone> Drop for InvocationGuard<'_, P> {
    fn drop(&mut self) {
        self.selector.release(self.key);
    }
}

/// Sends requests through a dispatcher, failing over between endpoints.
pub struct FailoverClient<D: Dispatcher> {
    selector: Arc<FailoverSelector<D::Request>>,
    dispatcher: D,
}

impl<D: Dispatcher> FailoverClient<D> {
    pub fn new(selector: Arc<FailoverSelector<D::Request>>, dispatcher: D) -> Self {
        Self { selector, dispatcher }
    }

    pub fn selector(&self) -> &Arc<FailoverSelector<D::Request>> {
        &self.selector
    }

    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    /// Execute one logical request.
    pub async fn execute(&self, request: D::Request) -> Result<D::Response, TerminalFailure<D::Error>> {
        let key = RequestKey::new();
        self.selector.begin_invocation(key, request.clone())?;
        let _guard = InvocationGuard {
            selector: &self.selector,
            key,
        };

        let mut address = self.selector.select_destination(key)?;
        let mut request = request;

        loop {
            match self.dispatcher.dispatch(&address, &request).await {
                Ok(response) => {
                    if let Err(e) = self.selector.on_request_success(key) {
                        tracing::warn!(request = %key, error = %e, "Could not record success");
                    }
                    return Ok(response);
                }
                Err(error) => {
                    tracing::warn!(request = %key, address = %address, error = %error, "Dispatch failed");
                    match self.selector.on_request_failure(key) {
                        Ok(plan) => {
                            if !plan.delay.is_zero() {
                                tokio::time::sleep(plan.delay).await;
                            }
                            address = plan.address;
                            request = plan.parameters;
                        }
                        Err(reason) => {
                            return Err(TerminalFailure {
                                reason,
                                last_error: Some(error),
                            });
                        }
                    }
                }
            }
        }
    }

    /// Execute one logical request unless `shutdown` completes first.
    ///
    /// Returns `None` when cancelled; the in-flight invocation is released and no
    /// outcome is recorded.
    pub async fn execute_until<F>(
        &self,
        request: D::Request,
        shutdown: F,
    ) -> Option<Result<D::Response, TerminalFailure<D::Error>>>
    where
        F: Future,
    {
        tokio::select! {
            _ = shutdown => None,
            outcome = self.execute(request) => Some(outcome),
        }
    }
}
