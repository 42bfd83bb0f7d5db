//! Circuit-breaking invoker decorator.
//!
//! Wraps any `Invoker` with a per-service `CircuitBreaker`. Admission is decided
//! before the inner invoker is touched; outcomes are recorded afterwards.
//!
//! # Outcome Mapping
//! - Inner success → breaker success
//! - Inner failure or deadline expiry → breaker failure, error passed through
//! - Caller cancellation → no outcome, trial slot released
//! - Future dropped mid-call → failure if the deadline had passed, else released

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::invoker::{InvokeError, Invoker};
use crate::observability::metrics;
use crate::resilience::circuit_breaker::{CircuitBreaker, Ticket};
use crate::resilience::timeouts::CallScope;

/// An `Invoker` guarded by a circuit breaker.
pub struct BreakerInvoker<I> {
    breaker: Arc<CircuitBreaker>,
    inner: I,
    errors: AtomicU64,
}

impl<I: Invoker> BreakerInvoker<I> {
    pub fn new(breaker: Arc<CircuitBreaker>, inner: I) -> Self {
        Self {
            breaker,
            inner,
            errors: AtomicU64::new(0),
        }
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Number of attempted calls that failed since startup.
    pub fn error_count(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl<I: Invoker> Invoker for BreakerInvoker<I> {
    async fn invoke(
        &self,
        scope: &CallScope,
        method: &str,
        payload: Bytes,
    ) -> Result<Bytes, InvokeError> {
        // A call that cannot run is not evidence against the backend.
        if let Some(ended) = scope.check() {
            return Err(ended.into());
        }

        let Some(ticket) = self.breaker.try_acquire() else {
            tracing::debug!(service = %self.breaker.name(), method = %method, "Call rejected by open breaker");
            metrics::record_breaker_rejection(self.breaker.name());
            return Err(InvokeError::BreakerOpen {
                service: self.breaker.name().to_string(),
            });
        };

        let pending = PendingOutcome::new(&self.breaker, ticket, scope);
        let result = scope
            .run(self.inner.invoke(scope, method, payload))
            .await
            .unwrap_or_else(|ended| Err(ended.into()));

        match &result {
            Ok(_) => pending.success(),
            Err(InvokeError::Cancelled) => pending.release(),
            Err(e) => {
                self.errors.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(service = %self.breaker.name(), method = %method, error = %e, "Downstream call failed");
                pending.failure();
            }
        }

        result
    }
}

/// Settles a ticket exactly once, even if the call future is dropped.
struct PendingOutcome<'a> {
    breaker: &'a CircuitBreaker,
    ticket: Option<Ticket>,
    scope: &'a CallScope,
}

impl<'a> PendingOutcome<'a> {
    fn new(breaker: &'a CircuitBreaker, ticket: Ticket, scope: &'a CallScope) -> Self {
        Self {
            breaker,
            ticket: Some(ticket),
            scope,
        }
    }

    fn success(mut self) {
        if let Some(ticket) = self.ticket.take() {
            self.breaker.record_success(ticket);
        }
    }

    fn failure(mut self) {
        if let Some(ticket) = self.ticket.take() {
            self.breaker.record_failure(ticket);
        }
    }

    fn release(mut self) {
        if let Some(ticket) = self.ticket.take() {
            self.breaker.release(ticket);
        }
    }
}

impl Drop for PendingOutcome<'_> {
    fn drop(&mut self) {
        if let Some(ticket) = self.ticket.take() {
            if self.scope.is_expired() {
                self.breaker.record_failure(ticket);
            } else {
                self.breaker.release(ticket);
            }
        }
    }
}
