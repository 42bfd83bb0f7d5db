//! Request dispatch.
//!
//! # Data Flow
//! ```text
//! handle(scope, service, method, payload)
//!     → TimeoutPolicy::get_timeout   (fails → PolicyUnavailable, nothing invoked)
//!     → scope.with_timeout(timeout)  (child scope, cancelled when the call ends)
//!     → ServiceRegistry::get         (miss → UnknownService, nothing invoked)
//!     → Invoker::invoke              (breaker-wrapped; errors pass through)
//! ```

mod error;

pub use error::{DispatchError, ErrorKind};

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;

use crate::observability::metrics;
use crate::policy::TimeoutPolicy;
use crate::resilience::timeouts::CallScope;
use crate::routing::registry::ServiceRegistry;

/// Routes one call to its service under that service's timeout.
#[derive(Clone)]
pub struct Dispatcher {
    policy: Arc<dyn TimeoutPolicy>,
    registry: Arc<ServiceRegistry>,
}

impl Dispatcher {
    pub fn new(policy: Arc<dyn TimeoutPolicy>, registry: Arc<ServiceRegistry>) -> Self {
        Self { policy, registry }
    }

    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    /// Handle a single call.
    ///
    /// The policy is consulted before the registry, so an unknown service
    /// whose policy lookup fails reports the policy failure.
    pub async fn handle(
        &self,
        scope: &CallScope,
        service: &str,
        method: &str,
        payload: Bytes,
    ) -> Result<Bytes, DispatchError> {
        let started = Instant::now();
        let result = self.dispatch(scope, service, method, payload).await;

        let label = if self.registry.contains(service) {
            service
        } else {
            "unknown"
        };
        match &result {
            Ok(reply) => {
                tracing::debug!(service = %service, method = %method, bytes = reply.len(), "Dispatched");
            }
            Err(e) => {
                tracing::debug!(service = %service, method = %method, error = %e, kind = e.kind().as_str(), "Dispatch failed");
            }
        }
        metrics::record_dispatch(label, outcome(&result), started);

        result
    }

    async fn dispatch(
        &self,
        scope: &CallScope,
        service: &str,
        method: &str,
        payload: Bytes,
    ) -> Result<Bytes, DispatchError> {
        let timeout = self
            .policy
            .get_timeout(scope, service)
            .await
            .map_err(|source| DispatchError::PolicyUnavailable {
                service: service.to_string(),
                source,
            })?;

        let call_scope = scope.with_timeout(timeout);
        // Releases the child's timer and anything still listening on it.
        let _release = call_scope.cancel_on_drop();

        let invoker = self.registry.get(service)?;
        // Bounded here as well, so an invoker that ignores its scope cannot hang the call.
        let reply = call_scope
            .run(invoker.invoke(&call_scope, method, payload))
            .await
            .unwrap_or_else(|ended| Err(ended.into()))?;
        Ok(reply)
    }
}

fn outcome(result: &Result<Bytes, DispatchError>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(e) => e.kind().as_str(),
    }
}
