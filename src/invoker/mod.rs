//! Backend invocation capability.
//!
//! # Data Flow
//! ```text
//! Dispatcher
//!     → Invoker::invoke(scope, method, payload)
//!         → BreakerInvoker (admission, outcome recording)
//!             → HttpInvoker / FnInvoker (actual transport)
//!     ← payload | InvokeError
//! ```
//!
//! # Design Decisions
//! - One method, one capability: anything that can reach a backend is an `Invoker`
//! - Decorators (the circuit breaker) are just more `Invoker`s owning an inner one
//! - Payloads are opaque `Bytes`; nothing here inspects them
//! - The call scope is passed explicitly so cancellation is part of the contract

pub mod http;

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::resilience::timeouts::{CallScope, ScopeEnded};

pub use self::http::HttpInvoker;

/// Boxed error used for downstream causes.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure of a single invocation.
#[derive(Debug, Error)]
pub enum InvokeError {
    /// The call was not attempted: the service's breaker is refusing traffic.
    ///
    /// Carries no source. The failure that tripped the breaker is never exposed.
    #[error("circuit breaker open for service '{service}'")]
    BreakerOpen { service: String },

    /// The call was attempted and the backend failed.
    #[error("downstream call failed: {0}")]
    Downstream(#[source] BoxError),

    /// The call scope expired before the backend answered.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// The caller went away before the backend answered.
    #[error("call cancelled by caller")]
    Cancelled,
}

impl InvokeError {
    /// Wrap any error as a downstream failure.
    pub fn downstream(err: impl Into<BoxError>) -> Self {
        Self::Downstream(err.into())
    }

    /// Returns true when the breaker refused the call.
    pub fn is_breaker_open(&self) -> bool {
        matches!(self, Self::BreakerOpen { .. })
    }
}

impl From<ScopeEnded> for InvokeError {
    fn from(ended: ScopeEnded) -> Self {
        match ended {
            ScopeEnded::DeadlineExceeded => Self::DeadlineExceeded,
            ScopeEnded::Cancelled => Self::Cancelled,
        }
    }
}

/// Send a method name and payload to one backend.
#[async_trait]
pub trait Invoker: Send + Sync {
    /// Invoke `method` with `payload`, bounded by `scope`.
    async fn invoke(
        &self,
        scope: &CallScope,
        method: &str,
        payload: Bytes,
    ) -> Result<Bytes, InvokeError>;
}

#[async_trait]
impl<T> Invoker for Arc<T>
where
    T: Invoker + ?Sized,
{
    async fn invoke(
        &self,
        scope: &CallScope,
        method: &str,
        payload: Bytes,
    ) -> Result<Bytes, InvokeError> {
        (**self).invoke(scope, method, payload).await
    }
}

/// An invoker backed by an async closure.
///
/// Useful for in-process backends and for tests. The closure is bounded by
/// the call scope, so a slow closure still honours the deadline.
pub struct FnInvoker<F> {
    f: F,
}

impl<F, Fut> FnInvoker<F>
where
    F: Fn(String, Bytes) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Bytes, InvokeError>> + Send + 'static,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> Invoker for FnInvoker<F>
where
    F: Fn(String, Bytes) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Bytes, InvokeError>> + Send + 'static,
{
    async fn invoke(
        &self,
        scope: &CallScope,
        method: &str,
        payload: Bytes,
    ) -> Result<Bytes, InvokeError> {
        scope
            .run((self.f)(method.to_string(), payload))
            .await
            .unwrap_or_else(|ended| Err(ended.into()))
    }
}
