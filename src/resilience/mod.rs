//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to backend:
//!     → timeouts.rs (call scope: deadline + cancellation, inherited by children)
//!     → breaker_invoker.rs (admission check, outcome recording)
//!     → circuit_breaker.rs (closed / open / half-open state machine)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every backend call runs inside a scope with a deadline
//! - No retries; a failed call is reported once
//! - One breaker per service; breakers never share state or locks
//! - The breaker is applied as a decorator, so any invoker can be protected

pub mod breaker_invoker;
pub mod circuit_breaker;
pub mod timeouts;

pub use breaker_invoker::BreakerInvoker;
pub use circuit_breaker::{BreakerSettings, BreakerState, CircuitBreaker, Counts};
pub use timeouts::{CallScope, ScopeEnded};
