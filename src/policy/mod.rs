//! Timeout policy subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatcher
//!     → TimeoutPolicy::get_timeout(scope, service)
//!         → client.rs  (remote policy authority over HTTP)
//!         → fixed.rs   (static table from config)
//!     ← Duration | PolicyError
//! ```
//!
//! # Design Decisions
//! - The dispatcher treats the policy as opaque; any error fails the request
//! - No caching and no retries here; each request asks once
//! - A zero duration is a valid answer

pub mod client;
pub mod fixed;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::resilience::timeouts::{CallScope, ScopeEnded};

pub use client::HttpPolicyClient;
pub use fixed::StaticPolicy;

/// Errors from a timeout policy lookup.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// The policy authority could not be reached.
    #[error("policy request failed: {0}")]
    Transport(#[source] reqwest::Error),

    /// The policy authority answered with a non-success status.
    #[error("policy authority returned status {0}")]
    Status(u16),

    /// The policy authority's answer could not be decoded.
    #[error("invalid policy response: {0}")]
    Decode(#[source] reqwest::Error),

    /// No policy is defined for the service.
    #[error("no timeout policy for service '{0}'")]
    NotFound(String),

    /// The policy address is not a usable base URL.
    #[error("invalid policy address '{0}'")]
    InvalidAddress(String),

    /// The inbound call ended while waiting for the policy.
    #[error("policy lookup interrupted: {0}")]
    Interrupted(#[from] ScopeEnded),
}

/// Supplies the per-service timeout for a call.
#[async_trait]
pub trait TimeoutPolicy: Send + Sync {
    async fn get_timeout(&self, scope: &CallScope, service: &str) -> Result<Duration, PolicyError>;
}
