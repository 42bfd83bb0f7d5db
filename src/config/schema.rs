//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, body limit).
    pub listener: ListenerConfig,

    /// Where per-service timeouts come from.
    pub policy: PolicyConfig,

    /// Circuit breaker settings, shared by every service.
    pub breaker: BreakerConfig,

    /// Backend service definitions.
    pub services: Vec<ServiceConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Largest accepted request payload.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_bytes: 1024 * 1024,
        }
    }
}

/// Timeout policy source.
///
/// With `address` set, timeouts are fetched from the policy authority.
/// Otherwise the static table (`timeouts_ms`, `default_timeout_ms`) is used.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Base URL of the policy authority.
    pub address: Option<String>,

    /// Upper bound on a single policy lookup.
    pub request_timeout_ms: u64,

    /// Static fallback for services missing from `timeouts_ms`.
    pub default_timeout_ms: Option<u64>,

    /// Static per-service timeouts.
    pub timeouts_ms: HashMap<String, u64>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            address: None,
            request_timeout_ms: 2_000,
            default_timeout_ms: None,
            timeouts_ms: HashMap::new(),
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive failures that open the breaker.
    pub trip_threshold: u32,

    /// Closed-state counter reset period (0 = never reset).
    pub interval_secs: u64,

    /// Time spent open before trial calls are allowed.
    pub cool_down_secs: u64,

    /// Trial calls admitted while half-open.
    pub max_half_open_requests: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            trip_threshold: 3,
            interval_secs: 60,
            cool_down_secs: 30,
            max_half_open_requests: 5,
        }
    }
}

/// A backend service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// Logical name callers use (first path segment).
    pub name: String,

    /// Backend base URL or `host:port`.
    pub address: String,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
