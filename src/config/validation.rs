//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check service names are present and unique
//! - Validate addresses parse and value ranges are usable
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::invoker::http::parse_address;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address '{0}' is not a socket address")]
    BindAddress(String),

    #[error("listener.max_body_bytes must be greater than 0")]
    BodyLimit,

    #[error("observability.metrics_address '{0}' is not a socket address")]
    MetricsAddress(String),

    #[error("services[{0}] has an empty name")]
    EmptyServiceName(usize),

    #[error("service '{0}' is defined more than once")]
    DuplicateService(String),

    #[error("service name '{0}' cannot contain '/'")]
    ServiceNameSlash(String),

    #[error("service '{name}' has an invalid address '{address}'")]
    ServiceAddress { name: String, address: String },

    #[error("breaker.trip_threshold must be greater than 0")]
    TripThreshold,

    #[error("breaker.max_half_open_requests must be greater than 0")]
    HalfOpenBudget,

    #[error("policy.address '{0}' is not a valid URL")]
    PolicyAddress(String),

    #[error("policy.request_timeout_ms must be greater than 0")]
    PolicyRequestTimeout,

    #[error("no timeout source: set policy.address, policy.default_timeout_ms, or a timeout for service '{0}'")]
    MissingTimeout(String),
}

/// Check a parsed configuration, collecting every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }
    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::BodyLimit);
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if config.breaker.trip_threshold == 0 {
        errors.push(ValidationError::TripThreshold);
    }
    if config.breaker.max_half_open_requests == 0 {
        errors.push(ValidationError::HalfOpenBudget);
    }

    validate_services(config, &mut errors);
    validate_policy(config, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_services(config: &GatewayConfig, errors: &mut Vec<ValidationError>) {
    let mut seen = HashSet::new();
    for (i, service) in config.services.iter().enumerate() {
        if service.name.is_empty() {
            errors.push(ValidationError::EmptyServiceName(i));
            continue;
        }
        if service.name.contains('/') {
            errors.push(ValidationError::ServiceNameSlash(service.name.clone()));
        }
        if !seen.insert(service.name.as_str()) {
            errors.push(ValidationError::DuplicateService(service.name.clone()));
        }
        if parse_address(&service.address).is_err() {
            errors.push(ValidationError::ServiceAddress {
                name: service.name.clone(),
                address: service.address.clone(),
            });
        }
    }
}

fn validate_policy(config: &GatewayConfig, errors: &mut Vec<ValidationError>) {
    let policy = &config.policy;
    match &policy.address {
        Some(address) => {
            if url::Url::parse(address).map_or(true, |u| u.cannot_be_a_base()) {
                errors.push(ValidationError::PolicyAddress(address.clone()));
            }
            if policy.request_timeout_ms == 0 {
                errors.push(ValidationError::PolicyRequestTimeout);
            }
        }
        None if policy.default_timeout_ms.is_none() => {
            for service in &config.services {
                if !service.name.is_empty() && !policy.timeouts_ms.contains_key(&service.name) {
                    errors.push(ValidationError::MissingTimeout(service.name.clone()));
                }
            }
        }
        None => {}
    }
}
