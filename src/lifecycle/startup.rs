//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the timeout policy from configuration
//! - Create one transport invoker and one breaker per service
//! - Wrap every invoker in its breaker and freeze the registry
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Breakers are applied uniformly here, never by callers
//! - The HTTP listener is bound by `main` only after assembly succeeds

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::config::GatewayConfig;
use crate::dispatch::Dispatcher;
use crate::http::{AppState, GatewayServer};
use crate::invoker::{HttpInvoker, Invoker};
use crate::policy::{HttpPolicyClient, PolicyError, StaticPolicy, TimeoutPolicy};
use crate::resilience::breaker_invoker::BreakerInvoker;
use crate::resilience::circuit_breaker::{BreakerSettings, CircuitBreaker};
use crate::routing::ServiceRegistry;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("no timeout policy configured")]
    MissingPolicy,

    #[error("failed to create policy client: {0}")]
    Policy(#[from] PolicyError),

    #[error("service '{name}' has an invalid address: {source}")]
    ServiceAddress {
        name: String,
        #[source]
        source: url::ParseError,
    },

    #[error("service '{0}' registered twice")]
    DuplicateService(String),
}

/// The assembled core: dispatcher plus the breakers it owns.
#[derive(Clone)]
pub struct Gateway {
    dispatcher: Dispatcher,
    breakers: Arc<Vec<Arc<CircuitBreaker>>>,
}

impl Gateway {
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::default()
    }

    /// Assemble from a validated configuration.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, StartupError> {
        let policy: Arc<dyn TimeoutPolicy> = match &config.policy.address {
            Some(address) => {
                let timeout = Duration::from_millis(config.policy.request_timeout_ms);
                tracing::info!(address = %address, "Using remote timeout policy");
                Arc::new(HttpPolicyClient::new(address, timeout)?)
            }
            None => {
                tracing::info!(
                    services = config.policy.timeouts_ms.len(),
                    default_ms = ?config.policy.default_timeout_ms,
                    "Using static timeout policy"
                );
                Arc::new(StaticPolicy::from_config(&config.policy))
            }
        };

        let mut builder = Gateway::builder()
            .policy(policy)
            .breaker_settings(BreakerSettings::from(&config.breaker));

        for service in &config.services {
            let invoker = HttpInvoker::new(service.name.clone(), &service.address).map_err(|source| {
                StartupError::ServiceAddress {
                    name: service.name.clone(),
                    source,
                }
            })?;
            tracing::info!(service = %service.name, address = %invoker.base(), "Registered service");
            builder = builder.service(service.name.clone(), invoker);
        }

        builder.build()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn breakers(&self) -> &[Arc<CircuitBreaker>] {
        &self.breakers
    }

    pub fn breaker(&self, service: &str) -> Option<&Arc<CircuitBreaker>> {
        self.breakers.iter().find(|b| b.name() == service)
    }

    /// HTTP front end serving this gateway.
    pub fn into_server(self, max_body_bytes: usize) -> GatewayServer {
        GatewayServer::new(
            AppState {
                dispatcher: self.dispatcher,
                breakers: self.breakers,
            },
            max_body_bytes,
        )
    }
}

/// Assembler for a `Gateway` from arbitrary invokers.
#[derive(Default)]
pub struct GatewayBuilder {
    policy: Option<Arc<dyn TimeoutPolicy>>,
    settings: BreakerSettings,
    services: Vec<(String, Arc<dyn Invoker>)>,
}

impl GatewayBuilder {
    pub fn policy(mut self, policy: Arc<dyn TimeoutPolicy>) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Settings for every breaker created by `build`.
    pub fn breaker_settings(mut self, settings: BreakerSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Register an unwrapped invoker; `build` puts it behind a breaker.
    pub fn service(mut self, name: impl Into<String>, invoker: impl Invoker + 'static) -> Self {
        self.services.push((name.into(), Arc::new(invoker)));
        self
    }

    pub fn build(self) -> Result<Gateway, StartupError> {
        let policy = self.policy.ok_or(StartupError::MissingPolicy)?;

        let mut seen = HashSet::new();
        let mut breakers = Vec::with_capacity(self.services.len());
        let mut entries: Vec<(String, Arc<dyn Invoker>)> = Vec::with_capacity(self.services.len());

        for (name, invoker) in self.services {
            if !seen.insert(name.clone()) {
                return Err(StartupError::DuplicateService(name));
            }
            let breaker = Arc::new(CircuitBreaker::new(name.clone(), self.settings.clone()));
            breakers.push(breaker.clone());
            entries.push((name, Arc::new(BreakerInvoker::new(breaker, invoker))));
        }

        let registry: ServiceRegistry = entries.into_iter().collect();
        tracing::info!(services = ?registry.service_names(), "Service registry ready");

        Ok(Gateway {
            dispatcher: Dispatcher::new(policy, Arc::new(registry)),
            breakers: Arc::new(breakers),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceConfig;
    use crate::dispatch::ErrorKind;
    use crate::invoker::{FnInvoker, InvokeError};
    use crate::resilience::circuit_breaker::BreakerState;
    use crate::resilience::timeouts::CallScope;
    use bytes::Bytes;

    fn failing() -> impl Invoker {
        FnInvoker::new(|_, _| std::future::ready(Err::<Bytes, _>(InvokeError::downstream("down"))))
    }

    fn echo() -> impl Invoker {
        FnInvoker::new(|_, payload| std::future::ready(Ok::<_, InvokeError>(payload)))
    }

    #[test]
    fn test_builder_requires_policy() {
        let err = Gateway::builder().service("a", echo()).build().err().unwrap();
        assert!(matches!(err, StartupError::MissingPolicy));
    }

    #[test]
    fn test_builder_rejects_duplicates() {
        let err = Gateway::builder()
            .policy(Arc::new(StaticPolicy::uniform(Duration::from_secs(1))))
            .service("a", echo())
            .service("a", echo())
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, StartupError::DuplicateService(name) if name == "a"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_breakers_are_independent() {
        let gateway = Gateway::builder()
            .policy(Arc::new(StaticPolicy::uniform(Duration::from_secs(1))))
            .service("bad", failing())
            .service("good", echo())
            .build()
            .unwrap();

        let scope = CallScope::root();
        for _ in 0..3 {
            let _ = gateway.dispatcher().handle(&scope, "bad", "m", Bytes::new()).await;
        }

        let err = gateway
            .dispatcher()
            .handle(&scope, "bad", "m", Bytes::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BreakerOpen);

        let reply = gateway
            .dispatcher()
            .handle(&scope, "good", "m", Bytes::from_static(b"hi"))
            .await
            .unwrap();
        assert_eq!(reply, Bytes::from_static(b"hi"));

        assert_eq!(gateway.breaker("bad").unwrap().state(), BreakerState::Open);
        assert_eq!(gateway.breaker("good").unwrap().state(), BreakerState::Closed);
    }

    #[test]
    fn test_from_config() {
        let mut config = GatewayConfig::default();
        config.policy.default_timeout_ms = Some(500);
        config.breaker.trip_threshold = 7;
        config.services.push(ServiceConfig {
            name: "users".into(),
            address: "127.0.0.1:8081".into(),
        });

        let gateway = Gateway::from_config(&config).unwrap();
        assert_eq!(gateway.breakers().len(), 1);
        assert_eq!(gateway.breaker("users").unwrap().settings().trip_threshold, 7);
        assert!(gateway.dispatcher().registry().contains("users"));
    }

    #[test]
    fn test_from_config_bad_address() {
        let mut config = GatewayConfig::default();
        config.policy.default_timeout_ms = Some(500);
        config.services.push(ServiceConfig {
            name: "users".into(),
            address: "http://".into(),
        });

        let err = Gateway::from_config(&config).err().unwrap();
        assert!(matches!(err, StartupError::ServiceAddress { .. }));
    }
}
