//! Static timeout table.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::PolicyConfig;
use crate::policy::{PolicyError, TimeoutPolicy};
use crate::resilience::timeouts::CallScope;

/// Timeouts fixed at startup, with an optional fallback.
#[derive(Debug, Clone, Default)]
pub struct StaticPolicy {
    timeouts: HashMap<String, Duration>,
    default: Option<Duration>,
}

impl StaticPolicy {
    pub fn new(timeouts: HashMap<String, Duration>, default: Option<Duration>) -> Self {
        Self { timeouts, default }
    }

    /// Same timeout for every service.
    pub fn uniform(timeout: Duration) -> Self {
        Self::new(HashMap::new(), Some(timeout))
    }

    /// Add or replace one service's timeout.
    pub fn with_timeout(mut self, service: impl Into<String>, timeout: Duration) -> Self {
        self.timeouts.insert(service.into(), timeout);
        self
    }

    pub fn from_config(config: &PolicyConfig) -> Self {
        let timeouts = config
            .timeouts_ms
            .iter()
            .map(|(name, ms)| (name.clone(), Duration::from_millis(*ms)))
            .collect();
        Self::new(timeouts, config.default_timeout_ms.map(Duration::from_millis))
    }

    fn lookup(&self, service: &str) -> Option<Duration> {
        self.timeouts.get(service).copied().or(self.default)
    }
}

#[async_trait]
impl TimeoutPolicy for StaticPolicy {
    async fn get_timeout(&self, _scope: &CallScope, service: &str) -> Result<Duration, PolicyError> {
        self.lookup(service)
            .ok_or_else(|| PolicyError::NotFound(service.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_explicit_entry_wins_over_default() {
        let policy = StaticPolicy::uniform(Duration::from_secs(1))
            .with_timeout("slow", Duration::from_secs(5));
        let scope = CallScope::root();

        assert_eq!(policy.get_timeout(&scope, "slow").await.unwrap(), Duration::from_secs(5));
        assert_eq!(policy.get_timeout(&scope, "other").await.unwrap(), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_missing_without_default_fails() {
        let policy = StaticPolicy::default().with_timeout("svc", Duration::from_millis(10));
        let err = policy.get_timeout(&CallScope::root(), "nope").await.unwrap_err();
        assert!(matches!(err, PolicyError::NotFound(name) if name == "nope"));
    }

    #[tokio::test]
    async fn test_from_config_converts_millis() {
        let mut config = PolicyConfig::default();
        config.timeouts_ms.insert("svc".into(), 250);
        config.default_timeout_ms = Some(0);

        let policy = StaticPolicy::from_config(&config);
        let scope = CallScope::root();
        assert_eq!(policy.get_timeout(&scope, "svc").await.unwrap(), Duration::from_millis(250));
        assert_eq!(policy.get_timeout(&scope, "x").await.unwrap(), Duration::ZERO);
    }
}
