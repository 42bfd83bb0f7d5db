//! Remote policy authority client.
//!
//! Asks `GET {base}/policies/{service}` and expects `{"timeout_ms": <u64>}`.
//! A 404 means the authority has no policy for the service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use url::Url;

use crate::policy::{PolicyError, TimeoutPolicy};
use crate::resilience::timeouts::CallScope;

#[derive(Debug, Deserialize)]
struct PolicyResponse {
    timeout_ms: u64,
}

/// `TimeoutPolicy` backed by an HTTP policy authority.
#[derive(Debug, Clone)]
pub struct HttpPolicyClient {
    client: Client,
    base: Url,
}

impl HttpPolicyClient {
    /// `request_timeout` bounds each lookup independently of the caller's scope.
    pub fn new(base: &str, request_timeout: Duration) -> Result<Self, PolicyError> {
        let base = Url::parse(base).map_err(|_| PolicyError::InvalidAddress(base.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(PolicyError::InvalidAddress(base.to_string()));
        }

        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(PolicyError::Transport)?;

        Ok(Self { client, base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    fn policy_url(&self, service: &str) -> Result<Url, PolicyError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| PolicyError::InvalidAddress(self.base.to_string()))?
            .pop_if_empty()
            .extend(["policies", service]);
        Ok(url)
    }

    async fn fetch(&self, service: &str) -> Result<Duration, PolicyError> {
        let url = self.policy_url(service)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(PolicyError::Transport)?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(PolicyError::NotFound(service.to_string()));
        }
        if !status.is_success() {
            return Err(PolicyError::Status(status.as_u16()));
        }

        let body: PolicyResponse = response.json().await.map_err(PolicyError::Decode)?;
        Ok(Duration::from_millis(body.timeout_ms))
    }
}

#[async_trait]
impl TimeoutPolicy for HttpPolicyClient {
    async fn get_timeout(&self, scope: &CallScope, service: &str) -> Result<Duration, PolicyError> {
        let timeout = scope.run(self.fetch(service)).await??;
        tracing::trace!(service = %service, timeout_ms = timeout.as_millis() as u64, "Resolved timeout policy");
        Ok(timeout)
    }
}
