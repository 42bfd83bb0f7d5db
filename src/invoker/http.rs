//! HTTP transport for backend calls.
//!
//! A method call becomes `POST {base}/{method}` with the payload as an
//! `application/octet-stream` body. Any 2xx answer is a success and its body
//! is the reply; everything else is a downstream failure.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use bytes::Bytes;
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;
use url::Url;

use crate::invoker::{InvokeError, Invoker};
use crate::resilience::timeouts::CallScope;

/// Largest reply body read from a backend.
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 4 * 1024 * 1024;

/// Transport-level causes carried inside `InvokeError::Downstream`.
#[derive(Debug, Error)]
pub enum HttpCallError {
    #[error("service '{service}' answered with status {status}")]
    Status { service: String, status: StatusCode },

    #[error("request to service '{service}' failed: {source}")]
    Transport {
        service: String,
        #[source]
        source: hyper_util::client::legacy::Error,
    },

    #[error("failed to read reply from service '{service}': {source}")]
    Body {
        service: String,
        #[source]
        source: axum::Error,
    },

    #[error("invalid request for service '{service}': {source}")]
    Request {
        service: String,
        #[source]
        source: axum::http::Error,
    },

    #[error("method '{0}' cannot be expressed as a path segment")]
    Method(String),
}

/// Invoker that talks to one backend over HTTP/1.1.
#[derive(Clone)]
pub struct HttpInvoker {
    service: String,
    base: Url,
    client: Client<HttpConnector, Body>,
    max_response_bytes: usize,
}

impl HttpInvoker {
    /// `address` is either a full base URL or a bare `host:port`.
    pub fn new(service: impl Into<String>, address: &str) -> Result<Self, url::ParseError> {
        let base = parse_address(address)?;
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Ok(Self {
            service: service.into(),
            base,
            client,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
        })
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    fn method_url(&self, method: &str) -> Result<Url, HttpCallError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| HttpCallError::Method(method.to_string()))?
            .pop_if_empty()
            .push(method);
        Ok(url)
    }

    async fn call(&self, method: &str, payload: Bytes) -> Result<Bytes, HttpCallError> {
        let url = self.method_url(method)?;
        let request = Request::builder()
            .method(Method::POST)
            .uri(url.as_str())
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .header(header::USER_AGENT, concat!("gateway/", env!("CARGO_PKG_VERSION")))
            .body(Body::from(payload))
            .map_err(|source| HttpCallError::Request {
                service: self.service.clone(),
                source,
            })?;

        let response: hyper::Response<Incoming> = self
            .client
            .request(request)
            .await
            .map_err(|source| HttpCallError::Transport {
                service: self.service.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(HttpCallError::Status {
                service: self.service.clone(),
                status,
            });
        }

        axum::body::to_bytes(Body::new(response.into_body()), self.max_response_bytes)
            .await
            .map_err(|source| HttpCallError::Body {
                service: self.service.clone(),
                source,
            })
    }
}

#[async_trait]
impl Invoker for HttpInvoker {
    async fn invoke(
        &self,
        scope: &CallScope,
        method: &str,
        payload: Bytes,
    ) -> Result<Bytes, InvokeError> {
        scope
            .run(self.call(method, payload))
            .await?
            .map_err(InvokeError::downstream)
    }
}

impl std::fmt::Debug for HttpInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpInvoker")
            .field("service", &self.service)
            .field("base", &self.base.as_str())
            .finish()
    }
}

/// Parse a service address: a full base URL or a bare `host:port`.
pub fn parse_address(address: &str) -> Result<Url, url::ParseError> {
    let url = if address.contains("://") {
        Url::parse(address)?
    } else {
        Url::parse(&format!("http://{address}"))?
    };
    if url.cannot_be_a_base() {
        return Err(url::ParseError::RelativeUrlWithCannotBeABaseBase);
    }
    Ok(url)
}
