//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, body limit, request ID)
//! - Bind server to listener
//! - Hand each call to the dispatcher under its own cancellation scope
//! - Report breaker state on `/healthz`

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::dispatch::{Dispatcher, ErrorKind};
use crate::http::request::{request_id, MakeRequestUuid, X_REQUEST_ID};
use crate::http::response::with_retry_after;
use crate::resilience::circuit_breaker::CircuitBreaker;
use crate::resilience::timeouts::CallScope;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Dispatcher,
    pub breakers: Arc<Vec<Arc<CircuitBreaker>>>,
}

/// HTTP front end for the gateway.
pub struct GatewayServer {
    router: Router,
}

impl GatewayServer {
    pub fn new(state: AppState, max_body_bytes: usize) -> Self {
        Self {
            router: Self::build_router(state, max_body_bytes),
        }
    }

    /// Build the Axum router with all middleware layers.
    pub fn build_router(state: AppState, max_body_bytes: usize) -> Router {
        Router::new()
            .route("/healthz", get(health_handler))
            .route("/{service}/{method}", post(dispatch_handler))
            .with_state(state)
            .layer(DefaultBodyLimit::max(max_body_bytes))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Serve on `listener` until `shutdown` fires, then drain in-flight calls.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// `POST /{service}/{method}`: the body is the payload.
async fn dispatch_handler(
    State(state): State<AppState>,
    Path((service, method)): Path<(String, String)>,
    headers: HeaderMap,
    payload: Bytes,
) -> Response {
    let request_id = request_id(&headers);

    // The scope dies with this future, so a disconnecting client cancels the call.
    let scope = CallScope::root();
    let _cancel = scope.cancel_on_drop();

    tracing::debug!(
        request_id = %request_id,
        service = %service,
        method = %method,
        bytes = payload.len(),
        "Dispatching call"
    );

    match state.dispatcher.handle(&scope, &service, &method, payload).await {
        Ok(reply) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, HeaderValue::from_static("application/octet-stream"))],
            reply,
        )
            .into_response(),
        Err(e) => {
            let kind = e.kind();
            match kind {
                ErrorKind::Downstream | ErrorKind::PolicyUnavailable => {
                    tracing::warn!(request_id = %request_id, service = %service, method = %method, error = %e, "Call failed");
                }
                _ => {
                    tracing::info!(request_id = %request_id, service = %service, method = %method, error = %e, "Call rejected");
                }
            }

            let retry_after = (kind == ErrorKind::BreakerOpen)
                .then(|| breaker_cool_down(&state, &service))
                .flatten();
            let response = e.into_response();
            match retry_after {
                Some(secs) => with_retry_after(response, secs),
                None => response,
            }
        }
    }
}

fn breaker_cool_down(state: &AppState, service: &str) -> Option<u64> {
    state
        .breakers
        .iter()
        .find(|b| b.name() == service)
        .map(|b| b.settings().cool_down.as_secs().max(1))
}

#[derive(Debug, Serialize)]
struct HealthReport {
    status: &'static str,
    services: BTreeMap<String, ServiceHealth>,
}

#[derive(Debug, Serialize)]
struct ServiceHealth {
    breaker: &'static str,
    requests: u32,
    consecutive_failures: u32,
}

/// `GET /healthz`: always 200 while the process serves; breaker states are informational.
async fn health_handler(State(state): State<AppState>) -> Json<HealthReport> {
    let services = state
        .breakers
        .iter()
        .map(|breaker| {
            let counts = breaker.counts();
            (
                breaker.name().to_string(),
                ServiceHealth {
                    breaker: breaker.state().as_str(),
                    requests: counts.requests,
                    consecutive_failures: counts.consecutive_failures,
                },
            )
        })
        .collect();

    Json(HealthReport {
        status: "ok",
        services,
    })
}
