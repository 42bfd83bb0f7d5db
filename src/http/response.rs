//! Response mapping.
//!
//! # Responsibilities
//! - Map dispatch failures to HTTP status codes
//! - Render failures as a small JSON document
//!
//! # Design Decisions
//! - Backend timeouts result in 504 Gateway Timeout
//! - An open breaker is 503 with a `retry-after` hint of the cool-down
//! - Downstream causes are not echoed to clients, only logged

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::dispatch::{DispatchError, ErrorKind};

const DOWNSTREAM_MESSAGE: &str = "downstream call failed";

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::PolicyUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::UnknownService => StatusCode::NOT_FOUND,
        ErrorKind::BreakerOpen => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Downstream => StatusCode::BAD_GATEWAY,
        ErrorKind::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::Cancelled => StatusCode::REQUEST_TIMEOUT,
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let message = match kind {
            ErrorKind::Downstream => DOWNSTREAM_MESSAGE.to_string(),
            _ => self.to_string(),
        };
        let body = ErrorBody {
            error: kind.as_str(),
            message,
        };
        (status_for(kind), Json(body)).into_response()
    }
}

/// Attach `retry-after` to a breaker-open response.
pub fn with_retry_after(mut response: Response, secs: u64) -> Response {
    if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
        response.headers_mut().insert(header::RETRY_AFTER, value);
    }
    response
}
