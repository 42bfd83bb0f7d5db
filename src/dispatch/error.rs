use thiserror::Error;

use crate::invoker::InvokeError;
use crate::policy::PolicyError;
use crate::routing::registry::UnknownService;

/// Why a dispatched call failed.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to get timeout for service '{service}'")]
    PolicyUnavailable {
        service: String,
        #[source]
        source: PolicyError,
    },

    #[error(transparent)]
    UnknownService(#[from] UnknownService),

    #[error(transparent)]
    Invoke(#[from] InvokeError),
}

/// Coarse classification of a `DispatchError`, stable for callers and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    PolicyUnavailable,
    UnknownService,
    BreakerOpen,
    Downstream,
    DeadlineExceeded,
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PolicyUnavailable => "policy_unavailable",
            Self::UnknownService => "unknown_service",
            Self::BreakerOpen => "breaker_open",
            Self::Downstream => "downstream_error",
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::Cancelled => "cancelled",
        }
    }
}

impl DispatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::PolicyUnavailable { .. } => ErrorKind::PolicyUnavailable,
            Self::UnknownService(_) => ErrorKind::UnknownService,
            Self::Invoke(InvokeError::BreakerOpen { .. }) => ErrorKind::BreakerOpen,
            Self::Invoke(InvokeError::Downstream(_)) => ErrorKind::Downstream,
            Self::Invoke(InvokeError::DeadlineExceeded) => ErrorKind::DeadlineExceeded,
            Self::Invoke(InvokeError::Cancelled) => ErrorKind::Cancelled,
        }
    }
}
