//! Per-call cancellation scopes.
//!
//! # Responsibilities
//! - Carry the deadline derived from the policy timeout
//! - Carry the caller's cancellation signal
//! - Bound any backend future so an expired call stops promptly
//!
//! # Design Decisions
//! - Scopes are explicit values passed down every call, never ambient state
//! - A derived scope is a child: cancelling the parent cancels it, never the reverse
//! - A derived deadline never outlives the parent's deadline
//! - Zero timeout means "already expired", not "no timeout"
//! - Uses Tokio's clock so paused-time tests are deterministic

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::{CancellationToken, DropGuard};

/// Why a scope stopped admitting work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ScopeEnded {
    /// The scope's deadline passed before the work completed.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// The caller cancelled the scope (or one of its parents).
    #[error("cancelled by caller")]
    Cancelled,
}

/// The bounded-lifetime context one call executes in.
#[derive(Debug, Clone)]
pub struct CallScope {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl CallScope {
    /// A scope with no deadline, cancelled only explicitly.
    pub fn root() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
        }
    }

    /// Derive a child scope that expires after `timeout`.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let own = Instant::now().checked_add(timeout);
        let deadline = match (self.deadline, own) {
            (Some(parent), Some(own)) => Some(parent.min(own)),
            (parent, None) => parent,
            (None, own) => own,
        };

        Self {
            token: self.token.child_token(),
            deadline,
        }
    }

    /// The instant this scope expires, if bounded.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline. `None` when unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn is_expired(&self) -> bool {
        self.deadline
            .map(|deadline| deadline <= Instant::now())
            .unwrap_or(false)
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel this scope and every scope derived from it. Idempotent.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns a guard that cancels the scope when dropped.
    ///
    /// The transport holds one per inbound call so a disconnected client
    /// cancels everything the call started.
    pub fn cancel_on_drop(&self) -> DropGuard {
        self.token.clone().drop_guard()
    }

    /// Why the scope has ended, or `None` while it is still live.
    ///
    /// Cancellation wins over expiry when both hold.
    pub fn check(&self) -> Option<ScopeEnded> {
        if self.is_cancelled() {
            Some(ScopeEnded::Cancelled)
        } else if self.is_expired() {
            Some(ScopeEnded::DeadlineExceeded)
        } else {
            None
        }
    }

    /// Resolves once the scope ends, reporting why.
    pub async fn ended(&self) -> ScopeEnded {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => ScopeEnded::Cancelled,
                    _ = sleep_until(deadline) => ScopeEnded::DeadlineExceeded,
                }
            }
            None => {
                self.token.cancelled().await;
                ScopeEnded::Cancelled
            }
        }
    }

    /// Drive `fut` to completion unless the scope ends first.
    ///
    /// When the scope ends, `fut` is dropped, which aborts whatever I/O it had
    /// in flight.
    pub async fn run<F>(&self, fut: F) -> Result<F::Output, ScopeEnded>
    where
        F: Future,
    {
        if let Some(ended) = self.check() {
            return Err(ended);
        }

        tokio::select! {
            biased;
            output = fut => Ok(output),
            ended = self.ended() => Err(ended),
        }
    }
}

impl Default for CallScope {
    fn default() -> Self {
        Self::root()
    }
}
