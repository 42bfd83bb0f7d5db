//! Circuit breaker for backend protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: backend assumed down, requests fail fast
//! - Half-Open: a bounded batch of trial requests probes the backend
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive failures >= trip_threshold
//! Closed → Closed (new window): counters reset every `interval`
//! Open → Half-Open: first admission attempt after `cool_down`
//! Half-Open → Closed: max_half_open_requests trials all succeeded
//! Half-Open → Open: any trial fails (cool-down restarts)
//! ```
//!
//! # Design Decisions
//! - Per-service circuit breaker (not global), one mutex per instance
//! - Lazy transitions: time-based moves are evaluated on the next call
//! - Every reset or transition starts a new generation; outcomes of calls
//!   admitted in an older generation are dropped
//! - Admission returns a `Ticket` that must be settled exactly once

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use crate::config::BreakerConfig;
use crate::observability::metrics;

/// Externally visible breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BreakerState {
    Closed,
    HalfOpen,
    Open,
}

impl BreakerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerState::Closed => "closed",
            BreakerState::HalfOpen => "half_open",
            BreakerState::Open => "open",
        }
    }
}

impl std::fmt::Display for BreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tunables for one breaker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerSettings {
    /// Consecutive failures that trip a closed breaker.
    pub trip_threshold: u32,
    /// Rolling window after which closed-state counters reset. Zero disables it.
    pub interval: Duration,
    /// How long the breaker stays open before probing.
    pub cool_down: Duration,
    /// Trial calls admitted while half-open.
    pub max_half_open_requests: u32,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            trip_threshold: 3,
            interval: Duration::from_secs(60),
            cool_down: Duration::from_secs(30),
            max_half_open_requests: 5,
        }
    }
}

impl From<&BreakerConfig> for BreakerSettings {
    fn from(config: &BreakerConfig) -> Self {
        Self {
            trip_threshold: config.trip_threshold,
            interval: Duration::from_secs(config.interval_secs),
            cool_down: Duration::from_secs(config.cool_down_secs),
            max_half_open_requests: config.max_half_open_requests,
        }
    }
}

/// Outcome counters for the current generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    pub requests: u32,
    pub total_successes: u32,
    pub total_failures: u32,
    pub consecutive_successes: u32,
    pub consecutive_failures: u32,
}

impl Counts {
    fn on_request(&mut self) {
        self.requests = self.requests.saturating_add(1);
    }

    fn on_success(&mut self) {
        self.total_successes = self.total_successes.saturating_add(1);
        self.consecutive_successes = self.consecutive_successes.saturating_add(1);
        self.consecutive_failures = 0;
    }

    fn on_failure(&mut self) {
        self.total_failures = self.total_failures.saturating_add(1);
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.consecutive_successes = 0;
    }
}

/// Proof that a call was admitted.
///
/// Hand it back through `record_success`, `record_failure` or `release`.
#[derive(Debug)]
#[must_use = "an admitted call must report its outcome"]
pub struct Ticket {
    generation: u64,
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Closed { window_start: Instant },
    Open { opened_at: Instant },
    HalfOpen { in_flight: u32 },
}

impl Phase {
    fn state(&self) -> BreakerState {
        match self {
            Phase::Closed { .. } => BreakerState::Closed,
            Phase::Open { .. } => BreakerState::Open,
            Phase::HalfOpen { .. } => BreakerState::HalfOpen,
        }
    }
}

#[derive(Debug)]
struct Inner {
    phase: Phase,
    counts: Counts,
    generation: u64,
}

/// Three-state admission control for one backend.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    settings: BreakerSettings,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    /// Create a closed breaker.
    ///
    /// A zero `trip_threshold` or `max_half_open_requests` is treated as 1.
    pub fn new(name: impl Into<String>, mut settings: BreakerSettings) -> Self {
        let name = name.into();
        settings.trip_threshold = settings.trip_threshold.max(1);
        settings.max_half_open_requests = settings.max_half_open_requests.max(1);
        metrics::record_breaker_state(&name, BreakerState::Closed);

        Self {
            name,
            settings,
            inner: Mutex::new(Inner {
                phase: Phase::Closed {
                    window_start: Instant::now(),
                },
                counts: Counts::default(),
                generation: 0,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &BreakerSettings {
        &self.settings
    }

    /// Current state, after applying any pending time-based transition.
    pub fn state(&self) -> BreakerState {
        let mut guard = self.lock();
        let inner = &mut *guard;
        self.refresh(inner, Instant::now());
        inner.phase.state()
    }

    /// Counters of the current generation.
    pub fn counts(&self) -> Counts {
        let mut guard = self.lock();
        let inner = &mut *guard;
        self.refresh(inner, Instant::now());
        inner.counts
    }

    /// Ask to forward one call. `None` means the breaker is refusing traffic.
    pub fn try_acquire(&self) -> Option<Ticket> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        self.refresh(inner, Instant::now());

        match &mut inner.phase {
            Phase::Closed { .. } => {}
            Phase::Open { .. } => return None,
            Phase::HalfOpen { in_flight } => {
                let settled = inner.counts.consecutive_successes;
                if in_flight.saturating_add(settled) >= self.settings.max_half_open_requests {
                    return None;
                }
                *in_flight += 1;
            }
        }

        inner.counts.on_request();
        Some(Ticket {
            generation: inner.generation,
        })
    }

    /// The admitted call succeeded.
    pub fn record_success(&self, ticket: Ticket) {
        let now = Instant::now();
        let mut guard = self.lock();
        let inner = &mut *guard;
        self.refresh(inner, now);
        if ticket.generation != inner.generation {
            return;
        }

        inner.counts.on_success();
        if let Phase::HalfOpen { in_flight } = &mut inner.phase {
            *in_flight = in_flight.saturating_sub(1);
            if inner.counts.consecutive_successes >= self.settings.max_half_open_requests {
                self.transition(inner, BreakerState::Closed, now);
            }
        }
    }

    /// The admitted call failed.
    pub fn record_failure(&self, ticket: Ticket) {
        let now = Instant::now();
        let mut guard = self.lock();
        let inner = &mut *guard;
        self.refresh(inner, now);
        if ticket.generation != inner.generation {
            return;
        }

        inner.counts.on_failure();
        match inner.phase {
            Phase::Closed { .. } => {
                if inner.counts.consecutive_failures >= self.settings.trip_threshold {
                    self.transition(inner, BreakerState::Open, now);
                }
            }
            Phase::HalfOpen { .. } => {
                self.transition(inner, BreakerState::Open, now);
            }
            Phase::Open { .. } => {}
        }
    }

    /// The admitted call ended without an outcome (caller went away).
    ///
    /// Frees the half-open trial slot so another call can probe.
    pub fn release(&self, ticket: Ticket) {
        let mut guard = self.lock();
        let inner = &mut *guard;
        self.refresh(inner, Instant::now());
        if ticket.generation != inner.generation {
            return;
        }

        if let Phase::HalfOpen { in_flight } = &mut inner.phase {
            *in_flight = in_flight.saturating_sub(1);
            inner.counts.requests = inner.counts.requests.saturating_sub(1);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply time-based moves: rolling window reset and Open → Half-Open.
    fn refresh(&self, inner: &mut Inner, now: Instant) {
        match inner.phase {
            Phase::Closed { window_start } => {
                let interval = self.settings.interval;
                if !interval.is_zero() && now.saturating_duration_since(window_start) >= interval {
                    inner.generation += 1;
                    inner.counts = Counts::default();
                    inner.phase = Phase::Closed { window_start: now };
                    tracing::trace!(service = %self.name, "Breaker window reset");
                }
            }
            Phase::Open { opened_at } => {
                if now.saturating_duration_since(opened_at) >= self.settings.cool_down {
                    self.transition(inner, BreakerState::HalfOpen, now);
                }
            }
            Phase::HalfOpen { .. } => {}
        }
    }

    fn transition(&self, inner: &mut Inner, to: BreakerState, now: Instant) {
        let from = inner.phase.state();
        inner.generation += 1;
        inner.counts = Counts::default();
        inner.phase = match to {
            BreakerState::Closed => Phase::Closed { window_start: now },
            BreakerState::Open => Phase::Open { opened_at: now },
            BreakerState::HalfOpen => Phase::HalfOpen { in_flight: 0 },
        };

        match to {
            BreakerState::Open => tracing::warn!(
                service = %self.name,
                from = %from,
                cool_down_ms = self.settings.cool_down.as_millis() as u64,
                "Circuit breaker opened"
            ),
            _ => tracing::info!(
                service = %self.name,
                from = %from,
                to = %to,
                "Circuit breaker state changed"
            ),
        }
        metrics::record_breaker_transition(&self.name, to);
    }
}
