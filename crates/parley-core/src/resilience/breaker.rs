//! Circuit breaker guarding one class of service operations.
//!
//! Counts requests and outcomes in a rolling window. While `Closed`, the
//! window resets every `interval`; the breaker trips to `Open` once the
//! window holds at least `min_requests` calls with a failure ratio at or
//! above `failure_ratio`. `Open` rejects calls without running them until
//! `open_timeout` elapses, then moves to `HalfOpen`, which admits up to
//! `half_open_max_requests` trial calls. The first successful trial closes
//! the breaker; a failed trial reopens it.
//!
//! Every state change starts a new generation. Outcomes reported for a call
//! admitted under an older generation are discarded.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use parley_types::config::BreakerConfig;
use parley_types::error::ServiceError;
use tokio::time::Instant;
use tracing::{debug, info};

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation. Calls pass through and outcomes are counted.
    Closed,
    /// Tripped. Calls are rejected until the open timeout elapses.
    Open,
    /// Probing: a limited number of trial calls are admitted.
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        };
        f.write_str(s)
    }
}

/// Request and outcome counts for the current generation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Counts {
    pub requests: u32,
    pub total_successes: u32,
    pub total_failures: u32,
    pub consecutive_successes: u32,
    pub consecutive_failures: u32,
}

impl Counts {
    fn on_request(&mut self) {
        self.requests += 1;
    }

    fn on_success(&mut self) {
        self.total_successes += 1;
        self.consecutive_successes += 1;
        self.consecutive_failures = 0;
    }

    fn on_failure(&mut self) {
        self.total_failures += 1;
        self.consecutive_failures += 1;
        self.consecutive_successes = 0;
    }
}

/// Tuning for a single breaker.
#[derive(Debug, Clone)]
pub struct BreakerSettings {
    pub name: String,
    pub half_open_max_requests: u32,
    /// Closed-state window length. `Duration::ZERO` never resets counts.
    pub interval: Duration,
    pub open_timeout: Duration,
    pub min_requests: u32,
    pub failure_ratio: f64,
}

impl BreakerSettings {
    /// Build settings for the breaker named `{config.name}-{suffix}`.
    pub fn from_config(config: &BreakerConfig, suffix: &str) -> Self {
        Self {
            name: format!("{}-{}", config.name, suffix),
            half_open_max_requests: config.half_open_max_requests.max(1),
            interval: config.interval(),
            open_timeout: config.open_timeout(),
            min_requests: config.min_requests,
            failure_ratio: config.failure_ratio,
        }
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    generation: u64,
    counts: Counts,
    /// Closed: when the window resets. Open: when trials begin.
    expiry: Option<Instant>,
}

/// Ratio-based circuit breaker.
///
/// The mutex is held only for bookkeeping, never across the guarded call.
#[derive(Debug)]
pub struct CircuitBreaker {
    settings: BreakerSettings,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(settings: BreakerSettings) -> Self {
        let expiry = (!settings.interval.is_zero()).then(|| Instant::now() + settings.interval);
        Self {
            settings,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                generation: 0,
                counts: Counts::default(),
                expiry,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.settings.name
    }

    /// Current state, applying any time-based transition that is due.
    pub fn state(&self) -> CircuitState {
        let mut inner = self.lock();
        self.current_state(&mut inner, Instant::now());
        inner.state
    }

    /// Counts for the current generation.
    pub fn counts(&self) -> Counts {
        let mut inner = self.lock();
        self.current_state(&mut inner, Instant::now());
        inner.counts
    }

    /// Run `op` under the breaker.
    ///
    /// Returns `CircuitOpen` or `TooManyRequests` without invoking `op` when
    /// the breaker refuses the call. Permanent errors are passed through and
    /// recorded as successes: the dependency answered. A call whose future
    /// is dropped before `op` completes records no outcome and frees its slot.
    pub async fn call<T, F, Fut>(&self, op: F) -> Result<T, ServiceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let generation = self.before_call()?;
        let mut admitted = Admitted {
            breaker: self,
            generation,
            settled: false,
        };
        let result = op().await;
        let success = match &result {
            Ok(_) => true,
            Err(e) => e.is_permanent(),
        };
        admitted.settled = true;
        self.after_call(generation, success);
        result
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerInner> {
        self.inner.lock().expect("circuit breaker lock poisoned")
    }

    fn before_call(&self) -> Result<u64, ServiceError> {
        let mut inner = self.lock();
        self.current_state(&mut inner, Instant::now());

        match inner.state {
            CircuitState::Open => {
                return Err(ServiceError::CircuitOpen(self.settings.name.clone()));
            }
            CircuitState::HalfOpen
                if inner.counts.requests >= self.settings.half_open_max_requests =>
            {
                return Err(ServiceError::TooManyRequests(self.settings.name.clone()));
            }
            _ => {}
        }

        inner.counts.on_request();
        Ok(inner.generation)
    }

    fn after_call(&self, admitted_generation: u64, success: bool) {
        let mut inner = self.lock();
        let now = Instant::now();
        self.current_state(&mut inner, now);
        if inner.generation != admitted_generation {
            return;
        }

        match (inner.state, success) {
            (CircuitState::Closed, true) => inner.counts.on_success(),
            (CircuitState::Closed, false) => {
                inner.counts.on_failure();
                if self.ready_to_trip(&inner.counts) {
                    self.set_state(&mut inner, CircuitState::Open, now);
                }
            }
            (CircuitState::HalfOpen, true) => {
                inner.counts.on_success();
                self.set_state(&mut inner, CircuitState::Closed, now);
            }
            (CircuitState::HalfOpen, false) => {
                self.set_state(&mut inner, CircuitState::Open, now);
            }
            (CircuitState::Open, _) => {}
        }
    }

    /// Give back the slot of a call that was dropped before it finished.
    fn release(&self, admitted_generation: u64) {
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        self.current_state(&mut inner, Instant::now());
        if inner.generation == admitted_generation {
            inner.counts.requests = inner.counts.requests.saturating_sub(1);
        }
    }

    fn ready_to_trip(&self, counts: &Counts) -> bool {
        counts.requests >= self.settings.min_requests
            && f64::from(counts.total_failures) / f64::from(counts.requests)
                >= self.settings.failure_ratio
    }

    fn current_state(&self, inner: &mut BreakerInner, now: Instant) {
        match inner.state {
            CircuitState::Closed => {
                if inner.expiry.is_some_and(|expiry| expiry <= now) {
                    self.new_generation(inner, now);
                }
            }
            CircuitState::Open => {
                if inner.expiry.is_some_and(|expiry| expiry <= now) {
                    self.set_state(inner, CircuitState::HalfOpen, now);
                }
            }
            CircuitState::HalfOpen => {}
        }
    }

    fn set_state(&self, inner: &mut BreakerInner, state: CircuitState, now: Instant) {
        if inner.state == state {
            return;
        }
        let from = inner.state;
        inner.state = state;
        self.new_generation(inner, now);

        info!(
            breaker = %self.settings.name,
            %from,
            to = %state,
            "circuit breaker state changed"
        );
    }

    fn new_generation(&self, inner: &mut BreakerInner, now: Instant) {
        inner.generation += 1;
        inner.counts = Counts::default();
        inner.expiry = match inner.state {
            CircuitState::Closed if !self.settings.interval.is_zero() => {
                Some(now + self.settings.interval)
            }
            CircuitState::Closed | CircuitState::HalfOpen => None,
            CircuitState::Open => Some(now + self.settings.open_timeout),
        };
    }
}

/// A call admitted by [`CircuitBreaker::call`] that has not reported back.
///
/// If the caller's future is dropped mid-call, the request is uncounted so
/// half-open trial slots are not lost.
struct Admitted<'a> {
    breaker: &'a CircuitBreaker,
    generation: u64,
    settled: bool,
}

impl Drop for Admitted<'_> {
    fn drop(&mut self) {
        if !self.settled {
            debug!(breaker = %self.breaker.settings.name, "call dropped before completion");
            self.breaker.release(self.generation);
        }
    }
}
