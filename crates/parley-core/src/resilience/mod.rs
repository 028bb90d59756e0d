//! Fault-tolerance primitives for the message service.
//!
//! `CircuitBreaker` fails fast once an operation class crosses its failure
//! ratio and probes for recovery after a cooldown. `RetryPolicy` re-runs a
//! transiently failing call with exponential backoff inside a total time
//! budget. Both use `tokio::time` so tests can drive them with a paused
//! clock.

pub mod breaker;
pub mod retry;

pub use breaker::{BreakerSettings, CircuitBreaker, CircuitState, Counts};
pub use retry::RetryPolicy;
