//! Exponential backoff retry with a total elapsed-time budget.

use std::future::Future;
use std::time::Duration;

use parley_types::config::RetryConfig;
use parley_types::error::ServiceError;
use tokio::time::Instant;
use tracing::debug;

/// Backoff schedule for retried service calls.
///
/// Waits start at `initial_interval` and grow by `multiplier` up to
/// `max_interval`. Retrying stops when the next wait would push the total
/// elapsed time past `max_elapsed`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub max_elapsed: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            initial_interval: config.initial_interval(),
            max_interval: config.max_interval(),
            max_elapsed: config.max_elapsed(),
            multiplier: config.multiplier.max(1.0),
        }
    }

    fn next_interval(&self, current: Duration) -> Duration {
        current.mul_f64(self.multiplier).min(self.max_interval)
    }

    /// Run `op` until it succeeds, fails permanently, or the budget runs out.
    ///
    /// Exhaustion returns `RetriesExhausted` wrapping the last error.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, ServiceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let started = Instant::now();
        let mut interval = self.initial_interval;
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_permanent() => return Err(e),
                Err(e) => e,
            };

            if started.elapsed() + interval > self.max_elapsed {
                debug!(attempts, error = %err, "retry budget exhausted");
                return Err(ServiceError::RetriesExhausted {
                    attempts,
                    source: Box::new(err),
                });
            }

            debug!(attempts, wait_ms = interval.as_millis() as u64, error = %err, "retrying after transient error");
            tokio::time::sleep(interval).await;
            interval = self.next_interval(interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_types::error::RepositoryError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn transient() -> ServiceError {
        ServiceError::Repository(RepositoryError::Query("database is locked".to_string()))
    }

    #[test]
    fn test_interval_growth_is_capped() {
        let policy = RetryPolicy::default();
        let mut interval = policy.initial_interval;
        let mut seen = vec![interval];
        for _ in 0..12 {
            interval = policy.next_interval(interval);
            seen.push(interval);
        }

        assert_eq!(seen[0], Duration::from_millis(100));
        assert_eq!(seen[1], Duration::from_millis(150));
        assert_eq!(seen[2], Duration::from_millis(225));
        assert!(seen.iter().all(|d| *d <= Duration::from_secs(5)));
        assert_eq!(*seen.last().unwrap(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_transient_failures() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);

        let result = policy
            .run(|| async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(transient())
                } else {
                    Ok("saved")
                }
            })
            .await;

        assert_eq!(result.unwrap(), "saved");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_error_is_not_retried() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = policy
            .run(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ServiceError::NotFound)
            })
            .await;

        assert!(matches!(result, Err(ServiceError::NotFound)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_exhaustion_wraps_last_error() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        let result: Result<(), _> = policy
            .run(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(transient())
            })
            .await;

        let elapsed = started.elapsed();
        match result {
            Err(ServiceError::RetriesExhausted { attempts, source }) => {
                assert_eq!(attempts, calls.load(Ordering::SeqCst));
                assert!(matches!(*source, ServiceError::Repository(_)));
            }
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }

        // 10 growing waits (~11.3s) then 5s waits until the next would pass 60s.
        assert_eq!(calls.load(Ordering::SeqCst), 20);
        assert!(elapsed <= Duration::from_secs(60));
        assert!(elapsed >= Duration::from_secs(55));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_error_message() {
        let policy = RetryPolicy {
            initial_interval: Duration::from_millis(10),
            max_interval: Duration::from_millis(10),
            max_elapsed: Duration::from_millis(25),
            multiplier: 1.0,
        };

        let result: Result<(), _> = policy.run(|| async { Err(transient()) }).await;
        let err = result.unwrap_err();
        assert!(
            err.to_string()
                .starts_with("operation failed after retries: storage error")
        );
    }
}
