//! Bounded retries with backoff, shared by every flow.
//!
//! A [`RetryPolicy`] is a plain value: attempt limit, base delay, backoff
//! shape and a predicate deciding which errors deserve another attempt.
//! [`RetryPolicy::run`] drives any fallible async operation under it and
//! wraps the final failure in [`AcquireError::RetriesExhausted`].

pub mod diagnostics;

pub use diagnostics::DiagnosticsCapture;

use crate::config::RetryConfig;
use crate::error::{AcquireError, Result};
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

/// Default number of attempts, the first one included.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// How the delay grows between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// `base_delay` before every retry.
    Constant,
    /// `2^(attempt-1) × base_delay` after failed attempt `attempt`.
    Exponential,
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep for the delay, then try again.
    Retry(Duration),
    /// Stop and escalate.
    GiveUp,
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff: Backoff,
    retryable: fn(&AcquireError) -> bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, Duration::from_secs(2))
    }
}

impl RetryPolicy {
    /// Exponential policy retrying whatever [`AcquireError::is_retryable`] allows.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            backoff: Backoff::Exponential,
            retryable: AcquireError::is_retryable,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, config.base_delay())
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Replace the retryable-error predicate.
    pub fn with_retryable(mut self, predicate: fn(&AcquireError) -> bool) -> Self {
        self.retryable = predicate;
        self
    }

    /// Delay to wait after failed attempt `attempt` (1-based).
    ///
    /// Exponential backoff waits `2^(attempt - 1) × base_delay`: with the
    /// default 2 s base, 2 s after the first failure and 4 s after the
    /// second.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Constant => self.base_delay,
            Backoff::Exponential => {
                let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
                self.base_delay.saturating_mul(factor)
            }
        }
    }

    pub fn decide(&self, attempt: u32, error: &AcquireError) -> RetryDecision {
        if attempt >= self.max_attempts || !(self.retryable)(error) {
            RetryDecision::GiveUp
        } else {
            RetryDecision::Retry(self.delay_for(attempt))
        }
    }

    /// Run `op` until it succeeds or the policy gives up.
    ///
    /// `op` receives the 1-based attempt number. On success returns the
    /// value with the number of attempts used.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<(T, u32)>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        info!("{label} succeeded on attempt {attempt}");
                    }
                    return Ok((value, attempt));
                }
                Err(e) => match self.decide(attempt, &e) {
                    RetryDecision::Retry(delay) => {
                        warn!(
                            "{label} attempt {attempt}/{} failed: {e}; retrying in {}ms",
                            self.max_attempts,
                            delay.as_millis()
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    RetryDecision::GiveUp => {
                        warn!("{label} giving up after {attempt} attempt(s): {e}");
                        return Err(AcquireError::RetriesExhausted {
                            flow: label.to_string(),
                            attempts: attempt,
                            last: Box::new(e),
                        });
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn flaky(failures: u32) -> (AtomicU32, u32) {
        (AtomicU32::new(0), failures)
    }

    async fn run_flaky(policy: &RetryPolicy, failures: u32) -> Result<(u32, u32)> {
        let (calls, n) = flaky(failures);
        policy
            .run("flaky", |attempt| {
                let seen = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    assert_eq!(seen, attempt);
                    if attempt <= n {
                        Err(AcquireError::Network("connection reset".into()))
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await
    }

    #[test]
    fn test_exponential_delays() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(3), Duration::from_secs(8));
    }

    #[test]
    fn test_constant_backoff() {
        let policy = RetryPolicy::new(5, Duration::from_millis(300)).with_backoff(Backoff::Constant);
        assert_eq!(policy.delay_for(4), Duration::from_millis(300));
    }

    #[test]
    fn test_decide_respects_limit_and_predicate() {
        let policy = RetryPolicy::default();
        let net = AcquireError::Network("x".into());
        assert_eq!(policy.decide(1, &net), RetryDecision::Retry(Duration::from_secs(2)));
        assert_eq!(policy.decide(3, &net), RetryDecision::GiveUp);

        let http = AcquireError::Http { status: 404, url: "u".into() };
        assert_eq!(policy.decide(1, &http), RetryDecision::GiveUp);

        let strict = policy.with_retryable(|_| false);
        assert_eq!(strict.decide(1, &net), RetryDecision::GiveUp);
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_failures_then_success() {
        let policy = RetryPolicy::default();
        for failures in 0..=2 {
            let (value, attempts) = run_flaky(&policy, failures).await.unwrap();
            assert_eq!(attempts, failures + 1);
            assert_eq!(value, failures + 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_three_failures_exhaust() {
        let policy = RetryPolicy::default();
        for failures in 3..=5 {
            let err = run_flaky(&policy, failures).await.unwrap_err();
            assert_eq!(err.attempts(), Some(3));
            assert!(matches!(err.root(), AcquireError::Network(_)));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_sleeps_between_attempts() {
        let policy = RetryPolicy::default();
        let start = tokio::time::Instant::now();
        let _ = run_flaky(&policy, 2).await.unwrap();
        // 2s after the first failure, 4s after the second.
        assert!(start.elapsed() >= Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_escalates_immediately() {
        let policy = RetryPolicy::default();
        let err = policy
            .run("fatal", |_| async {
                Err::<(), _>(AcquireError::Validation {
                    errors: vec!["Address is required".into()],
                })
            })
            .await
            .unwrap_err();
        assert_eq!(err.attempts(), Some(1));
        assert!(matches!(err.root(), AcquireError::Validation { .. }));
    }
}
