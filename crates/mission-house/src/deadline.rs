//! Deadlines threaded through every suspension point.
//!
//! A flow receives one [`Deadline`] for the whole invocation. Each await on
//! the network or the browser is bounded by the earlier of the step's own
//! timeout and the remaining budget, so reaching the deadline cancels the
//! current step and surfaces [`AcquireError::Timeout`].

use crate::error::{AcquireError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// An absolute point in time after which work must stop.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
    started: Instant,
}

impl Deadline {
    /// A deadline `budget` from now.
    pub fn after(budget: Duration) -> Self {
        let now = Instant::now();
        Self {
            at: now + budget,
            started: now,
        }
    }

    /// Time left before the deadline (zero once passed).
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.at
    }

    /// Time since the deadline was created.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// The earlier of this deadline and `step` from now.
    pub fn narrow(&self, step: Duration) -> Deadline {
        let candidate = Instant::now() + step;
        Deadline {
            at: candidate.min(self.at),
            started: Instant::now(),
        }
    }

    /// Run `fut` until it completes or the deadline passes.
    pub async fn run<T, F>(&self, stage: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout_at(self.at, fut).await {
            Ok(result) => result,
            Err(_) => Err(AcquireError::timeout(stage, self.elapsed())),
        }
    }

    /// Like [`Deadline::run`] but additionally bounded by `step`.
    pub async fn run_step<T, F>(&self, stage: &str, step: Duration, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.narrow(step).run(stage, fut).await
    }

    /// Sleep for `dur`, or fail with `Timeout` if the deadline comes first.
    pub async fn sleep(&self, stage: &str, dur: Duration) -> Result<()> {
        if Instant::now() + dur > self.at {
            tokio::time::sleep_until(self.at).await;
            return Err(AcquireError::timeout(stage, self.elapsed()));
        }
        tokio::time::sleep(dur).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_run_times_out() {
        let deadline = Deadline::after(Duration::from_millis(100));
        let result: Result<()> = deadline
            .run("slow step", async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        match result {
            Err(AcquireError::Timeout { stage, .. }) => assert_eq!(stage, "slow step"),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_narrow_takes_earlier_bound() {
        let deadline = Deadline::after(Duration::from_secs(60));
        let step = deadline.narrow(Duration::from_secs(1));
        assert!(step.remaining() <= Duration::from_secs(1));

        let tight = Deadline::after(Duration::from_millis(10));
        assert!(tight.narrow(Duration::from_secs(30)).remaining() <= Duration::from_millis(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_past_deadline_fails() {
        let deadline = Deadline::after(Duration::from_millis(50));
        assert!(deadline.sleep("wait", Duration::from_millis(10)).await.is_ok());
        assert!(deadline.sleep("wait", Duration::from_secs(1)).await.is_err());
        assert!(deadline.is_expired());
    }
}
