// Retry logic
use crate::domain::Job;
use crate::port::TimeProvider;
use std::sync::Arc;
use tracing::{info, warn};

/// Retry decision result
#[derive(Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the job (with backoff delay in ms)
    Retry(i64),
    /// Do not retry, job has failed permanently
    Failed,
}

/// Retry policy driven by each job's own `attempts` and `backoff` options
pub struct RetryPolicy {
    time_provider: Arc<dyn TimeProvider>,
}

impl RetryPolicy {
    pub fn new(time_provider: Arc<dyn TimeProvider>) -> Self {
        Self { time_provider }
    }

    /// Decide what happens after the current attempt of `job` failed
    ///
    /// Returns:
    /// - `RetryDecision::Retry(delay_ms)` if attempts remain
    /// - `RetryDecision::Failed` if this was the last allowed attempt
    ///
    /// Backoff formula:
    /// fixed: `base`; exponential: `base * 2^(attempt - 1)` where `attempt` is
    /// the 1-based number of the attempt that just failed.
    pub fn should_retry(&self, job: &Job) -> RetryDecision {
        if !job.has_attempts_left() {
            warn!(
                job_id = %job.id,
                attempts_made = job.attempts_made + 1,
                max_attempts = job.options.attempts,
                "Max retry attempts reached"
            );
            return RetryDecision::Failed;
        }

        let attempt = job.attempts_made + 1;
        let delay_ms = job.options.backoff.delay_for(attempt);

        info!(
            job_id = %job.id,
            attempt,
            max_attempts = job.options.attempts,
            delay_ms,
            "Scheduling retry"
        );

        RetryDecision::Retry(delay_ms)
    }

    /// Epoch ms at which a retry scheduled `delay_ms` from now becomes eligible
    pub fn retry_at(&self, delay_ms: i64) -> i64 {
        self.time_provider.now_millis().saturating_add(delay_ms)
    }
}
