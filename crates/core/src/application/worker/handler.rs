// Job handler contract and per-job context

use crate::domain::{JobId, JobPayload, JobResult, LeaseToken, Progress};
use crate::error::Result;
use crate::port::JobBroker;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// Executes the business action behind one job type.
///
/// `Ok(result)` completes the job (including `success: false` results for
/// conditions retries cannot fix). `Err` fails the attempt and goes through
/// the retry policy.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, ctx: &JobContext, payload: &JobPayload) -> Result<JobResult>;
}

/// Handle a running job uses to talk back to the broker
#[derive(Clone)]
pub struct JobContext {
    job_id: JobId,
    attempt: i32,
    lease: LeaseToken,
    broker: Arc<dyn JobBroker>,
}

impl JobContext {
    pub fn new(
        job_id: impl Into<JobId>,
        attempt: i32,
        lease: LeaseToken,
        broker: Arc<dyn JobBroker>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            attempt,
            lease,
            broker,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// 1-based number of the running attempt
    pub fn attempt(&self) -> i32 {
        self.attempt
    }

    /// Report a progress milestone. Failures are logged and ignored.
    pub async fn progress(&self, percent: u8) {
        self.report(Progress::percent(percent)).await;
    }

    pub async fn report(&self, progress: Progress) {
        debug!(job_id = %self.job_id, percent = progress.percent, "Progress");
        if let Err(e) = self
            .broker
            .update_progress(&self.job_id, self.lease, &progress)
            .await
        {
            warn!(job_id = %self.job_id, error = %e, "Progress update failed");
        }
    }
}
