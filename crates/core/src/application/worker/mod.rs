// Worker - Job execution loop

pub mod constants;
mod handler;
mod registry;
mod shutdown;

use constants::*;
pub use handler::{JobContext, JobHandler};
pub use registry::{HandlerDeps, JobRegistry};
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use crate::application::retry::{RetryDecision, RetryPolicy};
use crate::domain::{Job, QueueName};
use crate::error::{AppError, Result};
use crate::port::JobBroker;
use std::any::Any;
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Worker processes jobs from one queue
pub struct Worker {
    queue: QueueName,
    broker: Arc<dyn JobBroker>,
    registry: Arc<JobRegistry>,
    retry_policy: Arc<RetryPolicy>,
    lease_ms: i64,
}

impl Worker {
    pub fn new(
        queue: QueueName,
        broker: Arc<dyn JobBroker>,
        registry: Arc<JobRegistry>,
        retry_policy: Arc<RetryPolicy>,
    ) -> Self {
        Self {
            queue,
            broker,
            registry,
            retry_policy,
            lease_ms: DEFAULT_LEASE_MS,
        }
    }

    /// Override how long a dequeued job stays leased to this worker
    pub fn with_lease_ms(mut self, lease_ms: i64) -> Self {
        self.lease_ms = lease_ms;
        self
    }

    /// Run worker loop with graceful shutdown support
    pub async fn run(&self, mut shutdown: ShutdownToken) -> Result<()> {
        info!(queue = %self.queue, "Worker started");
        loop {
            if shutdown.is_shutdown() {
                info!(queue = %self.queue, "Worker shutting down");
                break;
            }
            match self.process_next_job().await {
                Ok(true) => {}
                Ok(false) => {
                    // No job available, sleep briefly (or wait for shutdown)
                    tokio::select! {
                        _ = sleep(IDLE_SLEEP_DURATION) => {},
                        _ = shutdown.wait() => {
                            info!(queue = %self.queue, "Worker interrupted during idle");
                            break;
                        }
                    }
                }
                Err(e) => {
                    error!(queue = %self.queue, error = %e, "Worker error");
                    tokio::select! {
                        _ = sleep(ERROR_RECOVERY_SLEEP_DURATION) => {},
                        _ = shutdown.wait() => {
                            info!(queue = %self.queue, "Worker interrupted during error recovery");
                            break;
                        }
                    }
                }
            }
        }
        info!(queue = %self.queue, "Worker stopped");
        Ok(())
    }

    /// Process next job from queue (returns true if a job was taken)
    pub async fn process_next_job(&self) -> Result<bool> {
        // Dequeue is atomic: the job is already active and leased to us
        let job = match self.broker.dequeue(self.queue, self.lease_ms).await? {
            Some(j) => j,
            None => return Ok(false),
        };

        let kind = job.job_type().kind();
        let handler = match self.registry.get(kind) {
            Some(h) => h,
            None => {
                error!(job_id = %job.id, kind = %kind, "No handler registered, failing job");
                let reason = format!("no handler registered for {}", kind);
                let outcome = self.broker.fail(&job.id, job.lease_token, &reason, None).await;
                self.settle(&job, outcome)?;
                return Ok(true);
            }
        };

        info!(
            job_id = %job.id,
            job_type = %kind.job_type,
            attempt = job.attempts_made + 1,
            "Processing job"
        );

        // Run the handler on its own task so a panic cannot take the worker down
        let ctx = JobContext::new(
            job.id.clone(),
            job.attempts_made + 1,
            job.lease_token,
            Arc::clone(&self.broker),
        );
        let payload = job.payload.clone();
        let handle = tokio::task::spawn(async move { handler.handle(&ctx, &payload).await });

        match handle.await {
            Ok(Ok(result)) => {
                info!(
                    job_id = %job.id,
                    success = result.success,
                    outcome = ?result.outcome,
                    "Job completed"
                );
                let outcome = self.broker.complete(&job.id, job.lease_token, &result).await;
                self.settle(&job, outcome)?;
            }
            Ok(Err(e)) => {
                let outcome = self.fail_attempt(&job, e.to_string()).await;
                self.settle(&job, outcome)?;
            }
            Err(join_err) => {
                let reason = if join_err.is_panic() {
                    format!("handler panicked: {}", panic_message(join_err.into_panic()))
                } else {
                    format!("handler cancelled: {}", join_err)
                };
                error!(job_id = %job.id, reason = %reason, "Job handler aborted");
                let outcome = self.fail_attempt(&job, reason).await;
                self.settle(&job, outcome)?;
            }
        }
        Ok(true)
    }

    async fn fail_attempt(&self, job: &Job, reason: String) -> Result<()> {
        match self.retry_policy.should_retry(job) {
            RetryDecision::Retry(delay_ms) => {
                warn!(
                    job_id = %job.id,
                    attempt = job.attempts_made + 1,
                    delay_ms,
                    error = %reason,
                    "Job attempt failed, will retry"
                );
                let retry_at = self.retry_policy.retry_at(delay_ms);
                self.broker
                    .fail(&job.id, job.lease_token, &reason, Some(retry_at))
                    .await
            }
            RetryDecision::Failed => {
                error!(job_id = %job.id, error = %reason, "Job failed after max retries");
                self.broker
                    .fail(&job.id, job.lease_token, &reason, None)
                    .await
            }
        }
    }

    /// A lost lease means another worker owns the attempt; our outcome is dropped
    fn settle(&self, job: &Job, outcome: Result<()>) -> Result<()> {
        match outcome {
            Err(AppError::LeaseLost(reason)) => {
                warn!(
                    job_id = %job.id,
                    reason = %reason,
                    "Lease lost, discarding attempt outcome"
                );
                Ok(())
            }
            other => other,
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
