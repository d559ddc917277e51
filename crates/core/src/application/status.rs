//! Job Status Service
//!
//! Read-only projection of broker records into caller-facing views. None of
//! these calls fail: broker faults become `status: "error"`, an empty list, or
//! zero counts.

use crate::domain::{Job, JobId, JobPayload, JobResult, JobState, JobType, Outcome, QueueName};
use crate::port::JobBroker;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    NotFound,
    Waiting,
    Delayed,
    Active,
    Completed,
    Failed,
    Error,
}

impl From<JobState> for StatusKind {
    fn from(state: JobState) -> Self {
        match state {
            JobState::Waiting => StatusKind::Waiting,
            JobState::Delayed => StatusKind::Delayed,
            JobState::Active => StatusKind::Active,
            JobState::Completed => StatusKind::Completed,
            JobState::Failed => StatusKind::Failed,
        }
    }
}

fn to_datetime(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
}

/// Caller-facing status of one job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusView {
    pub status: StatusKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_type: Option<JobType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_data: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<JobPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<JobResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempts_made: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_on: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_on: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_for: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobStatusView {
    fn empty(status: StatusKind) -> Self {
        Self {
            status,
            job_id: None,
            job_type: None,
            progress: None,
            progress_data: None,
            data: None,
            result: None,
            outcome: None,
            attempts_made: None,
            created_at: None,
            processed_on: None,
            finished_on: None,
            failed_reason: None,
            scheduled_for: None,
            error: None,
        }
    }

    pub fn not_found() -> Self {
        Self::empty(StatusKind::NotFound)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::empty(StatusKind::Error)
        }
    }

    pub fn from_job(job: &Job) -> Self {
        let outcome = match job.state {
            JobState::Completed => job.result.as_ref().map(|r| r.outcome),
            JobState::Failed => Some(Outcome::Error),
            _ => None,
        };

        Self {
            status: job.state.into(),
            job_id: Some(job.id.clone()),
            job_type: Some(job.job_type()),
            progress: job.progress.as_ref().map(|p| p.percent),
            progress_data: job.progress.as_ref().and_then(|p| p.detail.clone()),
            data: Some(job.payload.clone()),
            result: job.result.clone(),
            outcome,
            attempts_made: Some(job.attempts_made),
            created_at: to_datetime(job.created_at),
            processed_on: job.processed_at.and_then(to_datetime),
            finished_on: job.finished_at.and_then(to_datetime),
            failed_reason: job.failed_reason.clone(),
            scheduled_for: job.scheduled_for().and_then(to_datetime),
            error: None,
        }
    }
}

/// Outstanding job for one record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingJobView {
    pub job_id: JobId,
    pub job_type: JobType,
    pub state: JobState,
    pub data: JobPayload,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_for: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
}

impl From<Job> for PendingJobView {
    fn from(job: Job) -> Self {
        Self {
            job_type: job.job_type(),
            created_at: to_datetime(job.created_at),
            scheduled_for: job.scheduled_for().and_then(to_datetime),
            progress: job.progress.as_ref().map(|p| p.percent),
            job_id: job.id,
            state: job.state,
            data: job.payload,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub waiting: i64,
    pub active: i64,
    pub completed: i64,
    pub failed: i64,
    pub delayed: i64,
}

pub struct JobStatusService {
    broker: Arc<dyn JobBroker>,
}

impl JobStatusService {
    pub fn new(broker: Arc<dyn JobBroker>) -> Self {
        Self { broker }
    }

    pub async fn get_status(&self, job_id: &str) -> JobStatusView {
        match self.broker.get(job_id).await {
            Ok(Some(job)) => JobStatusView::from_job(&job),
            Ok(None) => JobStatusView::not_found(),
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "Status lookup failed");
                JobStatusView::error(e.to_string())
            }
        }
    }

    /// Waiting, delayed and active jobs of `queue` that act on `target_id`
    pub async fn list_jobs_for(&self, queue: QueueName, target_id: i64) -> Vec<PendingJobView> {
        match self.broker.list(queue, &JobState::PENDING).await {
            Ok(jobs) => jobs
                .into_iter()
                .filter(|job| job.payload.target_id() == Some(target_id))
                .map(PendingJobView::from)
                .collect(),
            Err(e) => {
                warn!(queue = %queue, target_id, error = %e, "Pending job scan failed");
                Vec::new()
            }
        }
    }

    pub async fn queue_stats(&self, queue: QueueName) -> QueueStats {
        QueueStats {
            waiting: self.count_or_zero(queue, JobState::Waiting).await,
            active: self.count_or_zero(queue, JobState::Active).await,
            completed: self.count_or_zero(queue, JobState::Completed).await,
            failed: self.count_or_zero(queue, JobState::Failed).await,
            delayed: self.count_or_zero(queue, JobState::Delayed).await,
        }
    }

    async fn count_or_zero(&self, queue: QueueName, state: JobState) -> i64 {
        self.broker.count(queue, state).await.unwrap_or_else(|e| {
            warn!(queue = %queue, state = %state, error = %e, "Queue count failed");
            0
        })
    }
}
