// Job Domain Model

use crate::domain::error::DomainError;
use crate::domain::payload::{JobPayload, JobResult};
use crate::domain::queue::{JobType, QueueName};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Broker-assigned job identifier (opaque)
pub type JobId = String;

/// Fencing token of a lease; grows by one on every dequeue and reclaim
pub type LeaseToken = i64;

/// Priority (lower number = served first)
pub type Priority = i32;

pub const PRIORITY_HIGH: Priority = 1;
pub const DEFAULT_PRIORITY: Priority = 5;
pub const PRIORITY_LOW: Priority = 10;

/// Largest exponent applied by exponential backoff; keeps the delay from overflowing
const MAX_BACKOFF_EXPONENT: i32 = 30;

/// Longest accepted enqueue delay (ten years)
pub const MAX_DELAY_MS: i64 = 10 * 365 * 24 * 60 * 60 * 1000;

/// Job State (broker-owned)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Waiting,
    Delayed,
    Active,
    Completed,
    Failed,
}

impl JobState {
    pub const ALL: [JobState; 5] = [
        JobState::Waiting,
        JobState::Delayed,
        JobState::Active,
        JobState::Completed,
        JobState::Failed,
    ];

    /// States scanned when looking for outstanding work
    pub const PENDING: [JobState; 3] = [JobState::Waiting, JobState::Delayed, JobState::Active];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Waiting => "waiting",
            JobState::Delayed => "delayed",
            JobState::Active => "active",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }

    /// Only jobs that no worker has picked up yet can be removed
    pub fn is_cancellable(&self) -> bool {
        matches!(self, JobState::Waiting | JobState::Delayed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobState {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| DomainError::ValidationError(format!("Unknown job state: {}", s)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffKind {
    Fixed,
    Exponential,
}

/// Wait-time growth strategy between retry attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backoff {
    pub kind: BackoffKind,
    pub base_ms: i64,
}

impl Backoff {
    pub fn fixed(base_ms: i64) -> Self {
        Self {
            kind: BackoffKind::Fixed,
            base_ms,
        }
    }

    pub fn exponential(base_ms: i64) -> Self {
        Self {
            kind: BackoffKind::Exponential,
            base_ms,
        }
    }

    /// Delay before the next attempt, given how many attempts already failed.
    ///
    /// Exponential: `base * 2^(attempts_made - 1)`, so the first retry waits `base`.
    pub fn delay_for(&self, attempts_made: i32) -> i64 {
        match self.kind {
            BackoffKind::Fixed => self.base_ms,
            BackoffKind::Exponential => {
                let exponent = (attempts_made - 1).clamp(0, MAX_BACKOFF_EXPONENT);
                self.base_ms.saturating_mul(1_i64 << exponent)
            }
        }
    }
}

/// How many terminal jobs of each outcome a queue keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Retention {
    pub on_complete: u32,
    pub on_fail: u32,
}

impl Retention {
    pub fn keep(on_complete: u32, on_fail: u32) -> Self {
        Self {
            on_complete,
            on_fail,
        }
    }
}

/// Per-job delivery policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOptions {
    pub delay_ms: i64,
    pub attempts: i32,
    pub backoff: Backoff,
    pub priority: Priority,
    pub retention: Retention,
}

impl JobOptions {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.delay_ms < 0 {
            return Err(DomainError::InvalidJobOptions(format!(
                "delay must not be negative (got {}ms)",
                self.delay_ms
            )));
        }
        if self.delay_ms > MAX_DELAY_MS {
            return Err(DomainError::InvalidJobOptions(format!(
                "delay must not exceed {}ms (got {}ms)",
                MAX_DELAY_MS, self.delay_ms
            )));
        }
        if self.attempts < 1 {
            return Err(DomainError::InvalidJobOptions(format!(
                "attempts must be at least 1 (got {})",
                self.attempts
            )));
        }
        if self.backoff.base_ms < 0 {
            return Err(DomainError::InvalidJobOptions(format!(
                "backoff base must not be negative (got {}ms)",
                self.backoff.base_ms
            )));
        }
        Ok(())
    }
}

/// Enqueue request handed to the broker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewJob {
    pub queue: QueueName,
    pub payload: JobPayload,
    pub options: JobOptions,
}

impl NewJob {
    /// Queue is derived from the payload's job type
    pub fn new(payload: JobPayload, options: JobOptions) -> Self {
        Self {
            queue: payload.job_type().queue(),
            payload,
            options,
        }
    }

    pub fn job_type(&self) -> JobType {
        self.payload.job_type()
    }
}

/// Progress reported by a handler, normalized to one shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub percent: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<Map<String, Value>>,
}

impl Progress {
    pub fn percent(percent: u8) -> Self {
        Self {
            percent: percent.min(100),
            detail: None,
        }
    }

    pub fn with_detail(percent: u8, detail: Map<String, Value>) -> Self {
        Self {
            percent: percent.min(100),
            detail: Some(detail),
        }
    }

    /// Normalize a loosely-typed progress value.
    ///
    /// A bare number becomes `percent`. An object is kept as `detail`, and
    /// `percent` is taken from its numeric `progress` (or `percent`) field, else 0.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Number(n) => Self::percent(clamp_percent(n.as_f64().unwrap_or(0.0))),
            Value::Object(map) => {
                let percent = map
                    .get("progress")
                    .or_else(|| map.get("percent"))
                    .and_then(Value::as_f64)
                    .map(clamp_percent)
                    .unwrap_or(0);
                Self::with_detail(percent, map.clone())
            }
            _ => Self::percent(0),
        }
    }
}

fn clamp_percent(raw: f64) -> u8 {
    if raw.is_nan() {
        return 0;
    }
    raw.round().clamp(0.0, 100.0) as u8
}

/// Job Entity (broker record)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub queue: QueueName,
    pub payload: JobPayload,
    pub options: JobOptions,
    pub state: JobState,

    pub attempts_made: i32,
    pub failed_reason: Option<String>,
    pub progress: Option<Progress>,
    pub result: Option<JobResult>,

    pub created_at: i64, // epoch ms
    pub run_at: i64,     // epoch ms, eligible for dequeue from here on
    pub processed_at: Option<i64>,
    pub finished_at: Option<i64>,
    pub lease_expires_at: Option<i64>,
    pub lease_token: LeaseToken,
}

impl Job {
    /// Materialize a broker record for a fresh enqueue
    ///
    /// # Arguments
    ///
    /// * `id` - Unique job ID (injected, not generated)
    /// * `created_at` - Creation timestamp in epoch ms (injected, not system time)
    /// * `new_job` - Enqueue request
    pub fn from_new(id: impl Into<String>, created_at: i64, new_job: NewJob) -> Self {
        let delay_ms = new_job.options.delay_ms.max(0);
        let state = if delay_ms > 0 {
            JobState::Delayed
        } else {
            JobState::Waiting
        };

        Self {
            id: id.into(),
            queue: new_job.queue,
            payload: new_job.payload,
            options: new_job.options,
            state,
            attempts_made: 0,
            failed_reason: None,
            progress: None,
            result: None,
            created_at,
            run_at: created_at.saturating_add(delay_ms),
            processed_at: None,
            finished_at: None,
            lease_expires_at: None,
            lease_token: 0,
        }
    }

    pub fn job_type(&self) -> JobType {
        self.payload.job_type()
    }

    /// Derived `created_at + delay`; only for jobs created with a non-zero delay
    pub fn scheduled_for(&self) -> Option<i64> {
        let delay_ms = self.options.delay_ms;
        (delay_ms > 0).then(|| self.created_at.saturating_add(delay_ms))
    }

    /// True when a failure of the current attempt still leaves room for a retry
    pub fn has_attempts_left(&self) -> bool {
        self.attempts_made + 1 < self.options.attempts
    }
}
