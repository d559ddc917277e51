//! Job Scheduler (producer side)
//!
//! Turns business intents into correctly-timed, correctly-policed enqueues:
//! - invoice reminders fire `days_before` days ahead of the due date
//! - document generation and lead enrichment run as soon as possible
//! - custom emails carry a caller-chosen delay and priority
//!
//! The scheduler keeps no state of its own; every call is one broker write
//! (rescheduling is one removal plus one write).

use crate::domain::{
    Backoff, CustomEmailPayload, DocumentDelivery, DocumentPayload, EnrichmentPayload,
    EnrichmentSignals, InvoiceReminderPayload, JobId, JobOptions, JobPayload, NewJob, Priority,
    Recipient, Retention, DEFAULT_PRIORITY, PRIORITY_HIGH, PRIORITY_LOW,
};
use crate::error::{AppError, Result};
use crate::port::{JobBroker, TimeProvider};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Days ahead of the due date a reminder fires when the caller does not say
pub const DEFAULT_REMINDER_DAYS_BEFORE: i64 = 2;

const REMINDER_ATTEMPTS: i32 = 3;
const REMINDER_BACKOFF_MS: i64 = 2_000;
const REMINDER_RETENTION: Retention = Retention {
    on_complete: 10,
    on_fail: 5,
};

const DOCUMENT_ATTEMPTS: i32 = 2;
const DOCUMENT_BACKOFF_MS: i64 = 5_000;
const DOCUMENT_RETENTION: Retention = Retention {
    on_complete: 20,
    on_fail: 10,
};

const ENRICHMENT_ATTEMPTS: i32 = 3;
const ENRICHMENT_BACKOFF_MS: i64 = 3_000;
const ENRICHMENT_RETENTION: Retention = Retention {
    on_complete: 15,
    on_fail: 8,
};

fn default_days_before() -> i64 {
    DEFAULT_REMINDER_DAYS_BEFORE
}

/// Invoice reminder request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderRequest {
    pub invoice_id: i64,
    pub recipient: Recipient,
    pub due_at: DateTime<Utc>,
    pub amount: f64,
    #[serde(default)]
    pub invoice_number: Option<String>,
    #[serde(default = "default_days_before")]
    pub days_before: i64,
}

/// Tracking handle for a time-based enqueue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledJob {
    pub job_id: JobId,
    pub scheduled_for: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RescheduledJob {
    pub job_id: JobId,
    pub scheduled_for: DateTime<Utc>,
    /// Whether the previous job was still pending and got removed
    pub replaced: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailPriority {
    High,
    #[default]
    Medium,
    Low,
}

impl EmailPriority {
    pub fn value(&self) -> Priority {
        match self {
            EmailPriority::High => PRIORITY_HIGH,
            EmailPriority::Medium => DEFAULT_PRIORITY,
            EmailPriority::Low => PRIORITY_LOW,
        }
    }
}

/// Free-form email request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomEmailRequest {
    pub message: CustomEmailPayload,
    #[serde(default)]
    pub delay_ms: i64,
    #[serde(default)]
    pub priority: EmailPriority,
    #[serde(default)]
    pub attempts: Option<i32>,
}

/// Fire time of a reminder: `due_at - days_before` days.
///
/// `None` when the result falls outside the representable date range.
pub fn reminder_fire_time(due_at: DateTime<Utc>, days_before: i64) -> Option<DateTime<Utc>> {
    Duration::try_days(days_before).and_then(|offset| due_at.checked_sub_signed(offset))
}

/// Milliseconds from `now` until `scheduled_for`, never negative
pub fn delay_until(scheduled_for: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (scheduled_for - now).num_milliseconds().max(0)
}

pub fn reminder_options(delay_ms: i64) -> JobOptions {
    JobOptions {
        delay_ms,
        attempts: REMINDER_ATTEMPTS,
        backoff: Backoff::exponential(REMINDER_BACKOFF_MS),
        priority: DEFAULT_PRIORITY,
        retention: REMINDER_RETENTION,
    }
}

pub fn document_options() -> JobOptions {
    JobOptions {
        delay_ms: 0,
        attempts: DOCUMENT_ATTEMPTS,
        backoff: Backoff::fixed(DOCUMENT_BACKOFF_MS),
        priority: DEFAULT_PRIORITY,
        retention: DOCUMENT_RETENTION,
    }
}

pub fn enrichment_options() -> JobOptions {
    JobOptions {
        delay_ms: 0,
        attempts: ENRICHMENT_ATTEMPTS,
        backoff: Backoff::exponential(ENRICHMENT_BACKOFF_MS),
        priority: DEFAULT_PRIORITY,
        retention: ENRICHMENT_RETENTION,
    }
}

/// Producer for every job family
pub struct JobScheduler {
    broker: Arc<dyn JobBroker>,
    time_provider: Arc<dyn TimeProvider>,
}

impl JobScheduler {
    pub fn new(broker: Arc<dyn JobBroker>, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            broker,
            time_provider,
        }
    }

    async fn submit(&self, payload: JobPayload, options: JobOptions) -> Result<JobId> {
        options.validate()?;
        let job = NewJob::new(payload, options);
        let queue = job.queue;
        let job_type = job.job_type();
        let job_id = self.broker.enqueue(job).await?;
        info!(
            job_id = %job_id,
            queue = %queue,
            job_type = %job_type,
            "Job enqueued"
        );
        Ok(job_id)
    }

    /// Schedule a payment reminder ahead of the invoice due date.
    ///
    /// Calling this twice for one invoice produces two jobs; cancel the old one
    /// (or use [`Self::reschedule_invoice_reminder`]) to replace it.
    pub async fn schedule_invoice_reminder(&self, req: ReminderRequest) -> Result<ScheduledJob> {
        if req.days_before < 0 {
            return Err(AppError::Validation(format!(
                "days_before must not be negative (got {})",
                req.days_before
            )));
        }
        if req.recipient.email.trim().is_empty() {
            return Err(AppError::Validation(
                "recipient email must not be empty".to_string(),
            ));
        }
        if !req.amount.is_finite() || req.amount < 0.0 {
            return Err(AppError::Validation(format!(
                "amount must be a non-negative number (got {})",
                req.amount
            )));
        }

        let now = self.time_provider.now();
        let scheduled_for = reminder_fire_time(req.due_at, req.days_before).ok_or_else(|| {
            AppError::Validation(format!(
                "days_before {} is out of range for due date {}",
                req.days_before, req.due_at
            ))
        })?;
        let delay_ms = delay_until(scheduled_for, now);

        let payload = JobPayload::InvoiceReminder(InvoiceReminderPayload {
            invoice_id: req.invoice_id,
            recipient: req.recipient,
            due_at: req.due_at,
            amount: req.amount,
            invoice_number: req.invoice_number,
        });
        let job_id = self.submit(payload, reminder_options(delay_ms)).await?;

        info!(
            job_id = %job_id,
            invoice_id = req.invoice_id,
            scheduled_for = %scheduled_for,
            delay_ms,
            "Invoice reminder scheduled"
        );
        Ok(ScheduledJob {
            job_id,
            scheduled_for,
        })
    }

    /// Cancel `existing_job_id` (if still pending) and schedule afresh
    pub async fn reschedule_invoice_reminder(
        &self,
        existing_job_id: &str,
        req: ReminderRequest,
    ) -> Result<RescheduledJob> {
        let replaced = self.cancel(existing_job_id).await;
        let scheduled = self.schedule_invoice_reminder(req).await?;
        Ok(RescheduledJob {
            job_id: scheduled.job_id,
            scheduled_for: scheduled.scheduled_for,
            replaced,
        })
    }

    /// Remove a job that no worker has picked up yet.
    ///
    /// Returns `false` for active, finished or unknown jobs and on broker errors.
    pub async fn cancel(&self, job_id: &str) -> bool {
        match self.broker.remove_pending(job_id).await {
            Ok(removed) => {
                info!(job_id = %job_id, removed, "Cancel requested");
                removed
            }
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "Cancel failed");
                false
            }
        }
    }

    pub async fn enqueue_document_generation(
        &self,
        invoice_id: i64,
        requested_by: impl Into<String>,
        delivery: DocumentDelivery,
    ) -> Result<JobId> {
        if let DocumentDelivery::Email { recipient } = &delivery {
            if recipient.trim().is_empty() {
                return Err(AppError::Validation(
                    "email delivery needs a recipient".to_string(),
                ));
            }
        }
        let payload = JobPayload::DocumentGeneration(DocumentPayload {
            invoice_id,
            requested_by: requested_by.into(),
            delivery,
        });
        self.submit(payload, document_options()).await
    }

    pub async fn enqueue_enrichment(
        &self,
        lead_id: i64,
        signals: EnrichmentSignals,
    ) -> Result<JobId> {
        if let Some(value) = signals.estimated_value {
            if !value.is_finite() || value < 0.0 {
                return Err(AppError::Validation(format!(
                    "estimated_value must be a non-negative amount (got {})",
                    value
                )));
            }
        }
        let payload = JobPayload::LeadEnrichment(EnrichmentPayload { lead_id, signals });
        self.submit(payload, enrichment_options()).await
    }

    /// Free-form email on the reminders queue
    pub async fn schedule_custom_email(&self, req: CustomEmailRequest) -> Result<ScheduledJob> {
        if req.message.to.trim().is_empty() {
            return Err(AppError::Validation(
                "recipient must not be empty".to_string(),
            ));
        }
        if req.message.text.is_none() && req.message.html.is_none() {
            return Err(AppError::Validation(
                "email needs a text or html body".to_string(),
            ));
        }

        let mut options = reminder_options(req.delay_ms);
        options.attempts = req.attempts.unwrap_or(REMINDER_ATTEMPTS);
        options.priority = req.priority.value();
        options.validate()?;

        let scheduled_for = self
            .time_provider
            .now()
            .checked_add_signed(Duration::milliseconds(options.delay_ms))
            .ok_or_else(|| {
                AppError::Validation(format!("delay of {}ms is out of range", options.delay_ms))
            })?;

        let job_id = self
            .submit(JobPayload::CustomEmail(req.message), options)
            .await?;
        Ok(ScheduledJob {
            job_id,
            scheduled_for,
        })
    }
}
