//! RPC Request/Response Types
//!
//! Defines the JSON-RPC method parameters and results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tally_core::application::{CustomEmailRequest, LeadUpdate, ReminderRequest};
use tally_core::domain::{
    DocumentDelivery, EnrichmentSignals, JobId, LeadId, LeadStatus, PriorityBand, QueueName,
};

/// Method callers poll for the outcome of an enqueued job
pub const STATUS_METHOD: &str = "job.status.v1";

/// reminder.schedule.v1 - Schedule an invoice reminder
pub type ScheduleReminderRequest = ReminderRequest;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledResponse {
    pub job_id: JobId,
    pub scheduled_for: DateTime<Utc>,
    pub status_method: String,
}

/// reminder.reschedule.v1 - Replace a pending reminder
#[derive(Debug, Deserialize)]
pub struct RescheduleReminderRequest {
    pub existing_job_id: String,
    #[serde(flatten)]
    pub reminder: ReminderRequest,
}

/// email.schedule.v1 - Schedule a free-form email
pub type ScheduleEmailRequest = CustomEmailRequest;

/// job.cancel.v1 - Cancel a pending job
#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub job_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelResponse {
    pub job_id: String,
    pub cancelled: bool,
}

/// document.enqueue.v1 - Render an invoice document
#[derive(Debug, Deserialize)]
pub struct DocumentRequest {
    pub invoice_id: i64,
    pub requested_by: String,
    pub delivery: DocumentDelivery,
}

/// lead.enrich.v1 - Enrich a lead from external signals
#[derive(Debug, Deserialize)]
pub struct EnrichRequest {
    pub lead_id: LeadId,
    #[serde(default)]
    pub signals: EnrichmentSignals,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnqueueResponse {
    pub job_id: JobId,
    pub status_method: String,
}

/// lead.status.v1 - Move a lead along the status graph
#[derive(Debug, Deserialize)]
pub struct LeadStatusRequest {
    pub lead_id: LeadId,
    pub status: LeadStatus,
    #[serde(default)]
    pub note: Option<String>,
}

/// lead.update.v1 - Correct source or value, or attach a note
#[derive(Debug, Deserialize)]
pub struct LeadUpdateRequest {
    pub lead_id: LeadId,
    #[serde(flatten)]
    pub update: LeadUpdate,
}

/// Lead after a status change or detail update
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadStatusResponse {
    pub lead_id: LeadId,
    pub status: LeadStatus,
    pub score: u8,
    pub priority: PriorityBand,
}

/// job.status.v1 - Status of one job
#[derive(Debug, Deserialize)]
pub struct JobStatusRequest {
    pub job_id: String,
}

/// jobs.pending.v1 - Outstanding jobs for one record
#[derive(Debug, Deserialize)]
pub struct PendingJobsRequest {
    pub queue: QueueName,
    pub target_id: i64,
}

/// queue.stats.v1 - Job counts per state
#[derive(Debug, Deserialize)]
pub struct QueueStatsRequest {
    pub queue: QueueName,
}
