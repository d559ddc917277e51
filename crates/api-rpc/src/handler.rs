//! RPC Method Handlers
//!
//! Thin adapters from JSON-RPC params to the application services.

use crate::error::to_rpc_error;
use crate::types::{
    CancelRequest, CancelResponse, DocumentRequest, EnqueueResponse, EnrichRequest,
    JobStatusRequest, LeadStatusRequest, LeadStatusResponse, LeadUpdateRequest,
    PendingJobsRequest, QueueStatsRequest, RescheduleReminderRequest, ScheduleEmailRequest,
    ScheduleReminderRequest, ScheduledResponse, STATUS_METHOD,
};
use jsonrpsee::types::ErrorObjectOwned;
use std::sync::Arc;
use tally_core::application::{
    JobScheduler, JobStatusService, JobStatusView, LeadService, PendingJobView, QueueStats,
    RescheduledJob, ScheduledJob,
};
use tally_core::domain::{priority_band, JobId, Lead};
use tally_core::port::{JobBroker, LeadStore, TimeProvider};
use tracing::info;

/// RPC Handler with injected dependencies
pub struct RpcHandler {
    scheduler: JobScheduler,
    status: JobStatusService,
    leads: LeadService,
}

fn scheduled(job: ScheduledJob) -> ScheduledResponse {
    ScheduledResponse {
        job_id: job.job_id,
        scheduled_for: job.scheduled_for,
        status_method: STATUS_METHOD.to_string(),
    }
}

fn lead_summary(lead: Lead) -> LeadStatusResponse {
    LeadStatusResponse {
        lead_id: lead.id,
        status: lead.status,
        score: lead.score,
        priority: priority_band(lead.score),
    }
}

fn enqueued(job_id: JobId) -> EnqueueResponse {
    EnqueueResponse {
        job_id,
        status_method: STATUS_METHOD.to_string(),
    }
}

impl RpcHandler {
    pub fn new(
        broker: Arc<dyn JobBroker>,
        leads: Arc<dyn LeadStore>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            scheduler: JobScheduler::new(broker.clone(), time_provider.clone()),
            status: JobStatusService::new(broker),
            leads: LeadService::new(leads, time_provider),
        }
    }

    /// reminder.schedule.v1
    pub async fn schedule_reminder(
        &self,
        params: ScheduleReminderRequest,
    ) -> Result<ScheduledResponse, ErrorObjectOwned> {
        let job = self
            .scheduler
            .schedule_invoice_reminder(params)
            .await
            .map_err(to_rpc_error)?;
        Ok(scheduled(job))
    }

    /// reminder.reschedule.v1
    pub async fn reschedule_reminder(
        &self,
        params: RescheduleReminderRequest,
    ) -> Result<RescheduledJob, ErrorObjectOwned> {
        self.scheduler
            .reschedule_invoice_reminder(&params.existing_job_id, params.reminder)
            .await
            .map_err(to_rpc_error)
    }

    /// email.schedule.v1
    pub async fn schedule_email(
        &self,
        params: ScheduleEmailRequest,
    ) -> Result<ScheduledResponse, ErrorObjectOwned> {
        let job = self
            .scheduler
            .schedule_custom_email(params)
            .await
            .map_err(to_rpc_error)?;
        Ok(scheduled(job))
    }

    /// job.cancel.v1
    pub async fn cancel(&self, params: CancelRequest) -> Result<CancelResponse, ErrorObjectOwned> {
        let cancelled = self.scheduler.cancel(&params.job_id).await;
        Ok(CancelResponse {
            job_id: params.job_id,
            cancelled,
        })
    }

    /// document.enqueue.v1
    pub async fn enqueue_document(
        &self,
        params: DocumentRequest,
    ) -> Result<EnqueueResponse, ErrorObjectOwned> {
        let job_id = self
            .scheduler
            .enqueue_document_generation(params.invoice_id, params.requested_by, params.delivery)
            .await
            .map_err(to_rpc_error)?;
        Ok(enqueued(job_id))
    }

    /// lead.enrich.v1
    pub async fn enrich_lead(
        &self,
        params: EnrichRequest,
    ) -> Result<EnqueueResponse, ErrorObjectOwned> {
        let job_id = self
            .scheduler
            .enqueue_enrichment(params.lead_id, params.signals)
            .await
            .map_err(to_rpc_error)?;
        Ok(enqueued(job_id))
    }

    /// lead.status.v1
    pub async fn change_lead_status(
        &self,
        params: LeadStatusRequest,
    ) -> Result<LeadStatusResponse, ErrorObjectOwned> {
        let lead = self
            .leads
            .change_status(params.lead_id, params.status, params.note)
            .await
            .map_err(to_rpc_error)?;

        info!(lead_id = lead.id, status = %lead.status, "Lead status changed via RPC");
        Ok(lead_summary(lead))
    }

    /// lead.update.v1
    pub async fn update_lead(
        &self,
        params: LeadUpdateRequest,
    ) -> Result<LeadStatusResponse, ErrorObjectOwned> {
        let lead = self
            .leads
            .update_details(params.lead_id, params.update)
            .await
            .map_err(to_rpc_error)?;

        info!(lead_id = lead.id, score = lead.score, "Lead details updated via RPC");
        Ok(lead_summary(lead))
    }

    /// job.status.v1
    pub async fn job_status(
        &self,
        params: JobStatusRequest,
    ) -> Result<JobStatusView, ErrorObjectOwned> {
        Ok(self.status.get_status(&params.job_id).await)
    }

    /// jobs.pending.v1
    pub async fn pending_jobs(
        &self,
        params: PendingJobsRequest,
    ) -> Result<Vec<PendingJobView>, ErrorObjectOwned> {
        Ok(self
            .status
            .list_jobs_for(params.queue, params.target_id)
            .await)
    }

    /// queue.stats.v1
    pub async fn queue_stats(
        &self,
        params: QueueStatsRequest,
    ) -> Result<QueueStats, ErrorObjectOwned> {
        Ok(self.status.queue_stats(params.queue).await)
    }
}
