// Lead enrichment: fold external signals into the lead, then rescore

use super::unexpected_payload;
use crate::application::lead::enter_status;
use crate::application::worker::constants::*;
use crate::application::worker::{JobContext, JobHandler};
use crate::domain::{
    priority_band, rescore, EnrichmentOutput, JobOutput, JobPayload, JobResult, JobType,
};
use crate::error::Result;
use crate::port::{LeadStore, TimeProvider};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

pub struct EnrichmentHandler {
    leads: Arc<dyn LeadStore>,
    time_provider: Arc<dyn TimeProvider>,
}

impl EnrichmentHandler {
    pub fn new(leads: Arc<dyn LeadStore>, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            leads,
            time_provider,
        }
    }
}

#[async_trait]
impl JobHandler for EnrichmentHandler {
    async fn handle(&self, ctx: &JobContext, payload: &JobPayload) -> Result<JobResult> {
        let JobPayload::LeadEnrichment(request) = payload else {
            return Err(unexpected_payload(JobType::EnrichLeadData, payload));
        };
        let signals = &request.signals;
        ctx.progress(PROGRESS_STARTED).await;

        let Some(mut lead) = self.leads.find_lead(request.lead_id).await? else {
            warn!(lead_id = request.lead_id, "Lead not found, skipping enrichment");
            return Ok(JobResult::unrecoverable(
                "Lead not found",
                "Lead may have been deleted",
            ));
        };
        if lead.is_closed() && signals.status_hint.is_none() {
            return Ok(JobResult::skipped(format!(
                "Lead is {}, enrichment skipped",
                lead.status
            )));
        }
        ctx.progress(PROGRESS_CHECKED).await;

        let now = self.time_provider.now();
        let summary = signals.summary();
        if !summary.is_empty() {
            // a redelivered attempt finds its own note already saved
            let note = format!("Enrichment: {}", summary);
            if !lead.notes.iter().any(|existing| existing.text == note.trim()) {
                lead.add_note(note, now);
            }
        }
        if let Some(value) = signals.estimated_value {
            if let Err(e) = lead.set_estimated_value(Some(value)) {
                warn!(lead_id = lead.id, error = %e, "Ignoring estimated value signal");
            }
        }

        let mut applied_status = None;
        let mut rejected_status = None;
        if let Some(hint) = signals.status_hint.filter(|hint| *hint != lead.status) {
            match enter_status(&mut lead, hint, now) {
                Ok(()) => applied_status = Some(hint),
                Err(e) => {
                    warn!(lead_id = lead.id, error = %e, "Ignoring status hint");
                    rejected_status = Some(hint);
                }
            }
        }
        let new_score = rescore(&mut lead, now);
        ctx.progress(PROGRESS_DISPATCHED).await;

        self.leads.save_lead(&lead).await?;
        ctx.progress(PROGRESS_CONFIRMED).await;

        info!(
            job_id = %ctx.job_id(),
            lead_id = lead.id,
            new_score,
            status = %lead.status,
            "Lead enriched"
        );
        ctx.progress(PROGRESS_DONE).await;

        Ok(JobResult::achieved(
            "Lead enrichment processed successfully",
            JobOutput::Enrichment(EnrichmentOutput {
                lead_id: lead.id,
                new_score,
                priority: priority_band(new_score),
                applied_status,
                rejected_status,
            }),
        ))
    }
}
