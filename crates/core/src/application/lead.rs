// Lead use cases: status changes and detail updates

use crate::domain::{
    apply_transition, rescore, DomainError, Lead, LeadId, LeadSource, LeadStatus,
};
use crate::error::{AppError, Result};
use crate::port::{LeadStore, TimeProvider};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Partial update of the scoring inputs of a lead
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeadUpdate {
    #[serde(default)]
    pub source: Option<LeadSource>,
    #[serde(default)]
    pub estimated_value: Option<f64>,
    #[serde(default)]
    pub note: Option<String>,
}

/// Transition `lead` to `to` and restart its time-in-status clock
pub fn enter_status(
    lead: &mut Lead,
    to: LeadStatus,
    now: DateTime<Utc>,
) -> std::result::Result<(), DomainError> {
    apply_transition(lead, to)?;
    lead.status_changed_at = now;
    Ok(())
}

pub struct LeadService {
    leads: Arc<dyn LeadStore>,
    time_provider: Arc<dyn TimeProvider>,
}

impl LeadService {
    pub fn new(leads: Arc<dyn LeadStore>, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            leads,
            time_provider,
        }
    }

    async fn load(&self, lead_id: LeadId) -> Result<Lead> {
        self.leads
            .find_lead(lead_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Lead {}", lead_id)))
    }

    /// Move a lead along the status graph.
    ///
    /// Illegal transitions fail with `DomainError::InvalidTransition` and
    /// leave the stored lead untouched.
    pub async fn change_status(
        &self,
        lead_id: LeadId,
        to: LeadStatus,
        note: Option<String>,
    ) -> Result<Lead> {
        let mut lead = self.load(lead_id).await?;
        let from = lead.status;
        let now = self.time_provider.now();

        enter_status(&mut lead, to, now)?;
        if let Some(note) = note {
            lead.add_note(note, now);
        }
        let score = rescore(&mut lead, now);
        self.leads.save_lead(&lead).await?;

        info!(lead_id, from = %from, to = %to, score, "Lead status changed");
        Ok(lead)
    }

    pub async fn update_details(&self, lead_id: LeadId, update: LeadUpdate) -> Result<Lead> {
        let mut lead = self.load(lead_id).await?;
        let now = self.time_provider.now();

        if let Some(source) = update.source {
            lead.source = source;
        }
        if update.estimated_value.is_some() {
            lead.set_estimated_value(update.estimated_value)?;
        }
        if let Some(note) = update.note {
            lead.add_note(note, now);
        }
        let score = rescore(&mut lead, now);
        self.leads.save_lead(&lead).await?;

        info!(lead_id, score, "Lead details updated");
        Ok(lead)
    }
}
