// Job payloads and results (one variant per job type)

use crate::domain::lead::LeadStatus;
use crate::domain::queue::JobType;
use crate::domain::scoring::PriorityBand;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Email recipient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub email: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceReminderPayload {
    pub invoice_id: i64,
    pub recipient: Recipient,
    pub due_at: DateTime<Utc>,
    pub amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice_number: Option<String>,
}

/// Free-form email on the reminders queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomEmailPayload {
    pub to: String,
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
}

/// Where a rendered document goes once it exists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum DocumentDelivery {
    Download,
    Email { recipient: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentPayload {
    pub invoice_id: i64,
    pub requested_by: String,
    pub delivery: DocumentDelivery,
}

/// External signals gathered about a lead
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentSignals {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_hint: Option<LeadStatus>,
}

impl EnrichmentSignals {
    /// One-line summary of the contact signals, e.g. `company=Acme, phone=555`
    pub fn summary(&self) -> String {
        let fields = [
            ("email", &self.email),
            ("company", &self.company),
            ("phone", &self.phone),
            ("website", &self.website),
        ];
        let mut parts: Vec<String> = fields
            .iter()
            .filter_map(|(name, value)| value.as_ref().map(|v| format!("{}={}", name, v)))
            .collect();
        if let Some(value) = self.estimated_value {
            parts.push(format!("estimated_value={}", value));
        }
        if let Some(hint) = self.status_hint {
            parts.push(format!("status_hint={}", hint));
        }
        parts.join(", ")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentPayload {
    pub lead_id: i64,
    #[serde(default)]
    pub signals: EnrichmentSignals,
}

/// Typed job payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum JobPayload {
    #[serde(rename = "send-invoice-reminder")]
    InvoiceReminder(InvoiceReminderPayload),
    #[serde(rename = "send-custom-email")]
    CustomEmail(CustomEmailPayload),
    #[serde(rename = "generate-invoice-document")]
    DocumentGeneration(DocumentPayload),
    #[serde(rename = "enrich-lead-data")]
    LeadEnrichment(EnrichmentPayload),
}

impl JobPayload {
    pub fn job_type(&self) -> JobType {
        match self {
            JobPayload::InvoiceReminder(_) => JobType::SendInvoiceReminder,
            JobPayload::CustomEmail(_) => JobType::SendCustomEmail,
            JobPayload::DocumentGeneration(_) => JobType::GenerateInvoiceDocument,
            JobPayload::LeadEnrichment(_) => JobType::EnrichLeadData,
        }
    }

    /// Record this job acts on (invoice or lead id), used for "outstanding work" lookups
    pub fn target_id(&self) -> Option<i64> {
        match self {
            JobPayload::InvoiceReminder(p) => Some(p.invoice_id),
            JobPayload::DocumentGeneration(p) => Some(p.invoice_id),
            JobPayload::LeadEnrichment(p) => Some(p.lead_id),
            JobPayload::CustomEmail(_) => None,
        }
    }
}

/// Whether the business intent behind a job was reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Achieved,
    /// The job ran, but the target state made it pointless
    Moot,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderOutput {
    pub email_sent: bool,
    pub provider: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentOutput {
    pub path: String,
    pub size_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    pub emailed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentOutput {
    pub lead_id: i64,
    pub new_score: u8,
    pub priority: PriorityBand,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied_status: Option<LeadStatus>,
    /// Status hint that the state machine refused
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected_status: Option<LeadStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobOutput {
    Email(ReminderOutput),
    Document(DocumentOutput),
    Enrichment(EnrichmentOutput),
}

/// Result stored on a completed job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResult {
    pub success: bool,
    pub message: String,
    pub outcome: Outcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<JobOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobResult {
    pub fn achieved(message: impl Into<String>, output: JobOutput) -> Self {
        Self {
            success: true,
            message: message.into(),
            outcome: Outcome::Achieved,
            output: Some(output),
            error: None,
        }
    }

    /// Nothing to do, and that is fine (e.g. invoice already paid)
    pub fn skipped(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            outcome: Outcome::Moot,
            output: None,
            error: None,
        }
    }

    /// Nothing can be done and retries will not change that (e.g. record vanished)
    pub fn unrecoverable(message: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            outcome: Outcome::Moot,
            output: None,
            error: Some(error.into()),
        }
    }
}
