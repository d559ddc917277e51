// Queue and Job Type identifiers

use crate::domain::error::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Logical channel, one per job family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueueName {
    EmailReminders,
    DocumentGeneration,
    LeadsEnrichment,
}

impl QueueName {
    pub const ALL: [QueueName; 3] = [
        QueueName::EmailReminders,
        QueueName::DocumentGeneration,
        QueueName::LeadsEnrichment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QueueName::EmailReminders => "email-reminders",
            QueueName::DocumentGeneration => "document-generation",
            QueueName::LeadsEnrichment => "leads-enrichment",
        }
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueueName {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QueueName::ALL
            .into_iter()
            .find(|q| q.as_str() == s)
            .ok_or_else(|| DomainError::ValidationError(format!("Unknown queue: {}", s)))
    }
}

/// Discriminator within a queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobType {
    SendInvoiceReminder,
    SendCustomEmail,
    GenerateInvoiceDocument,
    EnrichLeadData,
}

impl JobType {
    pub const ALL: [JobType; 4] = [
        JobType::SendInvoiceReminder,
        JobType::SendCustomEmail,
        JobType::GenerateInvoiceDocument,
        JobType::EnrichLeadData,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::SendInvoiceReminder => "send-invoice-reminder",
            JobType::SendCustomEmail => "send-custom-email",
            JobType::GenerateInvoiceDocument => "generate-invoice-document",
            JobType::EnrichLeadData => "enrich-lead-data",
        }
    }

    /// Queue this job type is published on
    pub fn queue(&self) -> QueueName {
        match self {
            JobType::SendInvoiceReminder | JobType::SendCustomEmail => QueueName::EmailReminders,
            JobType::GenerateInvoiceDocument => QueueName::DocumentGeneration,
            JobType::EnrichLeadData => QueueName::LeadsEnrichment,
        }
    }

    pub fn kind(&self) -> JobKind {
        JobKind {
            queue: self.queue(),
            job_type: *self,
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| DomainError::ValidationError(format!("Unknown job type: {}", s)))
    }
}

/// Registry key: (queue, job type)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobKind {
    pub queue: QueueName,
    pub job_type: JobType,
}

impl JobKind {
    pub fn all() -> impl Iterator<Item = JobKind> {
        JobType::ALL.into_iter().map(|t| t.kind())
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.queue, self.job_type)
    }
}
