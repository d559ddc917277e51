// Domain Layer - Pure business logic and entities

pub mod error;
pub mod invoice;
pub mod job;
pub mod lead;
pub mod payload;
pub mod queue;
pub mod scoring;

// Re-exports
pub use error::DomainError;
pub use invoice::{InvoiceSnapshot, InvoiceStatus};
pub use job::{
    Backoff, BackoffKind, Job, JobId, JobOptions, JobState, LeaseToken, NewJob, Priority,
    Progress, Retention, DEFAULT_PRIORITY, MAX_DELAY_MS, PRIORITY_HIGH, PRIORITY_LOW,
};
pub use lead::{apply_transition, can_transition, Lead, LeadId, LeadNote, LeadSource, LeadStatus};
pub use payload::{
    CustomEmailPayload, DocumentDelivery, DocumentOutput, DocumentPayload, EnrichmentOutput,
    EnrichmentPayload, EnrichmentSignals, InvoiceReminderPayload, JobOutput, JobPayload,
    JobResult, Outcome, Recipient, ReminderOutput,
};
pub use queue::{JobKind, JobType, QueueName};
pub use scoring::{priority_band, rescore, score, PriorityBand};
