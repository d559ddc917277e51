// Explicit (queue, job type) -> handler registry

use super::handler::JobHandler;
use crate::application::handlers::{
    CustomEmailHandler, DocumentHandler, EnrichmentHandler, InvoiceReminderHandler,
};
use crate::domain::{JobKind, JobType};
use crate::port::{DocumentRenderer, InvoiceStore, LeadStore, MailTransport, TimeProvider};
use std::collections::HashMap;
use std::sync::Arc;

/// Collaborators the standard handlers need
#[derive(Clone)]
pub struct HandlerDeps {
    pub invoices: Arc<dyn InvoiceStore>,
    pub leads: Arc<dyn LeadStore>,
    pub mail: Arc<dyn MailTransport>,
    pub renderer: Arc<dyn DocumentRenderer>,
    pub time_provider: Arc<dyn TimeProvider>,
}

#[derive(Default)]
pub struct JobRegistry {
    handlers: HashMap<JobKind, Arc<dyn JobHandler>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the handler for `job_type` on its queue
    pub fn register(mut self, job_type: JobType, handler: Arc<dyn JobHandler>) -> Self {
        self.handlers.insert(job_type.kind(), handler);
        self
    }

    pub fn get(&self, kind: JobKind) -> Option<Arc<dyn JobHandler>> {
        self.handlers.get(&kind).cloned()
    }

    /// Kinds without a handler; empty for a complete registry
    pub fn missing(&self) -> Vec<JobKind> {
        JobKind::all()
            .filter(|kind| !self.handlers.contains_key(kind))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }

    /// Registry with a handler for every job type
    pub fn standard(deps: HandlerDeps) -> Self {
        Self::new()
            .register(
                JobType::SendInvoiceReminder,
                Arc::new(InvoiceReminderHandler::new(
                    deps.invoices.clone(),
                    deps.mail.clone(),
                )),
            )
            .register(
                JobType::SendCustomEmail,
                Arc::new(CustomEmailHandler::new(deps.mail.clone())),
            )
            .register(
                JobType::GenerateInvoiceDocument,
                Arc::new(DocumentHandler::new(
                    deps.invoices.clone(),
                    deps.renderer,
                    deps.mail,
                )),
            )
            .register(
                JobType::EnrichLeadData,
                Arc::new(EnrichmentHandler::new(deps.leads, deps.time_provider)),
            )
    }
}
