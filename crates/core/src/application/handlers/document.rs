// Invoice document generation and optional email delivery

use super::email_template::document_ready_email;
use super::unexpected_payload;
use crate::application::worker::constants::*;
use crate::application::worker::{JobContext, JobHandler};
use crate::domain::{DocumentDelivery, DocumentOutput, JobOutput, JobPayload, JobResult, JobType};
use crate::error::{AppError, Result};
use crate::port::{DocumentRenderer, InvoiceStore, MailTransport};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

pub struct DocumentHandler {
    invoices: Arc<dyn InvoiceStore>,
    renderer: Arc<dyn DocumentRenderer>,
    mail: Arc<dyn MailTransport>,
}

impl DocumentHandler {
    pub fn new(
        invoices: Arc<dyn InvoiceStore>,
        renderer: Arc<dyn DocumentRenderer>,
        mail: Arc<dyn MailTransport>,
    ) -> Self {
        Self {
            invoices,
            renderer,
            mail,
        }
    }
}

#[async_trait]
impl JobHandler for DocumentHandler {
    async fn handle(&self, ctx: &JobContext, payload: &JobPayload) -> Result<JobResult> {
        let JobPayload::DocumentGeneration(request) = payload else {
            return Err(unexpected_payload(JobType::GenerateInvoiceDocument, payload));
        };
        ctx.progress(PROGRESS_STARTED).await;

        let Some(invoice) = self.invoices.find_invoice(request.invoice_id).await? else {
            warn!(invoice_id = request.invoice_id, "Invoice not found, skipping document");
            return Ok(JobResult::unrecoverable(
                "Invoice not found",
                "Invoice may have been deleted",
            ));
        };
        ctx.progress(PROGRESS_CHECKED).await;

        let document = self.renderer.render_invoice(&invoice).await?;
        let download_url = self.renderer.download_url(&document);
        ctx.progress(PROGRESS_DISPATCHED).await;

        let emailed = match &request.delivery {
            DocumentDelivery::Download => false,
            DocumentDelivery::Email { recipient } => {
                let message =
                    document_ready_email(recipient, &invoice, &document, download_url.as_deref());
                if !self.mail.send(&message).await? {
                    return Err(AppError::Delivery(format!(
                        "mail transport rejected document for invoice {}",
                        invoice.id
                    )));
                }
                true
            }
        };
        ctx.progress(PROGRESS_CONFIRMED).await;

        info!(
            job_id = %ctx.job_id(),
            invoice_id = invoice.id,
            path = %document.path,
            size_bytes = document.size_bytes,
            requested_by = %request.requested_by,
            emailed,
            "Invoice document generated"
        );
        ctx.progress(PROGRESS_DONE).await;

        Ok(JobResult::achieved(
            "Document generated successfully",
            JobOutput::Document(DocumentOutput {
                path: document.path,
                size_bytes: document.size_bytes,
                download_url,
                emailed,
            }),
        ))
    }
}
