// Invoice payment reminder

use super::email_template::reminder_email;
use super::unexpected_payload;
use crate::application::worker::constants::*;
use crate::application::worker::{JobContext, JobHandler};
use crate::domain::{JobOutput, JobPayload, JobResult, JobType, ReminderOutput};
use crate::error::{AppError, Result};
use crate::port::{InvoiceStore, MailTransport};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

pub struct InvoiceReminderHandler {
    invoices: Arc<dyn InvoiceStore>,
    mail: Arc<dyn MailTransport>,
}

impl InvoiceReminderHandler {
    pub fn new(invoices: Arc<dyn InvoiceStore>, mail: Arc<dyn MailTransport>) -> Self {
        Self { invoices, mail }
    }
}

#[async_trait]
impl JobHandler for InvoiceReminderHandler {
    async fn handle(&self, ctx: &JobContext, payload: &JobPayload) -> Result<JobResult> {
        let JobPayload::InvoiceReminder(reminder) = payload else {
            return Err(unexpected_payload(JobType::SendInvoiceReminder, payload));
        };
        ctx.progress(PROGRESS_STARTED).await;

        // Re-check: the invoice may have been paid or removed since scheduling
        let Some(invoice) = self.invoices.find_invoice(reminder.invoice_id).await? else {
            warn!(invoice_id = reminder.invoice_id, "Invoice not found, skipping reminder");
            return Ok(JobResult::unrecoverable(
                "Invoice not found",
                "Invoice may have been deleted",
            ));
        };
        if !invoice.status.needs_reminder() {
            info!(
                invoice_id = invoice.id,
                status = %invoice.status,
                "Invoice settled, skipping reminder"
            );
            return Ok(JobResult::skipped(format!(
                "Invoice is {}, no reminder needed",
                invoice.status
            )));
        }
        ctx.progress(PROGRESS_CHECKED).await;

        let message = reminder_email(&reminder.recipient, &invoice);
        let sent = self.mail.send(&message).await?;
        ctx.progress(PROGRESS_DISPATCHED).await;

        if !sent {
            return Err(AppError::Delivery(format!(
                "mail transport rejected reminder for invoice {}",
                invoice.id
            )));
        }
        ctx.progress(PROGRESS_CONFIRMED).await;

        info!(
            job_id = %ctx.job_id(),
            invoice_id = invoice.id,
            to = %message.to,
            "Invoice reminder sent"
        );
        ctx.progress(PROGRESS_DONE).await;

        Ok(JobResult::achieved(
            "Invoice reminder sent successfully",
            JobOutput::Email(ReminderOutput {
                email_sent: true,
                provider: self.mail.provider().to_string(),
            }),
        ))
    }
}
