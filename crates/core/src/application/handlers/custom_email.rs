// Free-form email delivery

use super::unexpected_payload;
use crate::application::worker::constants::*;
use crate::application::worker::{JobContext, JobHandler};
use crate::domain::{JobOutput, JobPayload, JobResult, JobType, ReminderOutput};
use crate::error::{AppError, Result};
use crate::port::{EmailMessage, MailTransport};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

pub struct CustomEmailHandler {
    mail: Arc<dyn MailTransport>,
}

impl CustomEmailHandler {
    pub fn new(mail: Arc<dyn MailTransport>) -> Self {
        Self { mail }
    }
}

#[async_trait]
impl JobHandler for CustomEmailHandler {
    async fn handle(&self, ctx: &JobContext, payload: &JobPayload) -> Result<JobResult> {
        let JobPayload::CustomEmail(email) = payload else {
            return Err(unexpected_payload(JobType::SendCustomEmail, payload));
        };
        ctx.progress(PROGRESS_STARTED).await;

        let message = EmailMessage {
            to: email.to.clone(),
            subject: email.subject.clone(),
            text: email.text.clone(),
            html: email.html.clone(),
        };
        ctx.progress(PROGRESS_CHECKED).await;

        let sent = self.mail.send(&message).await?;
        ctx.progress(PROGRESS_DISPATCHED).await;
        if !sent {
            return Err(AppError::Delivery(format!(
                "mail transport rejected email to {}",
                message.to
            )));
        }
        ctx.progress(PROGRESS_CONFIRMED).await;

        info!(job_id = %ctx.job_id(), to = %message.to, "Email sent");
        ctx.progress(PROGRESS_DONE).await;

        Ok(JobResult::achieved(
            "Email sent successfully",
            JobOutput::Email(ReminderOutput {
                email_sent: true,
                provider: self.mail.provider().to_string(),
            }),
        ))
    }
}
