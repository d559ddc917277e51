// Standard job handlers, one per job type

mod custom_email;
mod document;
pub mod email_template;
mod enrichment;
mod reminder;

pub use custom_email::CustomEmailHandler;
pub use document::DocumentHandler;
pub use enrichment::EnrichmentHandler;
pub use reminder::InvoiceReminderHandler;

use crate::domain::{JobPayload, JobType};
use crate::error::AppError;

fn unexpected_payload(expected: JobType, payload: &JobPayload) -> AppError {
    AppError::InvalidState(format!(
        "{} handler received a {} payload",
        expected,
        payload.job_type()
    ))
}
