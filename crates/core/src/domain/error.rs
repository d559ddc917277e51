// Domain Error Types

use crate::domain::lead::LeadStatus;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Cannot transition lead from {from} to {to}")]
    InvalidTransition { from: LeadStatus, to: LeadStatus },

    #[error("Invalid job options: {0}")]
    InvalidJobOptions(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
