// Error type shared by the core and every adapter

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    /// Rejected producer input, never retried
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored payload, options or result that no longer decodes
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Broker operation against a job in the wrong state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Broker write by a holder whose lease was superseded by a later dequeue or reclaim
    #[error("Lease lost: {0}")]
    LeaseLost(String),

    /// Mail transport or document renderer refused the work
    #[error("Delivery error: {0}")]
    Delivery(String),
}

pub type Result<T> = std::result::Result<T, AppError>;
