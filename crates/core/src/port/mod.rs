// Port Layer - Interfaces for external dependencies

pub mod document_renderer;
pub mod id_provider; // For deterministic testing
pub mod job_broker;
pub mod mail_transport;
pub mod record_store;
pub mod time_provider;

// Re-exports
pub use document_renderer::{DocumentRenderer, RenderedDocument};
pub use id_provider::IdProvider;
pub use job_broker::JobBroker;
pub use mail_transport::{EmailMessage, MailTransport};
pub use record_store::{InvoiceStore, LeadStore};
pub use time_provider::TimeProvider;
