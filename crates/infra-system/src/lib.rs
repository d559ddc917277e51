// Tally Infrastructure - Filesystem Adapters
// Implements: MailTransport, DocumentRenderer

pub mod outbox_mail;
pub mod text_renderer;

pub use outbox_mail::OutboxMailTransport;
pub use text_renderer::TextDocumentRenderer;
