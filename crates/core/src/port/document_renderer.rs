// Document Renderer Port (external collaborator)

use crate::domain::InvoiceSnapshot;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A rendered document on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedDocument {
    pub path: String,
    pub size_bytes: u64,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    async fn render_invoice(&self, invoice: &InvoiceSnapshot) -> Result<RenderedDocument>;

    /// Link a client can fetch the document from, if the renderer serves one
    fn download_url(&self, document: &RenderedDocument) -> Option<String>;
}
