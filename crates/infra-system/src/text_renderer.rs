// Plain-text invoice renderer

use async_trait::async_trait;
use std::path::PathBuf;
use tally_core::application::handlers::email_template::format_usd;
use tally_core::domain::InvoiceSnapshot;
use tally_core::error::Result;
use tally_core::port::{DocumentRenderer, RenderedDocument};
use tracing::info;

/// Writes `invoice-{id}.txt` into `output_dir`; optionally serves it under `base_url`
pub struct TextDocumentRenderer {
    output_dir: PathBuf,
    base_url: Option<String>,
}

impl TextDocumentRenderer {
    pub fn new(output_dir: impl Into<PathBuf>, base_url: Option<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            base_url: base_url.map(|url| url.trim_end_matches('/').to_string()),
        }
    }

    fn render_text(invoice: &InvoiceSnapshot) -> String {
        format!(
            "INVOICE {number}\n\
             ==========================\n\
             Client:   {client} <{email}>\n\
             Status:   {status}\n\
             Due Date: {due}\n\
             Total:    {total}\n",
            number = invoice.display_number(),
            client = invoice.client_name,
            email = invoice.client_email,
            status = invoice.status.as_str(),
            due = invoice.due_date.format("%Y-%m-%d"),
            total = format_usd(invoice.total_amount),
        )
    }
}

#[async_trait]
impl DocumentRenderer for TextDocumentRenderer {
    async fn render_invoice(&self, invoice: &InvoiceSnapshot) -> Result<RenderedDocument> {
        let body = Self::render_text(invoice);

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let path = self.output_dir.join(format!("invoice-{}.txt", invoice.id));
        tokio::fs::write(&path, body.as_bytes()).await?;

        info!(invoice_id = invoice.id, path = %path.display(), "Invoice document rendered");
        Ok(RenderedDocument {
            path: path.display().to_string(),
            size_bytes: body.len() as u64,
        })
    }

    fn download_url(&self, document: &RenderedDocument) -> Option<String> {
        let base = self.base_url.as_ref()?;
        let file_name = PathBuf::from(&document.path)
            .file_name()?
            .to_string_lossy()
            .into_owned();
        Some(format!("{}/{}", base, file_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tally_core::domain::InvoiceStatus;

    fn invoice() -> InvoiceSnapshot {
        InvoiceSnapshot {
            id: 9,
            number: None,
            status: InvoiceStatus::Sent,
            client_name: "Acme".into(),
            client_email: "billing@acme.test".into(),
            due_date: Utc.with_ymd_and_hms(2025, 3, 10, 0, 0, 0).unwrap(),
            total_amount: 1234.5,
        }
    }

    #[tokio::test]
    async fn test_render_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = TextDocumentRenderer::new(dir.path().join("docs"), None);

        let doc = renderer.render_invoice(&invoice()).await.unwrap();
        let content = std::fs::read_to_string(&doc.path).unwrap();

        assert!(doc.path.ends_with("invoice-9.txt"));
        assert_eq!(doc.size_bytes, content.len() as u64);
        assert!(content.contains("INVOICE INV-9"));
        assert!(content.contains("Due Date: 2025-03-10"));
        assert!(content.contains("$1,234.50"));
        assert_eq!(renderer.download_url(&doc), None);
    }

    #[tokio::test]
    async fn test_download_url_uses_base() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = TextDocumentRenderer::new(
            dir.path(),
            Some("https://files.tally.test/docs/".to_string()),
        );

        let doc = renderer.render_invoice(&invoice()).await.unwrap();
        assert_eq!(
            renderer.download_url(&doc).as_deref(),
            Some("https://files.tally.test/docs/invoice-9.txt")
        );
    }
}
