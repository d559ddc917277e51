// File outbox mail transport
// Each accepted message lands in the outbox directory as one JSON file
// for a relay (or a human) to pick up.

use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tally_core::error::Result;
use tally_core::port::{EmailMessage, MailTransport, TimeProvider};
use tracing::{info, warn};

#[derive(Serialize)]
struct OutboxEntry<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    html: Option<&'a str>,
    queued_at: i64,
}

pub struct OutboxMailTransport {
    outbox_dir: PathBuf,
    from: String,
    time_provider: Arc<dyn TimeProvider>,
    sequence: AtomicU64,
}

impl OutboxMailTransport {
    /// # Arguments
    /// * `outbox_dir` - Created on first send if missing
    /// * `from` - Sender address stamped on every message
    pub fn new(
        outbox_dir: impl Into<PathBuf>,
        from: impl Into<String>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            outbox_dir: outbox_dir.into(),
            from: from.into(),
            time_provider,
            sequence: AtomicU64::new(0),
        }
    }

    pub fn outbox_dir(&self) -> &Path {
        &self.outbox_dir
    }
}

fn is_deliverable(address: &str) -> bool {
    match address.trim().split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.'),
        None => false,
    }
}

#[async_trait]
impl MailTransport for OutboxMailTransport {
    async fn send(&self, message: &EmailMessage) -> Result<bool> {
        if !is_deliverable(&message.to) {
            warn!(to = %message.to, "Refusing message with undeliverable recipient");
            return Ok(false);
        }

        let queued_at = self.time_provider.now_millis();
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let entry = OutboxEntry {
            from: &self.from,
            to: message.to.trim(),
            subject: &message.subject,
            text: message.text.as_deref(),
            html: message.html.as_deref(),
            queued_at,
        };

        tokio::fs::create_dir_all(&self.outbox_dir).await?;
        let path = self.outbox_dir.join(format!("{}-{}.json", queued_at, seq));
        tokio::fs::write(&path, serde_json::to_vec_pretty(&entry)?).await?;

        info!(to = %entry.to, subject = %message.subject, path = %path.display(), "Email queued in outbox");
        Ok(true)
    }

    fn provider(&self) -> &'static str {
        "outbox"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::port::time_provider::mocks::FixedTimeProvider;

    fn message(to: &str) -> EmailMessage {
        EmailMessage {
            to: to.to_string(),
            subject: "Payment Reminder".to_string(),
            text: Some("Please pay".to_string()),
            html: None,
        }
    }

    fn transport(dir: &Path) -> OutboxMailTransport {
        OutboxMailTransport::new(
            dir.join("outbox"),
            "billing@tally.test",
            Arc::new(FixedTimeProvider::new(1_700_000_000_000)),
        )
    }

    #[tokio::test]
    async fn test_send_writes_outbox_file() {
        let dir = tempfile::tempdir().unwrap();
        let transport = transport(dir.path());

        assert!(transport.send(&message("client@acme.test")).await.unwrap());

        let written = transport.outbox_dir().join("1700000000000-1.json");
        let raw = std::fs::read_to_string(written).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["from"], "billing@tally.test");
        assert_eq!(value["to"], "client@acme.test");
        assert_eq!(value["text"], "Please pay");
        assert!(value.get("html").is_none());
    }

    #[tokio::test]
    async fn test_undeliverable_recipient_refused() {
        let dir = tempfile::tempdir().unwrap();
        let transport = transport(dir.path());

        assert!(!transport.send(&message("not-an-address")).await.unwrap());
        assert!(!transport.outbox_dir().exists());
    }

    #[tokio::test]
    async fn test_messages_get_distinct_files() {
        let dir = tempfile::tempdir().unwrap();
        let transport = transport(dir.path());

        transport.send(&message("a@acme.test")).await.unwrap();
        transport.send(&message("b@acme.test")).await.unwrap();

        let count = std::fs::read_dir(transport.outbox_dir()).unwrap().count();
        assert_eq!(count, 2);
        assert_eq!(transport.provider(), "outbox");
    }
}
