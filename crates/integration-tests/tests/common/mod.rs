//! Shared wiring: SQLite broker + record store + filesystem adapters on a fixed clock

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use tally_core::application::{HandlerDeps, JobRegistry, JobScheduler, JobStatusService, RetryPolicy, Worker};
use tally_core::domain::{InvoiceSnapshot, InvoiceStatus, QueueName};
use tally_core::port::id_provider::mocks::SequentialIdProvider;
use tally_core::port::time_provider::mocks::FixedTimeProvider;
use tally_core::port::JobBroker;
use tally_infra_sqlite::{create_pool, run_migrations, SqliteJobBroker, SqliteRecordStore};
use tally_infra_system::{OutboxMailTransport, TextDocumentRenderer};
use tempfile::TempDir;

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
}

pub struct Harness {
    pub clock: Arc<FixedTimeProvider>,
    pub broker: Arc<SqliteJobBroker>,
    pub records: Arc<SqliteRecordStore>,
    pub scheduler: JobScheduler,
    pub status: JobStatusService,
    pub registry: Arc<JobRegistry>,
    pub dir: TempDir,
}

impl Harness {
    pub async fn new() -> Self {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(FixedTimeProvider::at(start()));
        let broker = Arc::new(SqliteJobBroker::new(
            pool.clone(),
            Arc::new(SequentialIdProvider::new("job")),
            clock.clone(),
        ));
        let records = Arc::new(SqliteRecordStore::new(pool));
        let mail = Arc::new(OutboxMailTransport::new(
            dir.path().join("outbox"),
            "billing@tally.test",
            clock.clone(),
        ));
        let renderer = Arc::new(TextDocumentRenderer::new(
            dir.path().join("documents"),
            Some("https://files.tally.test".to_string()),
        ));

        let registry = Arc::new(JobRegistry::standard(HandlerDeps {
            invoices: records.clone(),
            leads: records.clone(),
            mail,
            renderer,
            time_provider: clock.clone(),
        }));

        Self {
            scheduler: JobScheduler::new(broker.clone(), clock.clone()),
            status: JobStatusService::new(broker.clone()),
            clock,
            broker,
            records,
            registry,
            dir,
        }
    }

    pub fn worker(&self, queue: QueueName) -> Worker {
        Worker::new(
            queue,
            self.broker.clone() as Arc<dyn JobBroker>,
            self.registry.clone(),
            Arc::new(RetryPolicy::new(self.clock.clone())),
        )
    }

    pub fn outbox(&self) -> PathBuf {
        self.dir.path().join("outbox")
    }

    /// Number of emails written to the outbox so far
    pub fn sent_emails(&self) -> usize {
        std::fs::read_dir(self.outbox())
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    pub async fn put_invoice(&self, id: i64, status: InvoiceStatus) -> InvoiceSnapshot {
        let invoice = InvoiceSnapshot {
            id,
            number: Some(format!("INV-2025-{:03}", id)),
            status,
            client_name: "Acme Corp".into(),
            client_email: "ap@acme.test".into(),
            due_date: Utc.with_ymd_and_hms(2025, 3, 10, 0, 0, 0).unwrap(),
            total_amount: 1250.0,
        };
        self.records.upsert_invoice(&invoice).await.unwrap();
        invoice
    }
}
