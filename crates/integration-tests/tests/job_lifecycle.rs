//! Reminder, document and retry flows against the SQLite broker

mod common;

use chrono::{Duration, TimeZone, Utc};
use common::{start, Harness};
use tally_core::application::{LeaseReaper, QueueStats, ReminderRequest, StatusKind};
use tally_core::domain::{
    DocumentDelivery, InvoiceStatus, JobOutput, JobState, Outcome, QueueName, Recipient,
};
use tally_core::port::JobBroker;
use tally_core::AppError;

fn reminder(invoice_id: i64, email: &str, days_before: i64) -> ReminderRequest {
    ReminderRequest {
        invoice_id,
        recipient: Recipient {
            email: email.to_string(),
            name: "Dana Accounts".to_string(),
        },
        due_at: Utc.with_ymd_and_hms(2025, 3, 10, 0, 0, 0).unwrap(),
        amount: 1250.0,
        invoice_number: Some(format!("INV-2025-{:03}", invoice_id)),
        days_before,
    }
}

#[tokio::test]
async fn test_reminder_waits_for_fire_time_then_sends() {
    let h = Harness::new().await;
    h.put_invoice(1, InvoiceStatus::Sent).await;
    let worker = h.worker(QueueName::EmailReminders);

    let scheduled = h
        .scheduler
        .schedule_invoice_reminder(reminder(1, "ap@acme.test", 2))
        .await
        .unwrap();
    let fire_at = Utc.with_ymd_and_hms(2025, 3, 8, 0, 0, 0).unwrap();
    assert_eq!(scheduled.scheduled_for, fire_at);
    assert_eq!(
        h.status.get_status(&scheduled.job_id).await.status,
        StatusKind::Delayed
    );

    assert!(!worker.process_next_job().await.unwrap());
    assert_eq!(h.sent_emails(), 0);

    h.clock.set(fire_at.timestamp_millis());
    assert!(worker.process_next_job().await.unwrap());

    let view = h.status.get_status(&scheduled.job_id).await;
    assert_eq!(view.status, StatusKind::Completed);
    assert_eq!(view.outcome, Some(Outcome::Achieved));
    assert_eq!(view.progress, Some(100));
    assert_eq!(view.attempts_made, Some(1));
    let result = view.result.unwrap();
    assert_eq!(result.message, "Invoice reminder sent successfully");
    match result.output {
        Some(JobOutput::Email(output)) => {
            assert!(output.email_sent);
            assert_eq!(output.provider, "outbox");
        }
        other => panic!("unexpected output: {:?}", other),
    }
    assert_eq!(h.sent_emails(), 1);
}

#[tokio::test]
async fn test_paid_invoice_reminder_is_moot() {
    let h = Harness::new().await;
    h.put_invoice(2, InvoiceStatus::Paid).await;

    let scheduled = h
        .scheduler
        .schedule_invoice_reminder(reminder(2, "ap@acme.test", 30))
        .await
        .unwrap();
    assert!(h
        .worker(QueueName::EmailReminders)
        .process_next_job()
        .await
        .unwrap());

    let view = h.status.get_status(&scheduled.job_id).await;
    assert_eq!(view.status, StatusKind::Completed);
    assert_eq!(view.outcome, Some(Outcome::Moot));
    let result = view.result.unwrap();
    assert!(result.success);
    assert_eq!(result.message, "Invoice is paid, no reminder needed");
    assert_eq!(h.sent_emails(), 0);
}

#[tokio::test]
async fn test_missing_invoice_completes_unsuccessfully() {
    let h = Harness::new().await;

    let scheduled = h
        .scheduler
        .schedule_invoice_reminder(reminder(404, "ap@acme.test", 30))
        .await
        .unwrap();
    h.worker(QueueName::EmailReminders)
        .process_next_job()
        .await
        .unwrap();

    let view = h.status.get_status(&scheduled.job_id).await;
    assert_eq!(view.status, StatusKind::Completed);
    assert_eq!(view.outcome, Some(Outcome::Moot));
    let result = view.result.unwrap();
    assert!(!result.success);
    assert_eq!(result.message, "Invoice not found");
    assert_eq!(result.error.as_deref(), Some("Invoice may have been deleted"));
}

#[tokio::test]
async fn test_rejected_delivery_backs_off_then_fails() {
    let h = Harness::new().await;
    h.put_invoice(3, InvoiceStatus::Overdue).await;
    let worker = h.worker(QueueName::EmailReminders);

    let scheduled = h
        .scheduler
        .schedule_invoice_reminder(reminder(3, "nobody", 30))
        .await
        .unwrap();
    let id = scheduled.job_id;

    assert!(worker.process_next_job().await.unwrap());
    let job = h.broker.get(&id).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Delayed);
    assert_eq!(job.attempts_made, 1);
    assert_eq!(job.run_at, start().timestamp_millis() + 2_000);

    // not yet due
    assert!(!worker.process_next_job().await.unwrap());

    h.clock.advance(2_000);
    assert!(worker.process_next_job().await.unwrap());
    let job = h.broker.get(&id).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Delayed);
    assert_eq!(job.attempts_made, 2);
    assert_eq!(job.run_at, start().timestamp_millis() + 6_000);

    h.clock.advance(4_000);
    assert!(worker.process_next_job().await.unwrap());

    let view = h.status.get_status(&id).await;
    assert_eq!(view.status, StatusKind::Failed);
    assert_eq!(view.outcome, Some(Outcome::Error));
    assert_eq!(view.attempts_made, Some(3));
    assert!(view
        .failed_reason
        .unwrap()
        .contains("mail transport rejected reminder for invoice 3"));
    assert_eq!(h.sent_emails(), 0);
}

#[tokio::test]
async fn test_document_generation_with_email_delivery() {
    let h = Harness::new().await;
    h.put_invoice(7, InvoiceStatus::Sent).await;

    let job_id = h
        .scheduler
        .enqueue_document_generation(
            7,
            "ops@tally.test",
            DocumentDelivery::Email {
                recipient: "cfo@acme.test".to_string(),
            },
        )
        .await
        .unwrap();
    assert!(h
        .worker(QueueName::DocumentGeneration)
        .process_next_job()
        .await
        .unwrap());

    let view = h.status.get_status(&job_id).await;
    assert_eq!(view.status, StatusKind::Completed);
    match view.result.unwrap().output {
        Some(JobOutput::Document(doc)) => {
            assert!(doc.emailed);
            assert!(doc.size_bytes > 0);
            assert_eq!(
                doc.download_url.as_deref(),
                Some("https://files.tally.test/invoice-7.txt")
            );
            let rendered = std::fs::read_to_string(&doc.path).unwrap();
            assert!(rendered.contains("INV-2025-007"));
        }
        other => panic!("unexpected output: {:?}", other),
    }
    assert_eq!(h.sent_emails(), 1);
}

#[tokio::test]
async fn test_reschedule_replaces_pending_reminder() {
    let h = Harness::new().await;

    let first = h
        .scheduler
        .schedule_invoice_reminder(reminder(5, "ap@acme.test", 3))
        .await
        .unwrap();
    let second = h
        .scheduler
        .reschedule_invoice_reminder(&first.job_id, reminder(5, "ap@acme.test", 1))
        .await
        .unwrap();

    assert!(second.replaced);
    assert_ne!(second.job_id, first.job_id);
    assert_eq!(
        second.scheduled_for,
        Utc.with_ymd_and_hms(2025, 3, 9, 0, 0, 0).unwrap()
    );
    assert_eq!(
        h.status.get_status(&first.job_id).await.status,
        StatusKind::NotFound
    );

    let pending = h.status.list_jobs_for(QueueName::EmailReminders, 5).await;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].job_id, second.job_id);

    assert!(h.scheduler.cancel(&second.job_id).await);
    assert!(!h.scheduler.cancel(&second.job_id).await);
    assert!(h
        .status
        .list_jobs_for(QueueName::EmailReminders, 5)
        .await
        .is_empty());
}

#[tokio::test]
async fn test_active_job_cannot_be_cancelled() {
    let h = Harness::new().await;
    let scheduled = h
        .scheduler
        .schedule_invoice_reminder(reminder(6, "ap@acme.test", 30))
        .await
        .unwrap();

    let leased = h
        .broker
        .dequeue(QueueName::EmailReminders, 60_000)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(leased.id, scheduled.job_id);
    assert!(!h.scheduler.cancel(&scheduled.job_id).await);
    assert_eq!(
        h.status.get_status(&scheduled.job_id).await.status,
        StatusKind::Active
    );
}

#[tokio::test]
async fn test_expired_lease_is_recovered_without_consuming_attempt() {
    let h = Harness::new().await;
    h.put_invoice(8, InvoiceStatus::Sent).await;
    let scheduled = h
        .scheduler
        .schedule_invoice_reminder(reminder(8, "ap@acme.test", 30))
        .await
        .unwrap();

    // a worker takes the job and disappears
    let stale = h
        .broker
        .dequeue(QueueName::EmailReminders, 1_000)
        .await
        .unwrap()
        .unwrap();

    let reaper = LeaseReaper::new(h.broker.clone(), None);
    assert_eq!(reaper.reap_once().await.unwrap(), 0);

    h.clock.advance(Duration::seconds(2).num_milliseconds());
    assert_eq!(reaper.reap_once().await.unwrap(), 1);
    let job = h.broker.get(&scheduled.job_id).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Waiting);
    assert_eq!(job.attempts_made, 0);

    assert!(h
        .worker(QueueName::EmailReminders)
        .process_next_job()
        .await
        .unwrap());
    let view = h.status.get_status(&scheduled.job_id).await;
    assert_eq!(view.status, StatusKind::Completed);
    assert_eq!(view.attempts_made, Some(1));
    assert_eq!(h.sent_emails(), 1);

    // the vanished worker comes back too late
    let err = h
        .broker
        .fail(&stale.id, stale.lease_token, "woke up", None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::LeaseLost(_)));
    assert_eq!(
        h.status.get_status(&scheduled.job_id).await.status,
        StatusKind::Completed
    );
}

#[tokio::test]
async fn test_queue_stats_track_lifecycle() {
    let h = Harness::new().await;
    h.put_invoice(9, InvoiceStatus::Sent).await;
    h.scheduler
        .schedule_invoice_reminder(reminder(9, "ap@acme.test", 30))
        .await
        .unwrap();
    h.scheduler
        .schedule_invoice_reminder(reminder(9, "ap@acme.test", 1))
        .await
        .unwrap();

    let stats = h.status.queue_stats(QueueName::EmailReminders).await;
    assert_eq!((stats.waiting, stats.delayed), (1, 1));

    h.worker(QueueName::EmailReminders)
        .process_next_job()
        .await
        .unwrap();
    let stats = h.status.queue_stats(QueueName::EmailReminders).await;
    assert_eq!(stats.waiting, 0);
    assert_eq!(stats.delayed, 1);
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.failed, 0);

    let other = h.status.queue_stats(QueueName::DocumentGeneration).await;
    assert_eq!(other, QueueStats::default());
}
