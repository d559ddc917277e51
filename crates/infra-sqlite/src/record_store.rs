// SQLite InvoiceStore / LeadStore Implementation

use crate::error::{corrupt_column, map_sqlx_error};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tally_core::domain::{InvoiceSnapshot, Lead, LeadId, LeadNote};
use tally_core::error::Result;
use tally_core::port::{InvoiceStore, LeadStore};

/// Invoice and lead tables shared with the backend that owns them
pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or replace an invoice row (seeding and tests)
    pub async fn upsert_invoice(&self, invoice: &InvoiceSnapshot) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO invoices (id, number, status, client_name, client_email, due_date, total_amount)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                number = excluded.number,
                status = excluded.status,
                client_name = excluded.client_name,
                client_email = excluded.client_email,
                due_date = excluded.due_date,
                total_amount = excluded.total_amount
            "#,
        )
        .bind(invoice.id)
        .bind(&invoice.number)
        .bind(invoice.status.as_str())
        .bind(&invoice.client_name)
        .bind(&invoice.client_email)
        .bind(invoice.due_date)
        .bind(invoice.total_amount)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }
}

#[async_trait]
impl InvoiceStore for SqliteRecordStore {
    async fn find_invoice(&self, id: i64) -> Result<Option<InvoiceSnapshot>> {
        let row = sqlx::query_as::<_, InvoiceRow>("SELECT * FROM invoices WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(InvoiceRow::into_snapshot).transpose()
    }
}

#[async_trait]
impl LeadStore for SqliteRecordStore {
    async fn find_lead(&self, id: LeadId) -> Result<Option<Lead>> {
        let row = sqlx::query_as::<_, LeadRow>("SELECT * FROM leads WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(LeadRow::into_lead).transpose()
    }

    async fn save_lead(&self, lead: &Lead) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO leads (id, client_id, status, source, estimated_value, score, notes, status_changed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                client_id = excluded.client_id,
                status = excluded.status,
                source = excluded.source,
                estimated_value = excluded.estimated_value,
                score = excluded.score,
                notes = excluded.notes,
                status_changed_at = excluded.status_changed_at
            "#,
        )
        .bind(lead.id)
        .bind(lead.client_id)
        .bind(lead.status.as_str())
        .bind(lead.source.as_str())
        .bind(lead.estimated_value)
        .bind(i64::from(lead.score))
        .bind(serde_json::to_string(&lead.notes)?)
        .bind(lead.status_changed_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct InvoiceRow {
    id: i64,
    number: Option<String>,
    status: String,
    client_name: String,
    client_email: String,
    due_date: DateTime<Utc>,
    total_amount: f64,
}

impl InvoiceRow {
    fn into_snapshot(self) -> Result<InvoiceSnapshot> {
        Ok(InvoiceSnapshot {
            id: self.id,
            number: self.number,
            status: self.status.parse()?,
            client_name: self.client_name,
            client_email: self.client_email,
            due_date: self.due_date,
            total_amount: self.total_amount,
        })
    }
}

#[derive(sqlx::FromRow)]
struct LeadRow {
    id: i64,
    client_id: Option<i64>,
    status: String,
    source: String,
    estimated_value: Option<f64>,
    score: i64,
    notes: String,
    status_changed_at: DateTime<Utc>,
}

impl LeadRow {
    fn into_lead(self) -> Result<Lead> {
        let notes: Vec<LeadNote> =
            serde_json::from_str(&self.notes).map_err(|e| corrupt_column("notes", e))?;
        Ok(Lead {
            id: self.id,
            client_id: self.client_id,
            status: self.status.parse()?,
            source: self.source.parse()?,
            estimated_value: self.estimated_value,
            score: self.score.clamp(0, 100) as u8,
            notes,
            status_changed_at: self.status_changed_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations};
    use chrono::TimeZone;
    use tally_core::domain::{InvoiceStatus, LeadSource, LeadStatus};

    async fn setup_test_db() -> SqliteRecordStore {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        SqliteRecordStore::new(pool)
    }

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, day, 9, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_invoice_round_trip() {
        let store = setup_test_db().await;
        let invoice = InvoiceSnapshot {
            id: 42,
            number: Some("INV-2025-042".into()),
            status: InvoiceStatus::Sent,
            client_name: "Acme".into(),
            client_email: "billing@acme.test".into(),
            due_date: at(15),
            total_amount: 1250.5,
        };

        store.upsert_invoice(&invoice).await.unwrap();
        assert_eq!(store.find_invoice(42).await.unwrap(), Some(invoice.clone()));
        assert!(store.find_invoice(43).await.unwrap().is_none());

        let paid = InvoiceSnapshot {
            status: InvoiceStatus::Paid,
            ..invoice
        };
        store.upsert_invoice(&paid).await.unwrap();
        assert_eq!(
            store.find_invoice(42).await.unwrap().unwrap().status,
            InvoiceStatus::Paid
        );
    }

    #[tokio::test]
    async fn test_save_lead_inserts_then_updates() {
        let store = setup_test_db().await;
        let mut lead = Lead::new(5, LeadSource::Referral, at(1));
        lead.add_note("met at conference", at(2));
        lead.score = 60;
        store.save_lead(&lead).await.unwrap();

        let loaded = store.find_lead(5).await.unwrap().unwrap();
        assert_eq!(loaded.source, LeadSource::Referral);
        assert_eq!(loaded.notes, lead.notes);
        assert_eq!(loaded.status_changed_at, at(1));

        lead.status = LeadStatus::Contacted;
        lead.status_changed_at = at(3);
        lead.estimated_value = Some(60_000.0);
        store.save_lead(&lead).await.unwrap();

        let loaded = store.find_lead(5).await.unwrap().unwrap();
        assert_eq!(loaded.status, LeadStatus::Contacted);
        assert_eq!(loaded.estimated_value, Some(60_000.0));
        assert_eq!(loaded.score, 60);
        assert!(store.find_lead(6).await.unwrap().is_none());
    }
}
