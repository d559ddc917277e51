// Record Store Ports (external data store for domain aggregates)

use crate::domain::{InvoiceSnapshot, Lead, LeadId};
use crate::error::Result;
use async_trait::async_trait;

/// Read-only access to invoices
#[async_trait]
pub trait InvoiceStore: Send + Sync {
    async fn find_invoice(&self, id: i64) -> Result<Option<InvoiceSnapshot>>;
}

/// Read-modify-write access to leads
#[async_trait]
pub trait LeadStore: Send + Sync {
    async fn find_lead(&self, id: LeadId) -> Result<Option<Lead>>;

    /// Persist the full aggregate (status, score, notes, value)
    async fn save_lead(&self, lead: &Lead) -> Result<()>;
}

pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Mutex, MutexGuard};

    #[derive(Default)]
    struct Records {
        invoices: HashMap<i64, InvoiceSnapshot>,
        leads: HashMap<LeadId, Lead>,
        lead_saves: usize,
    }

    /// HashMap-backed store for both aggregates
    #[derive(Default)]
    pub struct InMemoryRecordStore {
        records: Mutex<Records>,
    }

    impl InMemoryRecordStore {
        pub fn new() -> Self {
            Self::default()
        }

        fn lock(&self) -> MutexGuard<'_, Records> {
            self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
        }

        pub fn put_invoice(&self, invoice: InvoiceSnapshot) {
            self.lock().invoices.insert(invoice.id, invoice);
        }

        pub fn put_lead(&self, lead: Lead) {
            self.lock().leads.insert(lead.id, lead);
        }

        pub fn lead(&self, id: LeadId) -> Option<Lead> {
            self.lock().leads.get(&id).cloned()
        }

        /// Number of `save_lead` calls
        pub fn lead_saves(&self) -> usize {
            self.lock().lead_saves
        }
    }

    #[async_trait]
    impl InvoiceStore for InMemoryRecordStore {
        async fn find_invoice(&self, id: i64) -> Result<Option<InvoiceSnapshot>> {
            Ok(self.lock().invoices.get(&id).cloned())
        }
    }

    #[async_trait]
    impl LeadStore for InMemoryRecordStore {
        async fn find_lead(&self, id: LeadId) -> Result<Option<Lead>> {
            Ok(self.lock().leads.get(&id).cloned())
        }

        async fn save_lead(&self, lead: &Lead) -> Result<()> {
            let mut records = self.lock();
            records.lead_saves += 1;
            records.leads.insert(lead.id, lead.clone());
            Ok(())
        }
    }
}
