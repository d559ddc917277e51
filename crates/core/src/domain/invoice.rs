// Invoice snapshot (read-only view of the external record)

use crate::domain::error::DomainError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Overdue,
    Cancelled,
}

impl InvoiceStatus {
    pub const ALL: [InvoiceStatus; 5] = [
        InvoiceStatus::Draft,
        InvoiceStatus::Sent,
        InvoiceStatus::Paid,
        InvoiceStatus::Overdue,
        InvoiceStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Cancelled => "cancelled",
        }
    }

    /// Paid and cancelled invoices never need a payment reminder
    pub fn needs_reminder(&self) -> bool {
        !matches!(self, InvoiceStatus::Paid | InvoiceStatus::Cancelled)
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvoiceStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        InvoiceStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| DomainError::ValidationError(format!("Unknown invoice status: {}", s)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceSnapshot {
    pub id: i64,
    pub number: Option<String>,
    pub status: InvoiceStatus,
    pub client_name: String,
    pub client_email: String,
    pub due_date: DateTime<Utc>,
    pub total_amount: f64,
}

impl InvoiceSnapshot {
    /// Invoice number, falling back to `INV-{id}`
    pub fn display_number(&self) -> String {
        self.number
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| format!("INV-{}", self.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_paid_and_cancelled_skip_reminders() {
        assert!(!InvoiceStatus::Paid.needs_reminder());
        assert!(!InvoiceStatus::Cancelled.needs_reminder());
        assert!(InvoiceStatus::Overdue.needs_reminder());
        assert!(InvoiceStatus::Sent.needs_reminder());
    }

    #[test]
    fn test_display_number_falls_back_to_id() {
        let mut invoice = InvoiceSnapshot {
            id: 42,
            number: None,
            status: InvoiceStatus::Sent,
            client_name: "Ada".into(),
            client_email: "ada@example.com".into(),
            due_date: Utc.with_ymd_and_hms(2025, 3, 10, 0, 0, 0).unwrap(),
            total_amount: 10.0,
        };
        assert_eq!(invoice.display_number(), "INV-42");

        invoice.number = Some("2025-0007".into());
        assert_eq!(invoice.display_number(), "2025-0007");
    }
}
