// Lead aggregate and status state machine

use crate::domain::error::DomainError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type LeadId = i64;

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    New,
    Contacted,
    Qualified,
    Won,
    Lost,
}

impl LeadStatus {
    pub const ALL: [LeadStatus; 5] = [
        LeadStatus::New,
        LeadStatus::Contacted,
        LeadStatus::Qualified,
        LeadStatus::Won,
        LeadStatus::Lost,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::New => "new",
            LeadStatus::Contacted => "contacted",
            LeadStatus::Qualified => "qualified",
            LeadStatus::Won => "won",
            LeadStatus::Lost => "lost",
        }
    }

    /// Outgoing edges of the status graph
    pub fn allowed_transitions(&self) -> &'static [LeadStatus] {
        match self {
            LeadStatus::New => &[LeadStatus::Contacted, LeadStatus::Lost],
            LeadStatus::Contacted => &[LeadStatus::Qualified, LeadStatus::Lost],
            LeadStatus::Qualified => &[LeadStatus::Won, LeadStatus::Lost],
            LeadStatus::Won => &[],
            LeadStatus::Lost => &[LeadStatus::New],
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, LeadStatus::Won | LeadStatus::Lost)
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeadStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LeadStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| DomainError::ValidationError(format!("Unknown lead status: {}", s)))
    }
}

/// Acquisition channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadSource {
    Website,
    Referral,
    ColdCall,
    SocialMedia,
    EmailCampaign,
    TradeShow,
    Other,
}

impl LeadSource {
    pub const ALL: [LeadSource; 7] = [
        LeadSource::Website,
        LeadSource::Referral,
        LeadSource::ColdCall,
        LeadSource::SocialMedia,
        LeadSource::EmailCampaign,
        LeadSource::TradeShow,
        LeadSource::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LeadSource::Website => "website",
            LeadSource::Referral => "referral",
            LeadSource::ColdCall => "cold_call",
            LeadSource::SocialMedia => "social_media",
            LeadSource::EmailCampaign => "email_campaign",
            LeadSource::TradeShow => "trade_show",
            LeadSource::Other => "other",
        }
    }
}

impl fmt::Display for LeadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeadSource {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LeadSource::ALL
            .into_iter()
            .find(|source| source.as_str() == s)
            .ok_or_else(|| DomainError::ValidationError(format!("Unknown lead source: {}", s)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadNote {
    pub at: DateTime<Utc>,
    pub text: String,
}

impl fmt::Display for LeadNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.at.to_rfc3339(), self.text)
    }
}

/// Lead aggregate
///
/// `score` is derived; use [`crate::domain::scoring::rescore`] after changing
/// source, value, status or notes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: LeadId,
    pub client_id: Option<i64>,
    pub status: LeadStatus,
    pub source: LeadSource,
    pub estimated_value: Option<f64>,
    pub score: u8,
    pub notes: Vec<LeadNote>,
    /// Entry into the current status
    pub status_changed_at: DateTime<Utc>,
}

impl Lead {
    pub fn new(id: LeadId, source: LeadSource, now: DateTime<Utc>) -> Self {
        Self {
            id,
            client_id: None,
            status: LeadStatus::New,
            source,
            estimated_value: None,
            score: 0,
            notes: Vec::new(),
            status_changed_at: now,
        }
    }

    pub fn can_transition_to(&self, to: LeadStatus) -> bool {
        can_transition(self.status, to)
    }

    pub fn is_open(&self) -> bool {
        !self.status.is_closed()
    }

    pub fn is_closed(&self) -> bool {
        self.status.is_closed()
    }

    pub fn is_won(&self) -> bool {
        self.status == LeadStatus::Won
    }

    /// Whole days since entering the current status, rounded up
    pub fn days_in_current_status(&self, now: DateTime<Utc>) -> i64 {
        let elapsed_ms = (now - self.status_changed_at).num_milliseconds().abs();
        (elapsed_ms + MILLIS_PER_DAY - 1) / MILLIS_PER_DAY
    }

    /// Append a timestamped note; blank text is ignored
    pub fn add_note(&mut self, text: impl Into<String>, at: DateTime<Utc>) {
        let text = text.into();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return;
        }
        self.notes.push(LeadNote {
            at,
            text: trimmed.to_string(),
        });
    }

    pub fn has_notes(&self) -> bool {
        self.notes.iter().any(|note| !note.text.trim().is_empty())
    }

    pub fn set_estimated_value(&mut self, value: Option<f64>) -> Result<(), DomainError> {
        if let Some(v) = value {
            if !v.is_finite() || v < 0.0 {
                return Err(DomainError::ValidationError(format!(
                    "estimated value must be a non-negative amount (got {})",
                    v
                )));
            }
        }
        self.estimated_value = value;
        Ok(())
    }
}

/// Pure lookup against the status graph
pub fn can_transition(from: LeadStatus, to: LeadStatus) -> bool {
    from.allowed_transitions().contains(&to)
}

/// Move `lead` to `to` if the status graph allows it. Only `status` changes.
pub fn apply_transition(lead: &mut Lead, to: LeadStatus) -> Result<(), DomainError> {
    if !can_transition(lead.status, to) {
        return Err(DomainError::InvalidTransition {
            from: lead.status,
            to,
        });
    }
    lead.status = to;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, day, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_apply_transition_matches_can_transition() {
        for from in LeadStatus::ALL {
            for to in LeadStatus::ALL {
                let mut lead = Lead::new(1, LeadSource::Website, at(1));
                lead.status = from;
                let applied = apply_transition(&mut lead, to);
                assert_eq!(applied.is_ok(), can_transition(from, to), "{} -> {}", from, to);
                if applied.is_ok() {
                    assert_eq!(lead.status, to);
                } else {
                    assert_eq!(lead.status, from);
                }
            }
        }
    }

    #[test]
    fn test_won_is_terminal() {
        assert!(LeadStatus::Won.allowed_transitions().is_empty());
    }

    #[test]
    fn test_only_lost_reopens() {
        let reopening: Vec<_> = LeadStatus::ALL
            .into_iter()
            .filter(|from| can_transition(*from, LeadStatus::New))
            .collect();
        assert_eq!(reopening, vec![LeadStatus::Lost]);
    }

    #[test]
    fn test_qualified_to_contacted_rejected() {
        let mut lead = Lead::new(1, LeadSource::Website, at(1));
        lead.status = LeadStatus::Qualified;
        let err = apply_transition(&mut lead, LeadStatus::Contacted).unwrap_err();
        assert_eq!(
            err,
            DomainError::InvalidTransition {
                from: LeadStatus::Qualified,
                to: LeadStatus::Contacted
            }
        );
        assert_eq!(
            err.to_string(),
            "Cannot transition lead from qualified to contacted"
        );
    }

    #[test]
    fn test_days_in_current_status_rounds_up() {
        let lead = Lead::new(1, LeadSource::Website, at(1));
        assert_eq!(lead.days_in_current_status(at(1)), 0);
        assert_eq!(lead.days_in_current_status(at(1) + Duration::hours(3)), 1);
        assert_eq!(lead.days_in_current_status(at(8)), 7);
    }

    #[test]
    fn test_add_note_ignores_blank_text() {
        let mut lead = Lead::new(1, LeadSource::Website, at(1));
        lead.add_note("   ", at(2));
        assert!(!lead.has_notes());

        lead.add_note("called back", at(2));
        assert!(lead.has_notes());
        assert!(lead.notes[0].to_string().ends_with("] called back"));
    }

    #[test]
    fn test_estimated_value_must_be_non_negative() {
        let mut lead = Lead::new(1, LeadSource::Website, at(1));
        assert!(lead.set_estimated_value(Some(-1.0)).is_err());
        assert!(lead.set_estimated_value(Some(10.0)).is_ok());
        assert_eq!(lead.estimated_value, Some(10.0));
    }

    #[test]
    fn test_open_closed_won() {
        let mut lead = Lead::new(1, LeadSource::Website, at(1));
        assert!(lead.is_open());
        lead.status = LeadStatus::Won;
        assert!(lead.is_closed());
        assert!(lead.is_won());
    }
}
