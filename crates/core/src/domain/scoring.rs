// Lead scoring engine (pure)

use crate::domain::lead::{Lead, LeadSource, LeadStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

const MAX_SCORE: i32 = 100;
const ACTIVITY_BONUS: i32 = 10;

const HIGH_PRIORITY_THRESHOLD: u8 = 70;
const MEDIUM_PRIORITY_THRESHOLD: u8 = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityBand {
    High,
    Medium,
    Low,
}

impl fmt::Display for PriorityBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PriorityBand::High => "high",
            PriorityBand::Medium => "medium",
            PriorityBand::Low => "low",
        })
    }
}

fn source_score(source: LeadSource) -> i32 {
    match source {
        LeadSource::Referral => 40,
        LeadSource::Website => 30,
        LeadSource::TradeShow => 25,
        LeadSource::EmailCampaign => 20,
        LeadSource::SocialMedia => 15,
        LeadSource::ColdCall => 10,
        LeadSource::Other => 5,
    }
}

fn value_bonus(value: f64) -> i32 {
    if value >= 100_000.0 {
        30
    } else if value >= 50_000.0 {
        25
    } else if value >= 25_000.0 {
        20
    } else if value >= 10_000.0 {
        15
    } else if value >= 5_000.0 {
        10
    } else {
        5
    }
}

/// Staleness penalty per status, else a bonus for very recent movement
fn urgency_adjustment(status: LeadStatus, days: i64) -> i32 {
    match status {
        LeadStatus::New if days > 7 => -10,
        LeadStatus::Contacted if days > 14 => -15,
        LeadStatus::Qualified if days > 30 => -20,
        _ if days <= 1 => 10,
        _ if days <= 3 => 5,
        _ => 0,
    }
}

/// Score a lead in `[0, 100]`
pub fn score(lead: &Lead, now: DateTime<Utc>) -> u8 {
    let mut total = source_score(lead.source);

    // a zero estimate counts as no estimate
    if let Some(value) = lead.estimated_value.filter(|value| *value > 0.0) {
        total += value_bonus(value);
    }

    total += urgency_adjustment(lead.status, lead.days_in_current_status(now));

    if lead.has_notes() {
        total += ACTIVITY_BONUS;
    }

    total.clamp(0, MAX_SCORE) as u8
}

/// Recompute and store the lead's score
pub fn rescore(lead: &mut Lead, now: DateTime<Utc>) -> u8 {
    lead.score = score(lead, now);
    lead.score
}

pub fn priority_band(score: u8) -> PriorityBand {
    if score >= HIGH_PRIORITY_THRESHOLD {
        PriorityBand::High
    } else if score >= MEDIUM_PRIORITY_THRESHOLD {
        PriorityBand::Medium
    } else {
        PriorityBand::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_referral_with_value_recent_and_note_scores_85() {
        let mut lead = Lead::new(1, LeadSource::Referral, now());
        lead.estimated_value = Some(60_000.0);
        lead.add_note("intro call booked", now());

        assert_eq!(score(&lead, now()), 85);
    }

    #[test]
    fn test_zero_value_earns_no_bonus() {
        let mut lead = Lead::new(1, LeadSource::Website, now());
        assert_eq!(score(&lead, now()), 40);

        lead.estimated_value = Some(0.0);
        assert_eq!(score(&lead, now()), 40);

        lead.estimated_value = Some(1.0);
        assert_eq!(score(&lead, now()), 45);
    }

    #[test]
    fn test_stale_statuses_are_penalized() {
        let mut lead = Lead::new(1, LeadSource::Website, now() - Duration::days(8));
        assert_eq!(score(&lead, now()), 20);

        lead.status = LeadStatus::Contacted;
        lead.status_changed_at = now() - Duration::days(15);
        assert_eq!(score(&lead, now()), 15);

        lead.status = LeadStatus::Qualified;
        lead.status_changed_at = now() - Duration::days(31);
        assert_eq!(score(&lead, now()), 10);
    }

    #[test]
    fn test_recent_bands() {
        let mut lead = Lead::new(1, LeadSource::Other, now() - Duration::days(3));
        assert_eq!(score(&lead, now()), 10);

        lead.status_changed_at = now() - Duration::days(5);
        assert_eq!(score(&lead, now()), 5);
    }

    #[test]
    fn test_score_is_clamped() {
        let mut lead = Lead::new(1, LeadSource::Referral, now());
        lead.estimated_value = Some(f64::MAX);
        lead.add_note("hot", now());
        assert_eq!(score(&lead, now()), 90);

        lead.estimated_value = Some(1e12);
        lead.status = LeadStatus::Won;
        assert!(score(&lead, now()) <= 100);

        let mut cold = Lead::new(2, LeadSource::Other, now() - Duration::days(100_000));
        cold.status = LeadStatus::Qualified;
        assert_eq!(score(&cold, now()), 0);
    }

    #[test]
    fn test_every_source_and_status_stays_in_range() {
        for source in LeadSource::ALL {
            for status in LeadStatus::ALL {
                for days in [0, 1, 2, 4, 8, 15, 31, 10_000] {
                    let mut lead = Lead::new(1, source, now() - Duration::days(days));
                    lead.status = status;
                    lead.estimated_value = Some(250_000.0);
                    lead.add_note("n", now());
                    assert!(score(&lead, now()) <= 100);
                }
            }
        }
    }

    #[test]
    fn test_priority_bands() {
        assert_eq!(priority_band(70), PriorityBand::High);
        assert_eq!(priority_band(69), PriorityBand::Medium);
        assert_eq!(priority_band(40), PriorityBand::Medium);
        assert_eq!(priority_band(39), PriorityBand::Low);
    }

    #[test]
    fn test_rescore_stores_score() {
        let mut lead = Lead::new(1, LeadSource::Website, now());
        assert_eq!(rescore(&mut lead, now()), 40);
        assert_eq!(lead.score, 40);
    }
}
