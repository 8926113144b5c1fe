use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::customer::Segment;
use crate::errors::ModelError;
use crate::validate_name;

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    #[default]
    Draft,
    Scheduled,
    Sending,
    Sent,
    Failed,
}

impl CampaignStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CampaignStatus::Draft => "draft",
            CampaignStatus::Scheduled => "scheduled",
            CampaignStatus::Sending => "sending",
            CampaignStatus::Sent => "sent",
            CampaignStatus::Failed => "failed",
        }
    }

    /// Only campaigns that have not gone out may be edited, rescheduled or deleted.
    pub fn is_editable(self) -> bool {
        matches!(self, CampaignStatus::Draft | CampaignStatus::Scheduled)
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CampaignStats {
    pub recipients: u64,
    pub delivered: u64,
    pub bounced: u64,
    pub opened: u64,
    pub clicked: u64,
    pub unsubscribed: u64,
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq)]
pub struct CampaignMetrics {
    pub open_rate: f64,
    pub click_rate: f64,
    pub click_to_open_rate: f64,
    pub bounce_rate: f64,
    pub unsubscribe_rate: f64,
}

fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        (part as f64 / whole as f64 * 10_000.0).round() / 10_000.0
    }
}

impl CampaignStats {
    /// Engagement rates relative to delivered mail; bounces relative to recipients.
    pub fn metrics(&self) -> CampaignMetrics {
        CampaignMetrics {
            open_rate: ratio(self.opened, self.delivered),
            click_rate: ratio(self.clicked, self.delivered),
            click_to_open_rate: ratio(self.clicked, self.opened),
            bounce_rate: ratio(self.bounced, self.recipients),
            unsubscribe_rate: ratio(self.unsubscribed, self.delivered),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EmailCampaign {
    pub id: Uuid,
    pub name: String,
    pub subject: String,
    pub from_name: String,
    pub html_body: String,
    pub segment: Option<Segment>,
    pub status: CampaignStatus,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub provider: Option<String>,
    pub last_error: Option<String>,
    pub stats: CampaignStats,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CampaignInput {
    pub name: String,
    pub subject: String,
    pub from_name: String,
    pub html_body: String,
    #[serde(default)]
    pub segment: Option<Segment>,
}

impl CampaignInput {
    pub fn validate(&self) -> Result<(), ModelError> {
        validate_name("name", &self.name)?;
        validate_name("from_name", &self.from_name)?;
        if self.subject.trim().is_empty() {
            return Err(ModelError::validation("subject required"));
        }
        if self.subject.chars().count() > 150 {
            return Err(ModelError::validation("subject too long (<=150)"));
        }
        if self.html_body.trim().is_empty() {
            return Err(ModelError::validation("html_body required"));
        }
        Ok(())
    }
}

impl EmailCampaign {
    pub fn from_input(input: CampaignInput, now: DateTime<Utc>) -> Self {
        let mut campaign = Self {
            id: Uuid::new_v4(),
            name: String::new(),
            subject: String::new(),
            from_name: String::new(),
            html_body: String::new(),
            segment: None,
            status: CampaignStatus::Draft,
            scheduled_at: None,
            sent_at: None,
            provider: None,
            last_error: None,
            stats: CampaignStats::default(),
            created_at: now,
            updated_at: now,
        };
        campaign.apply(input, now);
        campaign
    }

    pub fn apply(&mut self, input: CampaignInput, now: DateTime<Utc>) {
        self.name = input.name.trim().to_string();
        self.subject = input.subject.trim().to_string();
        self.from_name = input.from_name.trim().to_string();
        self.html_body = input.html_body;
        self.segment = input.segment;
        self.updated_at = now;
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == CampaignStatus::Scheduled && self.scheduled_at.map_or(false, |at| at <= now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_use_delivered_as_base() {
        let stats = CampaignStats { recipients: 100, delivered: 80, bounced: 20, opened: 20, clicked: 4, unsubscribed: 1 };
        let m = stats.metrics();
        assert_eq!(m.open_rate, 0.25);
        assert_eq!(m.click_rate, 0.05);
        assert_eq!(m.click_to_open_rate, 0.2);
        assert_eq!(m.bounce_rate, 0.2);
        assert_eq!(m.unsubscribe_rate, 0.0125);
    }

    #[test]
    fn empty_stats_do_not_divide_by_zero() {
        let m = CampaignStats::default().metrics();
        assert_eq!(m.open_rate, 0.0);
        assert_eq!(m.bounce_rate, 0.0);
    }

    #[test]
    fn subject_and_body_required() {
        let input = CampaignInput {
            name: "Spring".into(),
            subject: " ".into(),
            from_name: "Shop".into(),
            html_body: "<p>Hi</p>".into(),
            segment: Some(Segment::Vip),
        };
        assert!(input.validate().is_err());
        let ok = CampaignInput { subject: "Spring is here".into(), ..input };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn only_unsent_campaigns_are_editable() {
        assert!(CampaignStatus::Draft.is_editable());
        assert!(CampaignStatus::Scheduled.is_editable());
        assert!(!CampaignStatus::Sent.is_editable());
        assert!(!CampaignStatus::Sending.is_editable());
    }
}
