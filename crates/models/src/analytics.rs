use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::customer::Segment;
use crate::errors::ModelError;
use crate::non_blank;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    PageView,
    ProductView,
    AddToCart,
    Checkout,
    Purchase,
    AffiliateClick,
    EmailOpen,
    EmailClick,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::PageView => "page_view",
            EventKind::ProductView => "product_view",
            EventKind::AddToCart => "add_to_cart",
            EventKind::Checkout => "checkout",
            EventKind::Purchase => "purchase",
            EventKind::AffiliateClick => "affiliate_click",
            EventKind::EmailOpen => "email_open",
            EventKind::EmailClick => "email_click",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AnalyticsEvent {
    pub id: Uuid,
    pub kind: EventKind,
    pub session_id: Option<String>,
    pub path: Option<String>,
    pub product_id: Option<Uuid>,
    pub value: Option<f64>,
    pub at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EventInput {
    pub kind: EventKind,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub product_id: Option<Uuid>,
    #[serde(default)]
    pub value: Option<f64>,
    /// Client timestamp; defaults to the time the event is received.
    #[serde(default)]
    pub at: Option<DateTime<Utc>>,
}

impl EventInput {
    pub fn validate(&self) -> Result<(), ModelError> {
        if let Some(value) = self.value {
            if !value.is_finite() || value < 0.0 {
                return Err(ModelError::validation("value must be a non-negative number"));
            }
        }
        if let Some(path) = &self.path {
            if !path.is_empty() && !path.starts_with('/') {
                return Err(ModelError::validation("path must start with '/'"));
            }
        }
        Ok(())
    }

    pub fn into_event(self, now: DateTime<Utc>) -> AnalyticsEvent {
        AnalyticsEvent {
            id: Uuid::new_v4(),
            kind: self.kind,
            session_id: non_blank(self.session_id),
            path: non_blank(self.path),
            product_id: self.product_id,
            value: self.value,
            at: self.at.unwrap_or(now),
        }
    }
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct TopProduct {
    pub product_id: Uuid,
    pub name: String,
    pub units: u64,
    pub revenue: f64,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct DailyPoint {
    pub date: NaiveDate,
    pub revenue: f64,
    pub orders: u64,
}

/// Everything the dashboard's cards and charts need in one payload.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct DashboardSummary {
    pub days: u32,
    pub revenue: f64,
    pub order_count: u64,
    pub average_order_value: f64,
    pub customer_count: u64,
    pub segments: BTreeMap<Segment, u64>,
    pub top_products: Vec<TopProduct>,
    pub daily_revenue: Vec<DailyPoint>,
    pub events_by_kind: BTreeMap<String, u64>,
    pub conversion_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_defaults_timestamp_and_blanks() {
        let now = Utc::now();
        let event = EventInput {
            kind: EventKind::PageView,
            session_id: Some(" ".into()),
            path: Some("/shop".into()),
            product_id: None,
            value: None,
            at: None,
        }
        .into_event(now);
        assert_eq!(event.at, now);
        assert_eq!(event.session_id, None);
        assert_eq!(event.path.as_deref(), Some("/shop"));
    }

    #[test]
    fn rejects_negative_values_and_relative_paths() {
        let mut input = EventInput { kind: EventKind::Purchase, session_id: None, path: None, product_id: None, value: Some(-1.0), at: None };
        assert!(input.validate().is_err());
        input.value = Some(10.0);
        input.path = Some("shop".into());
        assert!(input.validate().is_err());
    }

    #[test]
    fn kinds_serialize_snake_case() {
        assert_eq!(serde_json::to_string(&EventKind::AddToCart).unwrap(), "\"add_to_cart\"");
        assert_eq!(EventKind::AddToCart.as_str(), "add_to_cart");
    }
}
