use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ModelError;
use crate::{non_blank, normalize_tags, round_cents, validate_email, validate_name};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Segment {
    New,
    Returning,
    Vip,
    AtRisk,
    Inactive,
}

impl Segment {
    pub const ALL: [Segment; 5] =
        [Segment::New, Segment::Returning, Segment::Vip, Segment::AtRisk, Segment::Inactive];

    pub fn as_str(self) -> &'static str {
        match self {
            Segment::New => "new",
            Segment::Returning => "returning",
            Segment::Vip => "vip",
            Segment::AtRisk => "at_risk",
            Segment::Inactive => "inactive",
        }
    }
}

/// Thresholds driving [`segment_of`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SegmentRules {
    pub new_customer_days: i64,
    pub at_risk_days: i64,
    pub inactive_days: i64,
    pub vip_min_spend: f64,
    pub vip_min_orders: u32,
}

impl Default for SegmentRules {
    fn default() -> Self {
        Self { new_customer_days: 30, at_risk_days: 90, inactive_days: 180, vip_min_spend: 1000.0, vip_min_orders: 10 }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Customer {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub tags: Vec<String>,
    pub order_count: u32,
    pub total_spent: f64,
    pub last_order_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CustomerInput {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl CustomerInput {
    pub fn validate(&self) -> Result<(), ModelError> {
        validate_name("name", &self.name)?;
        validate_email(&self.email)
    }
}

impl Customer {
    pub fn from_input(input: CustomerInput, now: DateTime<Utc>) -> Self {
        let mut customer = Self {
            id: Uuid::new_v4(),
            name: String::new(),
            email: String::new(),
            phone: None,
            tags: Vec::new(),
            order_count: 0,
            total_spent: 0.0,
            last_order_at: None,
            created_at: now,
            updated_at: now,
        };
        customer.apply(input, now);
        customer
    }

    pub fn apply(&mut self, input: CustomerInput, now: DateTime<Utc>) {
        self.name = input.name.trim().to_string();
        self.email = input.email.trim().to_ascii_lowercase();
        self.phone = non_blank(input.phone);
        self.tags = normalize_tags(input.tags);
        self.updated_at = now;
    }

    pub fn record_order(&mut self, amount: f64, at: DateTime<Utc>) {
        self.order_count += 1;
        self.total_spent = round_cents(self.total_spent + amount);
        if self.last_order_at.map_or(true, |last| at > last) {
            self.last_order_at = Some(at);
        }
        self.updated_at = at;
    }

    /// Undo the spend of a cancelled or refunded order. `last_order_at` is kept.
    pub fn reverse_order(&mut self, amount: f64, now: DateTime<Utc>) {
        self.order_count = self.order_count.saturating_sub(1);
        self.total_spent = round_cents((self.total_spent - amount).max(0.0));
        self.updated_at = now;
    }

    pub fn matches_search(&self, query: &str) -> bool {
        let q = query.trim().to_lowercase();
        q.is_empty() || self.name.to_lowercase().contains(&q) || self.email.contains(&q)
    }
}

/// Classify a customer. Rules are evaluated top to bottom; the first match wins.
pub fn segment_of(customer: &Customer, rules: &SegmentRules, now: DateTime<Utc>) -> Segment {
    let last_order = match customer.last_order_at {
        Some(at) if customer.order_count > 0 => at,
        _ => {
            let age_days = (now - customer.created_at).num_days();
            return if age_days <= rules.new_customer_days { Segment::New } else { Segment::Inactive };
        }
    };

    let idle_days = (now - last_order).num_days();
    if idle_days > rules.inactive_days {
        Segment::Inactive
    } else if idle_days > rules.at_risk_days {
        Segment::AtRisk
    } else if customer.total_spent >= rules.vip_min_spend || customer.order_count >= rules.vip_min_orders {
        Segment::Vip
    } else if customer.order_count >= 2 {
        Segment::Returning
    } else {
        Segment::New
    }
}

/// Customer as served to the dashboard, with its segment resolved.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct CustomerView {
    #[serde(flatten)]
    pub customer: Customer,
    pub segment: Segment,
}
