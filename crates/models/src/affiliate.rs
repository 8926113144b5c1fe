use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ModelError;
use crate::{non_blank, round_cents, validate_http_url, validate_name};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AffiliateLink {
    pub id: Uuid,
    pub name: String,
    pub destination_url: String,
    pub tracking_tag: String,
    pub asin: Option<String>,
    pub product_id: Option<Uuid>,
    pub clicks: u64,
    pub conversions: u64,
    pub revenue: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AffiliateLinkInput {
    pub name: String,
    #[serde(default)]
    pub destination_url: Option<String>,
    #[serde(default)]
    pub tracking_tag: Option<String>,
    #[serde(default)]
    pub asin: Option<String>,
    #[serde(default)]
    pub product_id: Option<Uuid>,
}

impl AffiliateLinkInput {
    pub fn validate(&self) -> Result<(), ModelError> {
        validate_name("name", &self.name)?;
        match (non_blank(self.destination_url.clone()), non_blank(self.asin.clone())) {
            (Some(url), _) => validate_http_url("destination_url", &url)?,
            (None, Some(asin)) => validate_asin(&asin)?,
            (None, None) => return Err(ModelError::validation("destination_url or asin required")),
        }
        if let Some(tag) = non_blank(self.tracking_tag.clone()) {
            if !tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
                return Err(ModelError::validation("tracking_tag may only contain letters, digits, '-' and '_'"));
            }
        }
        Ok(())
    }
}

/// Amazon standard identification numbers are ten uppercase alphanumerics.
pub fn validate_asin(asin: &str) -> Result<(), ModelError> {
    if asin.len() == 10 && asin.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()) {
        Ok(())
    } else {
        Err(ModelError::validation("asin must be 10 uppercase letters or digits"))
    }
}

impl AffiliateLink {
    pub fn tracked_url(&self) -> String {
        tracked_url(&self.destination_url, &self.tracking_tag)
    }

    pub fn stats(&self) -> LinkStats {
        let conversion_rate = if self.clicks == 0 { 0.0 } else { self.conversions as f64 / self.clicks as f64 };
        let earnings_per_click = if self.clicks == 0 { 0.0 } else { round_cents(self.revenue / self.clicks as f64) };
        LinkStats {
            clicks: self.clicks,
            conversions: self.conversions,
            revenue: self.revenue,
            conversion_rate,
            earnings_per_click,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LinkStats {
    pub clicks: u64,
    pub conversions: u64,
    pub revenue: f64,
    pub conversion_rate: f64,
    pub earnings_per_click: f64,
}

/// Link served to the dashboard, with the outbound URL resolved.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct AffiliateLinkView {
    #[serde(flatten)]
    pub link: AffiliateLink,
    pub tracked_url: String,
}

impl From<AffiliateLink> for AffiliateLinkView {
    fn from(link: AffiliateLink) -> Self {
        let tracked_url = link.tracked_url();
        Self { link, tracked_url }
    }
}

/// Append `tag=<tag>` to the query string, replacing any existing `tag` pair.
/// A `#fragment` stays at the end.
pub fn tracked_url(destination: &str, tag: &str) -> String {
    let (without_fragment, fragment) = match destination.split_once('#') {
        Some((head, frag)) => (head, Some(frag)),
        None => (destination, None),
    };
    let (base, query) = match without_fragment.split_once('?') {
        Some((base, query)) => (base, query),
        None => (without_fragment, ""),
    };

    let tag_pair = format!("tag={tag}");
    let mut pairs: Vec<&str> = query
        .split('&')
        .filter(|pair| !pair.is_empty() && pair.split('=').next() != Some("tag"))
        .collect();
    pairs.push(&tag_pair);

    let mut url = format!("{base}?{}", pairs.join("&"));
    if let Some(frag) = fragment {
        url.push('#');
        url.push_str(frag);
    }
    url
}
