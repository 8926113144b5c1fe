use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ModelError;
use crate::{non_blank, normalize_tags, round_cents, validate_name};

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    #[default]
    Active,
    Draft,
    Archived,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: Uuid,
    pub sku: String,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub compare_at_price: Option<f64>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub stock: u32,
    pub status: ProductStatus,
    pub image_urls: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create/update payload; `id` and timestamps are server-generated.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ProductInput {
    pub sku: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    #[serde(default)]
    pub compare_at_price: Option<f64>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub stock: u32,
    #[serde(default)]
    pub status: ProductStatus,
    #[serde(default)]
    pub image_urls: Vec<String>,
}

impl ProductInput {
    pub fn validate(&self) -> Result<(), ModelError> {
        validate_name("name", &self.name)?;
        if self.sku.trim().is_empty() {
            return Err(ModelError::validation("sku required"));
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(ModelError::validation("price must be a non-negative amount"));
        }
        if let Some(compare) = self.compare_at_price {
            if !compare.is_finite() || compare < self.price {
                return Err(ModelError::validation("compare_at_price must be >= price"));
            }
        }
        Ok(())
    }
}

impl Product {
    pub fn from_input(input: ProductInput, now: DateTime<Utc>) -> Self {
        let mut product = Self {
            id: Uuid::new_v4(),
            sku: String::new(),
            name: String::new(),
            description: String::new(),
            price: 0.0,
            compare_at_price: None,
            category: None,
            tags: Vec::new(),
            stock: 0,
            status: ProductStatus::Active,
            image_urls: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        product.apply(input, now);
        product
    }

    pub fn apply(&mut self, input: ProductInput, now: DateTime<Utc>) {
        self.sku = input.sku.trim().to_string();
        self.name = input.name.trim().to_string();
        self.description = input.description;
        self.price = round_cents(input.price);
        self.compare_at_price = input.compare_at_price.map(round_cents);
        self.category = non_blank(input.category);
        self.tags = normalize_tags(input.tags);
        self.stock = input.stock;
        self.status = input.status;
        self.image_urls = input.image_urls;
        self.updated_at = now;
    }

    /// Case-insensitive match against name, sku and description.
    pub fn matches_search(&self, query: &str) -> bool {
        let q = query.trim().to_lowercase();
        q.is_empty()
            || self.name.to_lowercase().contains(&q)
            || self.sku.to_lowercase().contains(&q)
            || self.description.to_lowercase().contains(&q)
    }

    /// Stock after applying `delta`, or an error when it would go negative.
    pub fn stock_after(&self, delta: i64) -> Result<u32, ModelError> {
        let next = i64::from(self.stock) + delta;
        if next < 0 {
            return Err(ModelError::validation(format!(
                "insufficient stock for {}: have {}, need {}",
                self.sku,
                self.stock,
                -delta
            )));
        }
        u32::try_from(next).map_err(|_| ModelError::validation("stock overflow"))
    }
}
