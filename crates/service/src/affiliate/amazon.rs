use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use models::affiliate::validate_asin;
use models::round_cents;
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::ServiceError;

/// A marketplace listing as returned by the product catalog API.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CatalogItem {
    pub asin: String,
    pub title: String,
    pub price: f64,
    pub currency: String,
    pub detail_url: String,
    pub image_url: String,
}

#[async_trait]
pub trait ProductCatalogClient: Send + Sync {
    async fn search(&self, keywords: &str) -> Result<Vec<CatalogItem>, ServiceError>;
    async fn get_item(&self, asin: &str) -> Result<Option<CatalogItem>, ServiceError>;
}

/// Offline stand-in for the Product Advertising API. Results are derived from
/// the query alone, so the same keywords always yield the same items.
pub struct StubAmazonClient {
    marketplace_host: String,
    currency: String,
}

const RESULTS_PER_SEARCH: u64 = 3;

impl StubAmazonClient {
    pub fn new(marketplace_host: impl Into<String>, currency: impl Into<String>) -> Self {
        Self { marketplace_host: marketplace_host.into(), currency: currency.into() }
    }

    fn item(&self, asin: String, title: String, seed: u64) -> CatalogItem {
        CatalogItem {
            detail_url: format!("https://{}/dp/{asin}", self.marketplace_host),
            image_url: format!("https://images.example.com/{asin}.jpg"),
            price: round_cents(4.99 + (seed % 9_500) as f64 / 100.0),
            currency: self.currency.clone(),
            asin,
            title,
        }
    }
}

fn fnv1a(text: &str) -> u64 {
    text.bytes().fold(0xcbf2_9ce4_8422_2325_u64, |hash, b| (hash ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3))
}

/// `B0` followed by eight base-36 digits of `seed`.
fn asin_from(seed: u64) -> String {
    const ALPHABET: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    let mut n = seed;
    let mut tail = [b'0'; 8];
    for slot in tail.iter_mut().rev() {
        *slot = ALPHABET[(n % 36) as usize];
        n /= 36;
    }
    format!("B0{}", String::from_utf8_lossy(&tail))
}

#[async_trait]
impl ProductCatalogClient for StubAmazonClient {
    async fn search(&self, keywords: &str) -> Result<Vec<CatalogItem>, ServiceError> {
        let keywords = keywords.trim();
        if keywords.is_empty() {
            return Err(ServiceError::Validation("keywords required".into()));
        }
        Ok((0..RESULTS_PER_SEARCH)
            .map(|i| {
                let seed = fnv1a(&format!("{}#{i}", keywords.to_lowercase()));
                self.item(asin_from(seed), format!("{keywords} - option {}", i + 1), seed)
            })
            .collect())
    }

    async fn get_item(&self, asin: &str) -> Result<Option<CatalogItem>, ServiceError> {
        validate_asin(asin)?;
        let seed = fnv1a(asin);
        Ok(Some(self.item(asin.to_string(), format!("Item {asin}"), seed)))
    }
}

/// Wraps a client with TTL caches for searches and item lookups.
pub struct CachedCatalogClient {
    inner: Arc<dyn ProductCatalogClient>,
    searches: Cache<String, Vec<CatalogItem>>,
    items: Cache<String, Option<CatalogItem>>,
}

impl CachedCatalogClient {
    pub fn new(inner: Arc<dyn ProductCatalogClient>, capacity: u64, ttl: Duration) -> Self {
        Self {
            inner,
            searches: Cache::builder().max_capacity(capacity).time_to_live(ttl).build(),
            items: Cache::builder().max_capacity(capacity).time_to_live(ttl).build(),
        }
    }
}

#[async_trait]
impl ProductCatalogClient for CachedCatalogClient {
    async fn search(&self, keywords: &str) -> Result<Vec<CatalogItem>, ServiceError> {
        let key = keywords.trim().to_lowercase();
        if let Some(hit) = self.searches.get(&key).await {
            debug!(keywords = %key, "catalog search cache hit");
            return Ok(hit);
        }
        let items = self.inner.search(keywords).await?;
        self.searches.insert(key, items.clone()).await;
        Ok(items)
    }

    async fn get_item(&self, asin: &str) -> Result<Option<CatalogItem>, ServiceError> {
        if let Some(hit) = self.items.get(asin).await {
            return Ok(hit);
        }
        let item = self.inner.get_item(asin).await?;
        self.items.insert(asin.to_string(), item.clone()).await;
        Ok(item)
    }
}
