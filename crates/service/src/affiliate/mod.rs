//! Affiliate links with click/conversion tracking, plus marketplace lookups
//! through a cached [`ProductCatalogClient`].

pub mod amazon;

use std::{path::Path, sync::Arc, time::Duration};

use chrono::Utc;
use common::metrics::AFFILIATE_CLICKS_TOTAL;
use configs::AffiliateConfig;
use models::affiliate::{AffiliateLink, AffiliateLinkInput, AffiliateLinkView, LinkStats};
use models::{non_blank, round_cents};
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::pagination::{Page, Pagination};
use crate::storage::{keys, JsonMapStore};
use amazon::{CachedCatalogClient, CatalogItem, ProductCatalogClient, StubAmazonClient};

#[derive(Clone)]
pub struct AffiliateService {
    store: Arc<JsonMapStore<Uuid, AffiliateLink>>,
    catalog: Arc<dyn ProductCatalogClient>,
    default_tag: String,
    marketplace_host: String,
}

impl AffiliateService {
    /// `currency` labels catalog prices; it is the shop's configured currency.
    pub async fn open(data_dir: &Path, cfg: &AffiliateConfig, currency: &str) -> Result<Self, ServiceError> {
        let stub = Arc::new(StubAmazonClient::new(cfg.marketplace_host.clone(), currency));
        let cached = CachedCatalogClient::new(stub, cfg.cache_capacity, Duration::from_secs(cfg.cache_ttl_secs));
        Self::with_client(data_dir, cfg, Arc::new(cached)).await
    }

    pub async fn with_client(
        data_dir: &Path,
        cfg: &AffiliateConfig,
        catalog: Arc<dyn ProductCatalogClient>,
    ) -> Result<Self, ServiceError> {
        Ok(Self {
            store: JsonMapStore::new(data_dir.join(keys::AFFILIATE_LINKS)).await?,
            catalog,
            default_tag: cfg.default_tag.clone(),
            marketplace_host: cfg.marketplace_host.clone(),
        })
    }

    pub async fn list(&self, page: Pagination) -> Page<AffiliateLinkView> {
        let mut items = self.store.values().await;
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.name.cmp(&b.name)));
        page.paginate(items).map(AffiliateLinkView::from)
    }

    pub async fn get(&self, id: Uuid) -> Result<AffiliateLinkView, ServiceError> {
        self.store.get(&id).await.map(AffiliateLinkView::from).ok_or_else(|| ServiceError::not_found("affiliate link"))
    }

    /// Destination and tag after defaults: an ASIN-only link points at the
    /// marketplace detail page.
    fn resolve(&self, input: &AffiliateLinkInput) -> Result<(String, String, Option<String>), ServiceError> {
        input.validate()?;
        let asin = non_blank(input.asin.clone());
        let destination = match (non_blank(input.destination_url.clone()), &asin) {
            (Some(url), _) => url,
            (None, Some(asin)) => format!("https://{}/dp/{asin}", self.marketplace_host),
            (None, None) => return Err(ServiceError::Validation("destination_url or asin required".into())),
        };
        let tag = non_blank(input.tracking_tag.clone()).unwrap_or_else(|| self.default_tag.clone());
        Ok((destination, tag, asin))
    }

    pub async fn create(&self, input: AffiliateLinkInput) -> Result<AffiliateLinkView, ServiceError> {
        let (destination_url, tracking_tag, asin) = self.resolve(&input)?;
        let now = Utc::now();
        let link = AffiliateLink {
            id: Uuid::new_v4(),
            name: input.name.trim().to_string(),
            destination_url,
            tracking_tag,
            asin,
            product_id: input.product_id,
            clicks: 0,
            conversions: 0,
            revenue: 0.0,
            created_at: now,
            updated_at: now,
        };
        self.store.insert(link.id, link.clone()).await?;
        info!(link_id = %link.id, tag = %link.tracking_tag, "affiliate link created");
        Ok(link.into())
    }

    /// Edits keep the counters.
    pub async fn update(&self, id: Uuid, input: AffiliateLinkInput) -> Result<AffiliateLinkView, ServiceError> {
        let (destination_url, tracking_tag, asin) = self.resolve(&input)?;
        let link = self
            .store
            .update(&id, "affiliate link", |link| {
                link.name = input.name.trim().to_string();
                link.destination_url = destination_url;
                link.tracking_tag = tracking_tag;
                link.asin = asin;
                link.product_id = input.product_id;
                link.updated_at = Utc::now();
                Ok(link.clone())
            })
            .await?;
        Ok(link.into())
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool, ServiceError> {
        self.store.remove(&id).await
    }

    /// Count a click and hand back the URL to redirect to.
    pub async fn record_click(&self, id: Uuid) -> Result<String, ServiceError> {
        let url = self
            .store
            .update(&id, "affiliate link", |link| {
                link.clicks += 1;
                link.updated_at = Utc::now();
                Ok(link.tracked_url())
            })
            .await?;
        AFFILIATE_CLICKS_TOTAL.inc();
        debug!(link_id = %id, "affiliate click");
        Ok(url)
    }

    pub async fn record_conversion(&self, id: Uuid, amount: f64) -> Result<LinkStats, ServiceError> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(ServiceError::Validation("amount must be a non-negative number".into()));
        }
        self.store
            .update(&id, "affiliate link", |link| {
                link.conversions += 1;
                link.revenue = round_cents(link.revenue + amount);
                link.updated_at = Utc::now();
                Ok(link.stats())
            })
            .await
    }

    pub async fn stats(&self, id: Uuid) -> Result<LinkStats, ServiceError> {
        Ok(self.get(id).await?.link.stats())
    }

    pub async fn search_catalog(&self, keywords: &str) -> Result<Vec<CatalogItem>, ServiceError> {
        self.catalog.search(keywords).await
    }

    pub async fn catalog_item(&self, asin: &str) -> Result<CatalogItem, ServiceError> {
        self.catalog.get_item(asin).await?.ok_or_else(|| ServiceError::not_found("catalog item"))
    }
}
