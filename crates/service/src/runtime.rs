//! Runtime wiring
//!
//! Opens every store under the configured data directory and hands the
//! services out as one cloneable bundle.

use std::{path::Path, sync::Arc, time::Duration};

use configs::AppConfig;
use models::customer::SegmentRules;
use models::order::PricingRules;
use tracing::info;

use crate::ab_testing::AbTestService;
use crate::affiliate::AffiliateService;
use crate::analytics::AnalyticsService;
use crate::campaigns::provider::SimulatedProvider;
use crate::campaigns::CampaignService;
use crate::catalog::CatalogService;
use crate::content::ContentService;
use crate::customers::CustomerService;
use crate::errors::ServiceError;
use crate::orders::OrderService;
use crate::scheduler::Scheduler;

/// Ensure expected directories exist; warn on missing optional ones.
pub async fn ensure_env(static_dir: Option<&str>, data_dir: &str) -> anyhow::Result<()> {
    common::env::ensure_env(static_dir.map(Path::new), Path::new(data_dir)).await
}

pub fn segment_rules(cfg: &AppConfig) -> SegmentRules {
    let s = &cfg.segmentation;
    SegmentRules {
        new_customer_days: s.new_customer_days,
        at_risk_days: s.at_risk_days,
        inactive_days: s.inactive_days,
        vip_min_spend: s.vip_min_spend,
        vip_min_orders: s.vip_min_orders,
    }
}

pub fn pricing_rules(cfg: &AppConfig) -> PricingRules {
    PricingRules {
        tax_rate: cfg.shop.tax_rate,
        free_shipping_threshold: cfg.shop.free_shipping_threshold,
        flat_shipping: cfg.shop.flat_shipping,
    }
}

#[derive(Clone)]
pub struct Services {
    pub catalog: CatalogService,
    pub customers: CustomerService,
    pub orders: OrderService,
    pub affiliate: AffiliateService,
    pub content: ContentService,
    pub campaigns: CampaignService,
    pub ab_tests: AbTestService,
    pub analytics: AnalyticsService,
    pub low_stock_threshold: u32,
}

impl Services {
    pub async fn open(cfg: &AppConfig) -> Result<Self, ServiceError> {
        let dir = Path::new(&cfg.storage.data_dir);
        let catalog = CatalogService::open(dir).await?;
        let customers = CustomerService::open(dir, segment_rules(cfg)).await?;
        let orders = OrderService::open(dir, catalog.clone(), customers.clone(), pricing_rules(cfg)).await?;
        let affiliate = AffiliateService::open(dir, &cfg.affiliate, &cfg.shop.currency).await?;
        let content = ContentService::open(dir).await?;
        let provider = Arc::new(SimulatedProvider::from_config(&cfg.email)?);
        let campaigns = CampaignService::open(dir, customers.clone(), provider, cfg.email.from_address.clone()).await?;
        let ab_tests = AbTestService::open(dir).await?;
        let analytics = AnalyticsService::open(dir, orders.clone(), customers.clone(), cfg.analytics.retention_days).await?;
        info!(data_dir = %dir.display(), email_provider = campaigns.provider_name(), "services ready");

        Ok(Self {
            catalog,
            customers,
            orders,
            affiliate,
            content,
            campaigns,
            ab_tests,
            analytics,
            low_stock_threshold: cfg.shop.low_stock_threshold,
        })
    }

    pub fn scheduler(&self, interval: Duration) -> Scheduler {
        Scheduler::new(self.content.clone(), self.campaigns.clone(), interval).with_analytics(self.analytics.clone())
    }
}
