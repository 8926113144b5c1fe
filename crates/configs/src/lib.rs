use anyhow::anyhow;
use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub shop: ShopConfig,
    #[serde(default)]
    pub segmentation: SegmentationConfig,
    #[serde(default)]
    pub affiliate: AffiliateConfig,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub worker_threads: Option<usize>,
    /// Directory holding the dashboard's static assets, served at `/`.
    #[serde(default)]
    pub static_dir: Option<String>,
    /// `compact` or `json`.
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8080,
            worker_threads: Some(4),
            static_dir: None,
            log_format: default_log_format(),
        }
    }
}

fn default_log_format() -> String { "compact".into() }

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self { Self { data_dir: default_data_dir() } }
}

fn default_data_dir() -> String { "data".into() }

/// Static admin key. When unset the `/api` routes are open.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AdminConfig {
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShopConfig {
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_tax_rate")]
    pub tax_rate: f64,
    #[serde(default = "default_free_shipping_threshold")]
    pub free_shipping_threshold: f64,
    #[serde(default = "default_flat_shipping")]
    pub flat_shipping: f64,
    #[serde(default = "default_low_stock_threshold")]
    pub low_stock_threshold: u32,
}

impl Default for ShopConfig {
    fn default() -> Self {
        Self {
            currency: default_currency(),
            tax_rate: default_tax_rate(),
            free_shipping_threshold: default_free_shipping_threshold(),
            flat_shipping: default_flat_shipping(),
            low_stock_threshold: default_low_stock_threshold(),
        }
    }
}

fn default_currency() -> String { "USD".into() }
fn default_tax_rate() -> f64 { 0.08 }
fn default_free_shipping_threshold() -> f64 { 50.0 }
fn default_flat_shipping() -> f64 { 5.99 }
fn default_low_stock_threshold() -> u32 { 5 }

#[derive(Debug, Clone, Deserialize)]
pub struct SegmentationConfig {
    #[serde(default = "default_new_customer_days")]
    pub new_customer_days: i64,
    #[serde(default = "default_at_risk_days")]
    pub at_risk_days: i64,
    #[serde(default = "default_inactive_days")]
    pub inactive_days: i64,
    #[serde(default = "default_vip_min_spend")]
    pub vip_min_spend: f64,
    #[serde(default = "default_vip_min_orders")]
    pub vip_min_orders: u32,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            new_customer_days: default_new_customer_days(),
            at_risk_days: default_at_risk_days(),
            inactive_days: default_inactive_days(),
            vip_min_spend: default_vip_min_spend(),
            vip_min_orders: default_vip_min_orders(),
        }
    }
}

fn default_new_customer_days() -> i64 { 30 }
fn default_at_risk_days() -> i64 { 90 }
fn default_inactive_days() -> i64 { 180 }
fn default_vip_min_spend() -> f64 { 1000.0 }
fn default_vip_min_orders() -> u32 { 10 }

#[derive(Debug, Clone, Deserialize)]
pub struct AffiliateConfig {
    #[serde(default = "default_tracking_tag")]
    pub default_tag: String,
    #[serde(default = "default_marketplace_host")]
    pub marketplace_host: String,
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: u64,
}

impl Default for AffiliateConfig {
    fn default() -> Self {
        Self {
            default_tag: default_tracking_tag(),
            marketplace_host: default_marketplace_host(),
            cache_ttl_secs: default_cache_ttl(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

fn default_tracking_tag() -> String { "shopdesk-20".into() }
fn default_marketplace_host() -> String { "www.amazon.com".into() }
fn default_cache_ttl() -> u64 { 300 }
fn default_cache_capacity() -> u64 { 1_000 }

#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    /// `mailchimp` or `sendgrid`; both are simulated.
    #[serde(default = "default_email_provider")]
    pub provider: String,
    #[serde(default = "default_from_address")]
    pub from_address: String,
    #[serde(default = "default_delivery_rate")]
    pub delivery_rate: f64,
    #[serde(default = "default_open_rate")]
    pub open_rate: f64,
    #[serde(default = "default_click_rate")]
    pub click_rate: f64,
    #[serde(default = "default_unsubscribe_rate")]
    pub unsubscribe_rate: f64,
    /// Fixed RNG seed for reproducible simulated engagement.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            provider: default_email_provider(),
            from_address: default_from_address(),
            delivery_rate: default_delivery_rate(),
            open_rate: default_open_rate(),
            click_rate: default_click_rate(),
            unsubscribe_rate: default_unsubscribe_rate(),
            seed: None,
        }
    }
}

fn default_email_provider() -> String { "mailchimp".into() }
fn default_from_address() -> String { "news@example.com".into() }
fn default_delivery_rate() -> f64 { 0.97 }
fn default_open_rate() -> f64 { 0.25 }
fn default_click_rate() -> f64 { 0.05 }
fn default_unsubscribe_rate() -> f64 { 0.002 }

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_scheduler_enabled")]
    pub enabled: bool,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { enabled: default_scheduler_enabled(), interval_secs: default_interval_secs() }
    }
}

fn default_scheduler_enabled() -> bool { true }
fn default_interval_secs() -> u64 { 60 }

/// Tracked events older than `retention_days` are pruned by the scheduler.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyticsConfig {
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

impl Default for AnalyticsConfig {
    fn default() -> Self { Self { retention_days: default_retention_days() } }
}

fn default_retention_days() -> u32 { 400 }

pub fn load_from_file(path: &str) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    load_from_str(&content)
}

pub fn load_from_str(content: &str) -> Result<AppConfig> {
    let cfg: AppConfig = toml::from_str(content)?;
    Ok(cfg)
}

impl AppConfig {
    /// Read `config.toml` (or `CONFIG_PATH`), falling back to defaults when the
    /// file is absent, then apply env overrides and validate.
    pub fn load_and_validate() -> Result<Self> {
        let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        let mut cfg = if std::path::Path::new(&path).exists() {
            load_from_file(&path)?
        } else {
            AppConfig::default()
        };
        cfg.apply_env();
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    /// Environment variables win over the file.
    pub fn apply_env(&mut self) {
        if let Ok(host) = std::env::var("SERVER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = std::env::var("SERVER_PORT").ok().and_then(|p| p.parse::<u16>().ok()) {
            self.server.port = port;
        }
        if let Ok(dir) = std::env::var("DATA_DIR") {
            self.storage.data_dir = dir;
        }
        if let Ok(key) = std::env::var("ADMIN_API_KEY") {
            self.admin.api_key = Some(key);
        }
        if let Ok(provider) = std::env::var("EMAIL_PROVIDER") {
            self.email.provider = provider;
        }
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        self.server.normalize()?;
        if self.storage.data_dir.trim().is_empty() {
            self.storage.data_dir = default_data_dir();
        }
        if let Some(key) = &self.admin.api_key {
            if key.trim().is_empty() {
                self.admin.api_key = None;
            }
        }
        self.shop.validate()?;
        self.segmentation.validate()?;
        self.email.validate()?;
        if self.scheduler.interval_secs == 0 {
            return Err(anyhow!("scheduler.interval_secs must be >= 1"));
        }
        if self.analytics.retention_days == 0 {
            return Err(anyhow!("analytics.retention_days must be >= 1"));
        }
        Ok(())
    }
}

impl ServerConfig {
    fn normalize(&mut self) -> Result<()> {
        if self.host.trim().is_empty() {
            self.host = "127.0.0.1".to_string();
        }
        if self.port == 0 {
            return Err(anyhow!("server.port must be within 1..=65535"));
        }
        match self.worker_threads {
            Some(0) | None => self.worker_threads = Some(4),
            Some(_) => {}
        }
        Ok(())
    }
}

impl ShopConfig {
    fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.tax_rate) {
            return Err(anyhow!("shop.tax_rate must be within [0, 1)"));
        }
        if self.flat_shipping < 0.0 || self.free_shipping_threshold < 0.0 {
            return Err(anyhow!("shop shipping amounts must not be negative"));
        }
        Ok(())
    }
}

impl SegmentationConfig {
    fn validate(&self) -> Result<()> {
        if self.new_customer_days < 0 || self.at_risk_days <= 0 {
            return Err(anyhow!("segmentation day thresholds must be positive"));
        }
        if self.inactive_days <= self.at_risk_days {
            return Err(anyhow!("segmentation.inactive_days must exceed at_risk_days"));
        }
        if self.vip_min_spend <= 0.0 || self.vip_min_orders == 0 {
            return Err(anyhow!("segmentation VIP thresholds must be positive"));
        }
        Ok(())
    }
}

impl EmailConfig {
    fn validate(&self) -> Result<()> {
        let provider = self.provider.to_ascii_lowercase();
        if provider != "mailchimp" && provider != "sendgrid" {
            return Err(anyhow!("email.provider must be `mailchimp` or `sendgrid`"));
        }
        for (name, rate) in [
            ("delivery_rate", self.delivery_rate),
            ("open_rate", self.open_rate),
            ("click_rate", self.click_rate),
            ("unsubscribe_rate", self.unsubscribe_rate),
        ] {
            if !(0.0..=1.0).contains(&rate) {
                return Err(anyhow!("email.{name} must be within [0, 1]"));
            }
        }
        Ok(())
    }
}
