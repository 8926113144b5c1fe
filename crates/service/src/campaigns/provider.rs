use std::sync::Mutex;

use async_trait::async_trait;
use configs::EmailConfig;
use models::campaign::CampaignStats;
use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::debug;

use crate::errors::ServiceError;

/// One campaign message, as handed to a provider.
#[derive(Clone, Debug)]
pub struct OutgoingEmail {
    pub subject: String,
    pub from_name: String,
    pub from_address: String,
    pub html_body: String,
}

#[async_trait]
pub trait EmailProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Largest recipient list accepted by one `send_batch` call.
    fn max_batch_size(&self) -> usize;

    async fn send_batch(&self, email: &OutgoingEmail, recipients: &[String]) -> Result<CampaignStats, ServiceError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderKind {
    Mailchimp,
    Sendgrid,
}

impl ProviderKind {
    pub fn parse(name: &str) -> Result<Self, ServiceError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "mailchimp" => Ok(Self::Mailchimp),
            "sendgrid" => Ok(Self::Sendgrid),
            other => Err(ServiceError::Validation(format!("unknown email provider `{other}`"))),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Mailchimp => "mailchimp",
            Self::Sendgrid => "sendgrid",
        }
    }

    fn batch_size(self) -> usize {
        match self {
            Self::Mailchimp => 500,
            Self::Sendgrid => 1_000,
        }
    }
}

/// Engagement probabilities for the simulation, each within `[0, 1]`.
#[derive(Clone, Copy, Debug)]
pub struct EngagementRates {
    pub delivery: f64,
    pub open: f64,
    pub click: f64,
    pub unsubscribe: f64,
}

/// Stands in for a real ESP: every recipient is rolled for delivery, then opens,
/// clicks (only among opens) and unsubscribes (among delivered).
pub struct SimulatedProvider {
    kind: ProviderKind,
    rates: EngagementRates,
    rng: Mutex<StdRng>,
}

impl SimulatedProvider {
    pub fn new(kind: ProviderKind, rates: EngagementRates, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { kind, rates, rng: Mutex::new(rng) }
    }

    pub fn from_config(cfg: &EmailConfig) -> Result<Self, ServiceError> {
        let rates = EngagementRates {
            delivery: cfg.delivery_rate,
            open: cfg.open_rate,
            click: cfg.click_rate,
            unsubscribe: cfg.unsubscribe_rate,
        };
        Ok(Self::new(ProviderKind::parse(&cfg.provider)?, rates, cfg.seed))
    }

    fn simulate(&self, recipients: usize) -> Result<CampaignStats, ServiceError> {
        let mut rng = self.rng.lock().map_err(|_| ServiceError::Provider("provider rng poisoned".into()))?;
        let p = |rate: f64| rate.clamp(0.0, 1.0);
        // clicks are drawn among opens, so scale to keep click/delivered near the configured rate
        let click_given_open = if self.rates.open > 0.0 { p(self.rates.click / self.rates.open) } else { 0.0 };

        let mut stats = CampaignStats { recipients: recipients as u64, ..Default::default() };
        for _ in 0..recipients {
            if !rng.gen_bool(p(self.rates.delivery)) {
                stats.bounced += 1;
                continue;
            }
            stats.delivered += 1;
            if rng.gen_bool(p(self.rates.open)) {
                stats.opened += 1;
                if rng.gen_bool(click_given_open) {
                    stats.clicked += 1;
                }
            }
            if rng.gen_bool(p(self.rates.unsubscribe)) {
                stats.unsubscribed += 1;
            }
        }
        Ok(stats)
    }
}

#[async_trait]
impl EmailProvider for SimulatedProvider {
    fn name(&self) -> &str {
        self.kind.name()
    }

    fn max_batch_size(&self) -> usize {
        self.kind.batch_size()
    }

    async fn send_batch(&self, email: &OutgoingEmail, recipients: &[String]) -> Result<CampaignStats, ServiceError> {
        if recipients.len() > self.max_batch_size() {
            return Err(ServiceError::Provider(format!(
                "{} accepts at most {} recipients per batch",
                self.name(),
                self.max_batch_size()
            )));
        }
        let stats = self.simulate(recipients.len())?;
        debug!(provider = self.name(), subject = %email.subject, recipients = recipients.len(), delivered = stats.delivered, "batch sent");
        Ok(stats)
    }
}

/// Sum of two batch reports.
pub fn merge_stats(a: CampaignStats, b: CampaignStats) -> CampaignStats {
    CampaignStats {
        recipients: a.recipients + b.recipients,
        delivered: a.delivered + b.delivered,
        bounced: a.bounced + b.bounced,
        opened: a.opened + b.opened,
        clicked: a.clicked + b.clicked,
        unsubscribed: a.unsubscribed + b.unsubscribed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email() -> OutgoingEmail {
        OutgoingEmail { subject: "Hi".into(), from_name: "Shop".into(), from_address: "news@example.com".into(), html_body: "<p>x</p>".into() }
    }

    fn recipients(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("user{i}@example.com")).collect()
    }

    #[tokio::test]
    async fn seeded_simulation_is_reproducible_and_consistent() -> anyhow::Result<()> {
        let rates = EngagementRates { delivery: 0.9, open: 0.3, click: 0.1, unsubscribe: 0.01 };
        let a = SimulatedProvider::new(ProviderKind::Mailchimp, rates, Some(42));
        let b = SimulatedProvider::new(ProviderKind::Mailchimp, rates, Some(42));
        let sa = a.send_batch(&email(), &recipients(400)).await?;
        let sb = b.send_batch(&email(), &recipients(400)).await?;
        assert_eq!(sa, sb);
        assert_eq!(sa.recipients, 400);
        assert_eq!(sa.delivered + sa.bounced, 400);
        assert!(sa.opened <= sa.delivered);
        assert!(sa.clicked <= sa.opened);
        assert!(sa.delivered > 300);
        Ok(())
    }

    #[tokio::test]
    async fn certain_rates_give_exact_counts() -> anyhow::Result<()> {
        let rates = EngagementRates { delivery: 1.0, open: 1.0, click: 0.0, unsubscribe: 0.0 };
        let provider = SimulatedProvider::new(ProviderKind::Sendgrid, rates, None);
        let stats = provider.send_batch(&email(), &recipients(10)).await?;
        assert_eq!((stats.delivered, stats.opened, stats.clicked), (10, 10, 0));
        assert_eq!(provider.name(), "sendgrid");
        Ok(())
    }

    #[tokio::test]
    async fn oversized_batches_are_refused() {
        let rates = EngagementRates { delivery: 1.0, open: 0.0, click: 0.0, unsubscribe: 0.0 };
        let provider = SimulatedProvider::new(ProviderKind::Mailchimp, rates, Some(1));
        let res = provider.send_batch(&email(), &recipients(501)).await;
        assert!(matches!(res, Err(ServiceError::Provider(_))));
        assert!(ProviderKind::parse("smtp").is_err());
    }
}
