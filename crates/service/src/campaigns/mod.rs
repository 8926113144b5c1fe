pub mod provider;

use std::{path::Path, sync::Arc};

use chrono::{DateTime, Utc};
use common::metrics::EMAILS_SENT_TOTAL;
use models::campaign::{CampaignInput, CampaignMetrics, CampaignStats, CampaignStatus, EmailCampaign};
use serde::Deserialize;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::customers::CustomerService;
use crate::errors::ServiceError;
use crate::pagination::{Page, Pagination};
use crate::storage::{keys, JsonMapStore};
use provider::{merge_stats, EmailProvider, OutgoingEmail};

#[derive(Clone, Debug, Default, Deserialize)]
pub struct CampaignFilter {
    #[serde(default)]
    pub status: Option<CampaignStatus>,
}

/// Email campaigns: drafting, scheduling and delivery through an [`EmailProvider`].
#[derive(Clone)]
pub struct CampaignService {
    store: Arc<JsonMapStore<Uuid, EmailCampaign>>,
    customers: CustomerService,
    provider: Arc<dyn EmailProvider>,
    from_address: String,
}

fn ensure_editable(campaign: &EmailCampaign) -> Result<(), ServiceError> {
    if campaign.status.is_editable() {
        Ok(())
    } else {
        Err(ServiceError::Conflict(format!("campaign is {} and can no longer be changed", campaign.status.as_str())))
    }
}

impl CampaignService {
    pub async fn open(
        data_dir: &Path,
        customers: CustomerService,
        provider: Arc<dyn EmailProvider>,
        from_address: impl Into<String>,
    ) -> Result<Self, ServiceError> {
        Ok(Self {
            store: JsonMapStore::new(data_dir.join(keys::CAMPAIGNS)).await?,
            customers,
            provider,
            from_address: from_address.into(),
        })
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub async fn list(&self, filter: &CampaignFilter, page: Pagination) -> Page<EmailCampaign> {
        let mut items: Vec<EmailCampaign> = self
            .store
            .values()
            .await
            .into_iter()
            .filter(|c| filter.status.map_or(true, |s| c.status == s))
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.name.cmp(&b.name)));
        page.paginate(items)
    }

    pub async fn get(&self, id: Uuid) -> Result<EmailCampaign, ServiceError> {
        self.store.get(&id).await.ok_or_else(|| ServiceError::not_found("campaign"))
    }

    pub async fn create(&self, input: CampaignInput) -> Result<EmailCampaign, ServiceError> {
        input.validate()?;
        let campaign = EmailCampaign::from_input(input, Utc::now());
        self.store.insert(campaign.id, campaign.clone()).await?;
        info!(campaign_id = %campaign.id, "campaign created");
        Ok(campaign)
    }

    pub async fn update(&self, id: Uuid, input: CampaignInput) -> Result<EmailCampaign, ServiceError> {
        input.validate()?;
        self.store
            .update(&id, "campaign", |c| {
                ensure_editable(c)?;
                c.apply(input, Utc::now());
                Ok(c.clone())
            })
            .await
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool, ServiceError> {
        self.store
            .update_map(|map| match map.get(&id) {
                None => Ok(false),
                Some(c) => {
                    ensure_editable(c)?;
                    map.remove(&id);
                    Ok(true)
                }
            })
            .await
    }

    pub async fn schedule(&self, id: Uuid, at: DateTime<Utc>) -> Result<EmailCampaign, ServiceError> {
        let now = Utc::now();
        if at <= now {
            return Err(ServiceError::Validation("scheduled time must be in the future".into()));
        }
        self.store
            .update(&id, "campaign", |c| {
                ensure_editable(c)?;
                c.status = CampaignStatus::Scheduled;
                c.scheduled_at = Some(at);
                c.updated_at = now;
                Ok(c.clone())
            })
            .await
    }

    /// Back to draft; the scheduled time is dropped.
    pub async fn unschedule(&self, id: Uuid) -> Result<EmailCampaign, ServiceError> {
        self.store
            .update(&id, "campaign", |c| {
                if c.status != CampaignStatus::Scheduled {
                    return Err(ServiceError::Conflict("campaign is not scheduled".into()));
                }
                c.status = CampaignStatus::Draft;
                c.scheduled_at = None;
                c.updated_at = Utc::now();
                Ok(c.clone())
            })
            .await
    }

    /// Deliver now. Provider failures and empty audiences are recorded on the
    /// campaign as `failed` rather than returned as errors.
    #[instrument(skip(self))]
    pub async fn send_now(&self, id: Uuid) -> Result<EmailCampaign, ServiceError> {
        let campaign = self
            .store
            .update(&id, "campaign", |c| {
                ensure_editable(c)?;
                c.status = CampaignStatus::Sending;
                c.updated_at = Utc::now();
                Ok(c.clone())
            })
            .await?;

        let recipients = self.customers.recipients(campaign.segment).await;
        let (stats, outcome) = if recipients.is_empty() {
            (CampaignStats::default(), Err(ServiceError::Validation("campaign has no recipients".into())))
        } else {
            self.deliver(&campaign, &recipients).await
        };

        let provider = self.provider.name().to_string();
        let finished = self
            .store
            .update(&id, "campaign", |c| {
                let now = Utc::now();
                c.provider = Some(provider);
                c.updated_at = now;
                c.stats = stats;
                match &outcome {
                    Ok(()) => {
                        c.status = CampaignStatus::Sent;
                        c.sent_at = Some(now);
                        c.last_error = None;
                    }
                    Err(e) => {
                        c.status = CampaignStatus::Failed;
                        c.last_error = Some(e.to_string());
                    }
                }
                Ok(c.clone())
            })
            .await?;

        EMAILS_SENT_TOTAL.inc_by(stats.recipients);
        match &outcome {
            Ok(()) => info!(campaign_id = %id, recipients = stats.recipients, delivered = stats.delivered, "campaign sent"),
            Err(e) => warn!(campaign_id = %id, error = %e, recipients = stats.recipients, "campaign failed"),
        }
        Ok(finished)
    }

    /// Sends `recipients` in provider-sized batches. Stops at the first failed
    /// batch; the returned stats cover every batch that went out before it.
    async fn deliver(&self, campaign: &EmailCampaign, recipients: &[String]) -> (CampaignStats, Result<(), ServiceError>) {
        let email = OutgoingEmail {
            subject: campaign.subject.clone(),
            from_name: campaign.from_name.clone(),
            from_address: self.from_address.clone(),
            html_body: campaign.html_body.clone(),
        };
        let mut total = CampaignStats::default();
        for chunk in recipients.chunks(self.provider.max_batch_size().max(1)) {
            match self.provider.send_batch(&email, chunk).await {
                Ok(stats) => total = merge_stats(total, stats),
                Err(e) => return (total, Err(e)),
            }
        }
        (total, Ok(()))
    }

    /// Send every scheduled campaign whose time has come.
    pub async fn send_due(&self, now: DateTime<Utc>) -> Vec<EmailCampaign> {
        let due: Vec<Uuid> = self.store.values().await.into_iter().filter(|c| c.is_due(now)).map(|c| c.id).collect();
        let mut sent = Vec::with_capacity(due.len());
        for id in due {
            match self.send_now(id).await {
                Ok(campaign) => sent.push(campaign),
                Err(e) => error!(campaign_id = %id, error = %e, "scheduled send failed"),
            }
        }
        sent
    }

    pub async fn metrics(&self, id: Uuid) -> Result<CampaignMetrics, ServiceError> {
        Ok(self.get(id).await?.stats.metrics())
    }
}
