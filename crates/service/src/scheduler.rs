//! Background publisher for scheduled posts and campaigns. Also prunes
//! analytics events past retention when wired with an analytics service.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::analytics::AnalyticsService;
use crate::campaigns::CampaignService;
use crate::content::ContentService;

/// What one tick did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub posts_published: usize,
    pub campaigns_sent: usize,
    pub events_pruned: usize,
}

#[derive(Clone)]
pub struct Scheduler {
    content: ContentService,
    campaigns: CampaignService,
    analytics: Option<AnalyticsService>,
    interval: Duration,
}

impl Scheduler {
    pub fn new(content: ContentService, campaigns: CampaignService, interval: Duration) -> Self {
        Self { content, campaigns, analytics: None, interval }
    }

    pub fn with_analytics(mut self, analytics: AnalyticsService) -> Self {
        self.analytics = Some(analytics);
        self
    }

    /// Publish due posts, send due campaigns and prune old events.
    /// Failures are logged, never returned.
    pub async fn tick(&self, now: DateTime<Utc>) -> TickReport {
        let posts_published = match self.content.publish_due(now).await {
            Ok(posts) => posts.len(),
            Err(e) => {
                error!(error = %e, "scheduler: publishing due posts failed");
                0
            }
        };
        let campaigns_sent = self.campaigns.send_due(now).await.len();
        let events_pruned = match &self.analytics {
            Some(analytics) => analytics.prune(now).await.unwrap_or_else(|e| {
                error!(error = %e, "scheduler: pruning analytics events failed");
                0
            }),
            None => 0,
        };
        TickReport { posts_published, campaigns_sent, events_pruned }
    }

    /// Tick every `interval` until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        info!(interval_secs = self.interval.as_secs(), "scheduler started");
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("scheduler stopping");
                    break;
                }
                _ = interval.tick() => {
                    let report = self.tick(Utc::now()).await;
                    if report == TickReport::default() {
                        debug!("scheduler: nothing due");
                    } else {
                        info!(
                            posts = report.posts_published,
                            campaigns = report.campaigns_sent,
                            events_pruned = report.events_pruned,
                            "scheduler: tick done"
                        );
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::campaigns::provider::{EngagementRates, ProviderKind, SimulatedProvider};
    use crate::content::TransitionRequest;
    use crate::customers::CustomerService;
    use crate::test_support::{customer_input, temp_dir};
    use models::campaign::{CampaignInput, CampaignStatus};
    use models::content::{PostInput, WorkflowStatus};
    use models::customer::SegmentRules;
    use std::sync::Arc;

    #[tokio::test]
    async fn tick_publishes_and_sends_what_is_due() -> anyhow::Result<()> {
        let dir = temp_dir();
        let content = ContentService::open(&dir).await?;
        let customers = CustomerService::open(&dir, SegmentRules::default()).await?;
        let rates = EngagementRates { delivery: 1.0, open: 0.0, click: 0.0, unsubscribe: 0.0 };
        let provider = Arc::new(SimulatedProvider::new(ProviderKind::Sendgrid, rates, Some(3)));
        let campaigns = CampaignService::open(&dir, customers.clone(), provider, "news@example.com").await?;
        customers.create(customer_input("C", "c@example.com")).await?;

        let at = Utc::now() + chrono::Duration::minutes(5);
        let post = content
            .create(PostInput { title: "Drop".into(), author: "Mia".into(), ..Default::default() })
            .await?;
        for to in [WorkflowStatus::Review, WorkflowStatus::Approved, WorkflowStatus::Scheduled] {
            let scheduled_at = (to == WorkflowStatus::Scheduled).then_some(at);
            content.transition(post.id, TransitionRequest { to, actor: "ed".into(), note: None, scheduled_at }).await?;
        }
        let campaign = campaigns
            .create(CampaignInput {
                name: "Drop".into(),
                subject: "New drop".into(),
                from_name: "Shop".into(),
                html_body: "<p>hi</p>".into(),
                segment: None,
            })
            .await?;
        campaigns.schedule(campaign.id, at).await?;

        let scheduler = Scheduler::new(content.clone(), campaigns.clone(), Duration::from_secs(60));
        assert_eq!(scheduler.tick(Utc::now()).await, TickReport::default());
        let report = scheduler.tick(at + chrono::Duration::seconds(1)).await;
        assert_eq!(report, TickReport { posts_published: 1, campaigns_sent: 1, events_pruned: 0 });
        assert_eq!(content.get(post.id).await?.status, WorkflowStatus::Published);
        assert_eq!(campaigns.get(campaign.id).await?.status, CampaignStatus::Sent);
        Ok(())
    }

    #[tokio::test]
    async fn run_stops_on_cancel() -> anyhow::Result<()> {
        let dir = temp_dir();
        let content = ContentService::open(&dir).await?;
        let customers = CustomerService::open(&dir, SegmentRules::default()).await?;
        let rates = EngagementRates { delivery: 1.0, open: 0.0, click: 0.0, unsubscribe: 0.0 };
        let campaigns =
            CampaignService::open(&dir, customers, Arc::new(SimulatedProvider::new(ProviderKind::Mailchimp, rates, None)), "n@example.com")
                .await?;
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(Scheduler::new(content, campaigns, Duration::from_millis(10)).run(cancel.clone()));
        tokio::time::sleep(Duration::from_millis(30)).await;
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle).await??;
        Ok(())
    }
}
