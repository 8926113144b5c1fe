use std::{collections::BTreeMap, collections::HashMap, path::Path, sync::Arc};

use chrono::{DateTime, Utc};
use models::customer::{segment_of, Customer, CustomerInput, CustomerView, Segment, SegmentRules};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::pagination::{Page, Pagination};
use crate::storage::{keys, JsonMapStore};

#[derive(Clone, Debug, Default, Deserialize)]
pub struct CustomerFilter {
    #[serde(default)]
    pub segment: Option<Segment>,
    #[serde(default)]
    pub search: Option<String>,
}

/// Customer records plus segmentation.
#[derive(Clone)]
pub struct CustomerService {
    store: Arc<JsonMapStore<Uuid, Customer>>,
    rules: SegmentRules,
}

impl CustomerService {
    pub async fn open(data_dir: &Path, rules: SegmentRules) -> Result<Self, ServiceError> {
        Ok(Self { store: JsonMapStore::new(data_dir.join(keys::CUSTOMERS)).await?, rules })
    }

    pub fn rules(&self) -> &SegmentRules {
        &self.rules
    }

    fn view(&self, customer: Customer, now: DateTime<Utc>) -> CustomerView {
        let segment = segment_of(&customer, &self.rules, now);
        CustomerView { customer, segment }
    }

    /// All customers with segments resolved, oldest first.
    pub async fn all(&self) -> Vec<CustomerView> {
        let now = Utc::now();
        let mut items = self.store.values().await;
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.email.cmp(&b.email)));
        items.into_iter().map(|c| self.view(c, now)).collect()
    }

    pub async fn list(&self, filter: &CustomerFilter, page: Pagination) -> Page<CustomerView> {
        let items = self
            .all()
            .await
            .into_iter()
            .filter(|v| filter.segment.map_or(true, |s| v.segment == s))
            .filter(|v| filter.search.as_deref().map_or(true, |q| v.customer.matches_search(q)))
            .collect();
        page.paginate(items)
    }

    pub async fn get(&self, id: Uuid) -> Result<CustomerView, ServiceError> {
        let customer = self.store.get(&id).await.ok_or_else(|| ServiceError::not_found("customer"))?;
        Ok(self.view(customer, Utc::now()))
    }

    pub async fn exists(&self, id: Uuid) -> bool {
        self.store.get(&id).await.is_some()
    }

    fn ensure_unique_email(map: &HashMap<Uuid, Customer>, email: &str, except: Option<Uuid>) -> Result<(), ServiceError> {
        let email = email.trim().to_ascii_lowercase();
        if map.values().any(|c| Some(c.id) != except && c.email == email) {
            return Err(ServiceError::Conflict(format!("a customer with email `{email}` already exists")));
        }
        Ok(())
    }

    pub async fn create(&self, input: CustomerInput) -> Result<CustomerView, ServiceError> {
        input.validate()?;
        let now = Utc::now();
        let customer = self
            .store
            .update_map(|map| {
                Self::ensure_unique_email(map, &input.email, None)?;
                let customer = Customer::from_input(input, now);
                map.insert(customer.id, customer.clone());
                Ok(customer)
            })
            .await?;
        info!(customer_id = %customer.id, "customer created");
        Ok(self.view(customer, now))
    }

    pub async fn update(&self, id: Uuid, input: CustomerInput) -> Result<CustomerView, ServiceError> {
        input.validate()?;
        let now = Utc::now();
        let customer = self
            .store
            .update_map(|map| {
                Self::ensure_unique_email(map, &input.email, Some(id))?;
                let customer = map.get_mut(&id).ok_or_else(|| ServiceError::not_found("customer"))?;
                customer.apply(input, now);
                Ok(customer.clone())
            })
            .await?;
        Ok(self.view(customer, now))
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool, ServiceError> {
        self.store.remove(&id).await
    }

    /// Count per segment; every segment is present, possibly with zero.
    pub async fn segment_summary(&self) -> BTreeMap<Segment, u64> {
        let mut counts: BTreeMap<Segment, u64> = Segment::ALL.iter().map(|s| (*s, 0)).collect();
        for view in self.all().await {
            *counts.entry(view.segment).or_default() += 1;
        }
        counts
    }

    /// Email addresses of the customers in `segment` (all customers when `None`).
    pub async fn recipients(&self, segment: Option<Segment>) -> Vec<String> {
        self.all()
            .await
            .into_iter()
            .filter(|v| segment.map_or(true, |s| v.segment == s))
            .map(|v| v.customer.email)
            .collect()
    }

    pub(crate) async fn record_order(&self, id: Uuid, amount: f64, at: DateTime<Utc>) -> Result<(), ServiceError> {
        self.store
            .update(&id, "customer", |c| {
                c.record_order(amount, at);
                Ok(())
            })
            .await
    }

    pub(crate) async fn reverse_order(&self, id: Uuid, amount: f64) -> Result<(), ServiceError> {
        match self.store.update(&id, "customer", |c| {
            c.reverse_order(amount, Utc::now());
            Ok(())
        })
        .await
        {
            Err(ServiceError::NotFound(_)) => {
                warn!(customer_id = %id, "order reversal skipped; customer no longer exists");
                Ok(())
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{customer_input, temp_dir};

    #[tokio::test]
    async fn crud_with_unique_emails() -> anyhow::Result<()> {
        let svc = CustomerService::open(&temp_dir(), SegmentRules::default()).await?;
        let ana = svc.create(customer_input("Ana", "ana@example.com")).await?;
        assert_eq!(ana.segment, Segment::New);
        assert!(matches!(svc.create(customer_input("Other", "ANA@example.com")).await, Err(ServiceError::Conflict(_))));
        assert!(matches!(svc.create(customer_input("Bad", "nope")).await, Err(ServiceError::Validation(_))));

        let bo = svc.create(customer_input("Bo", "bo@example.com")).await?;
        assert!(matches!(
            svc.update(bo.customer.id, customer_input("Bo", "ana@example.com")).await,
            Err(ServiceError::Conflict(_))
        ));
        let renamed = svc.update(bo.customer.id, customer_input("Bo B.", "bo@example.com")).await?;
        assert_eq!(renamed.customer.name, "Bo B.");

        assert!(svc.delete(ana.customer.id).await?);
        assert_eq!(svc.list(&CustomerFilter::default(), Pagination::default()).await.total, 1);
        Ok(())
    }

    #[tokio::test]
    async fn summary_and_recipients_follow_segments() -> anyhow::Result<()> {
        let svc = CustomerService::open(&temp_dir(), SegmentRules::default()).await?;
        let vip = svc.create(customer_input("Vee", "vee@example.com")).await?;
        svc.create(customer_input("Neu", "neu@example.com")).await?;
        svc.record_order(vip.customer.id, 1_500.0, Utc::now()).await?;

        let summary = svc.segment_summary().await;
        assert_eq!(summary.len(), 5);
        assert_eq!(summary[&Segment::Vip], 1);
        assert_eq!(summary[&Segment::New], 1);
        assert_eq!(summary[&Segment::AtRisk], 0);

        assert_eq!(svc.recipients(Some(Segment::Vip)).await, vec!["vee@example.com".to_string()]);
        assert_eq!(svc.recipients(None).await.len(), 2);

        let filter = CustomerFilter { segment: Some(Segment::Vip), search: None };
        assert_eq!(svc.list(&filter, Pagination::default()).await.items.len(), 1);

        svc.reverse_order(vip.customer.id, 1_500.0).await?;
        assert_eq!(svc.get(vip.customer.id).await?.customer.total_spent, 0.0);
        svc.reverse_order(Uuid::new_v4(), 1.0).await?;
        Ok(())
    }
}
