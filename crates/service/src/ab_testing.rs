use std::{path::Path, sync::Arc};

use chrono::Utc;
use models::ab_test::{compute_results, AbTest, AbTestInput, AbTestResults, AbTestStatus, Variant};
use tracing::info;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::pagination::{Page, Pagination};
use crate::storage::{keys, JsonMapStore};

#[derive(Clone)]
pub struct AbTestService {
    store: Arc<JsonMapStore<Uuid, AbTest>>,
}

impl AbTestService {
    pub async fn open(data_dir: &Path) -> Result<Self, ServiceError> {
        Ok(Self { store: JsonMapStore::new(data_dir.join(keys::AB_TESTS)).await? })
    }

    pub async fn list(&self, status: Option<AbTestStatus>, page: Pagination) -> Page<AbTest> {
        let mut items: Vec<AbTest> =
            self.store.values().await.into_iter().filter(|t| status.map_or(true, |s| t.status == s)).collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.name.cmp(&b.name)));
        page.paginate(items)
    }

    pub async fn get(&self, id: Uuid) -> Result<AbTest, ServiceError> {
        self.store.get(&id).await.ok_or_else(|| ServiceError::not_found("ab test"))
    }

    pub async fn create(&self, input: AbTestInput) -> Result<AbTest, ServiceError> {
        input.validate()?;
        let test = AbTest::from_input(input, Utc::now());
        self.store.insert(test.id, test.clone()).await?;
        info!(test_id = %test.id, variants = test.variants.len(), "ab test created");
        Ok(test)
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool, ServiceError> {
        self.store.remove(&id).await
    }

    pub async fn start(&self, id: Uuid) -> Result<AbTest, ServiceError> {
        self.store
            .update(&id, "ab test", |t| {
                t.start(Utc::now())?;
                Ok(t.clone())
            })
            .await
    }

    pub async fn record_impression(&self, id: Uuid, variant: &str) -> Result<AbTest, ServiceError> {
        self.store
            .update(&id, "ab test", |t| {
                t.record_impression(variant)?;
                Ok(t.clone())
            })
            .await
    }

    pub async fn record_conversion(&self, id: Uuid, variant: &str) -> Result<AbTest, ServiceError> {
        self.store
            .update(&id, "ab test", |t| {
                t.record_conversion(variant)?;
                Ok(t.clone())
            })
            .await
    }

    pub async fn results(&self, id: Uuid) -> Result<AbTestResults, ServiceError> {
        Ok(compute_results(&self.get(id).await?))
    }

    pub async fn complete(&self, id: Uuid) -> Result<AbTestResults, ServiceError> {
        let results = self.store.update(&id, "ab test", |t| Ok(t.complete(Utc::now())?)).await?;
        info!(test_id = %id, winner = ?results.leader, significant = results.significant, "ab test completed");
        Ok(results)
    }

    /// Variant a visitor should see; stable for the same visitor.
    pub async fn assign(&self, id: Uuid, visitor_id: &str) -> Result<Variant, ServiceError> {
        if visitor_id.trim().is_empty() {
            return Err(ServiceError::Validation("visitor_id required".into()));
        }
        Ok(self.get(id).await?.assign(visitor_id.trim()).clone())
    }
}
