use std::{collections::HashMap, path::Path, sync::Arc};

use chrono::Utc;
use models::product::{Product, ProductInput, ProductStatus};
use serde::Deserialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::pagination::{Page, Pagination};
use crate::storage::{keys, JsonMapStore};

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ProductFilter {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub status: Option<ProductStatus>,
    #[serde(default)]
    pub search: Option<String>,
}

impl ProductFilter {
    fn matches(&self, p: &Product) -> bool {
        self.category
            .as_deref()
            .map_or(true, |c| p.category.as_deref().is_some_and(|pc| pc.eq_ignore_ascii_case(c)))
            && self.status.map_or(true, |s| p.status == s)
            && self.search.as_deref().map_or(true, |q| p.matches_search(q))
    }
}

/// Product catalog and inventory.
#[derive(Clone)]
pub struct CatalogService {
    store: Arc<JsonMapStore<Uuid, Product>>,
}

impl CatalogService {
    pub async fn open(data_dir: &Path) -> Result<Self, ServiceError> {
        Ok(Self { store: JsonMapStore::new(data_dir.join(keys::PRODUCTS)).await? })
    }

    /// All products, oldest first.
    pub async fn all(&self) -> Vec<Product> {
        let mut items = self.store.values().await;
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.sku.cmp(&b.sku)));
        items
    }

    pub async fn list(&self, filter: &ProductFilter, page: Pagination) -> Page<Product> {
        let items = self.all().await.into_iter().filter(|p| filter.matches(p)).collect();
        page.paginate(items)
    }

    pub async fn get(&self, id: Uuid) -> Result<Product, ServiceError> {
        self.store.get(&id).await.ok_or_else(|| ServiceError::not_found("product"))
    }

    fn ensure_unique_sku(map: &HashMap<Uuid, Product>, sku: &str, except: Option<Uuid>) -> Result<(), ServiceError> {
        let sku = sku.trim();
        if map.values().any(|p| Some(p.id) != except && p.sku.eq_ignore_ascii_case(sku)) {
            return Err(ServiceError::Conflict(format!("sku `{sku}` already exists")));
        }
        Ok(())
    }

    #[instrument(skip(self, input), fields(sku = %input.sku))]
    pub async fn create(&self, input: ProductInput) -> Result<Product, ServiceError> {
        input.validate()?;
        let product = self
            .store
            .update_map(|map| {
                Self::ensure_unique_sku(map, &input.sku, None)?;
                let product = Product::from_input(input, Utc::now());
                map.insert(product.id, product.clone());
                Ok(product)
            })
            .await?;
        info!(product_id = %product.id, "product created");
        Ok(product)
    }

    pub async fn update(&self, id: Uuid, input: ProductInput) -> Result<Product, ServiceError> {
        input.validate()?;
        self.store
            .update_map(|map| {
                Self::ensure_unique_sku(map, &input.sku, Some(id))?;
                let product = map.get_mut(&id).ok_or_else(|| ServiceError::not_found("product"))?;
                product.apply(input, Utc::now());
                Ok(product.clone())
            })
            .await
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool, ServiceError> {
        self.store.remove(&id).await
    }

    /// Add (or with a negative `delta`, remove) units of stock.
    pub async fn adjust_stock(&self, id: Uuid, delta: i64) -> Result<Product, ServiceError> {
        let product = self
            .store
            .update(&id, "product", |p| {
                p.stock = p.stock_after(delta)?;
                p.updated_at = Utc::now();
                Ok(p.clone())
            })
            .await?;
        info!(product_id = %id, delta, stock = product.stock, "stock adjusted");
        Ok(product)
    }

    /// Active products at or below `threshold` units, emptiest first.
    pub async fn low_stock(&self, threshold: u32) -> Vec<Product> {
        let mut items: Vec<Product> = self
            .all()
            .await
            .into_iter()
            .filter(|p| p.status == ProductStatus::Active && p.stock <= threshold)
            .collect();
        items.sort_by_key(|p| p.stock);
        items
    }

    /// Take stock for every line in one write. Fails without touching anything when
    /// a product is missing, not active or short. Returns the products as they were
    /// priced, in line order.
    pub(crate) async fn reserve(&self, lines: &[(Uuid, u32)]) -> Result<Vec<Product>, ServiceError> {
        self.store
            .update_map(|map| {
                let now = Utc::now();
                let mut snapshots = Vec::with_capacity(lines.len());
                for (id, qty) in lines {
                    let product = map.get_mut(id).ok_or_else(|| ServiceError::not_found("product"))?;
                    if product.status != ProductStatus::Active {
                        return Err(ServiceError::Validation(format!("product {} is not available", product.sku)));
                    }
                    snapshots.push(product.clone());
                    product.stock = product.stock_after(-i64::from(*qty))?;
                    product.updated_at = now;
                }
                Ok(snapshots)
            })
            .await
    }

    /// Return stock from a cancelled order. Products deleted since are skipped.
    pub(crate) async fn restock(&self, lines: &[(Uuid, u32)]) -> Result<(), ServiceError> {
        self.store
            .update_map(|map| {
                let now = Utc::now();
                for (id, qty) in lines {
                    match map.get_mut(id) {
                        Some(product) => {
                            product.stock = product.stock_after(i64::from(*qty))?;
                            product.updated_at = now;
                        }
                        None => warn!(product_id = %id, "restock skipped; product no longer exists"),
                    }
                }
                Ok(())
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{product_input, temp_dir};

    #[tokio::test]
    async fn crud_and_sku_uniqueness() -> anyhow::Result<()> {
        let dir = temp_dir();
        let catalog = CatalogService::open(&dir).await?;
        let p = catalog.create(product_input("TEE-1", 10.0, 4)).await?;
        assert!(matches!(catalog.create(product_input("tee-1", 12.0, 1)).await, Err(ServiceError::Conflict(_))));

        let mut blank = product_input("TEE-2", 10.0, 1);
        blank.name = " ".into();
        assert!(matches!(catalog.create(blank).await, Err(ServiceError::Validation(_))));

        let mut upd = product_input("TEE-1", 11.5, 4);
        upd.category = Some("sale".into());
        let updated = catalog.update(p.id, upd).await?;
        assert_eq!(updated.price, 11.5);

        let filter = ProductFilter { category: Some("SALE".into()), ..Default::default() };
        assert_eq!(catalog.list(&filter, Pagination::default()).await.total, 1);

        assert!(catalog.delete(p.id).await?);
        assert!(matches!(catalog.get(p.id).await, Err(ServiceError::NotFound(_))));
        Ok(())
    }

    #[tokio::test]
    async fn stock_adjustments_and_low_stock() -> anyhow::Result<()> {
        let dir = temp_dir();
        let catalog = CatalogService::open(&dir).await?;
        let a = catalog.create(product_input("A", 1.0, 2)).await?;
        let b = catalog.create(product_input("B", 1.0, 20)).await?;
        assert!(catalog.adjust_stock(a.id, -3).await.is_err());
        assert_eq!(catalog.adjust_stock(a.id, -2).await?.stock, 0);
        let low = catalog.low_stock(5).await;
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].id, a.id);
        assert_eq!(catalog.adjust_stock(b.id, 5).await?.stock, 25);
        Ok(())
    }

    #[tokio::test]
    async fn reserve_is_all_or_nothing() -> anyhow::Result<()> {
        let dir = temp_dir();
        let catalog = CatalogService::open(&dir).await?;
        let a = catalog.create(product_input("A", 1.0, 5)).await?;
        let b = catalog.create(product_input("B", 1.0, 1)).await?;
        assert!(catalog.reserve(&[(a.id, 2), (b.id, 2)]).await.is_err());
        assert_eq!(catalog.get(a.id).await?.stock, 5);

        let snaps = catalog.reserve(&[(a.id, 2), (b.id, 1)]).await?;
        assert_eq!(snaps[0].stock, 5);
        assert_eq!(catalog.get(a.id).await?.stock, 3);
        assert_eq!(catalog.get(b.id).await?.stock, 0);

        catalog.restock(&[(a.id, 2), (Uuid::new_v4(), 1)]).await?;
        assert_eq!(catalog.get(a.id).await?.stock, 5);
        Ok(())
    }
}
