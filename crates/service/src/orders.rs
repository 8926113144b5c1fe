use std::{path::Path, sync::Arc};

use chrono::Utc;
use common::metrics::ORDERS_CREATED_TOTAL;
use models::order::{
    compute_totals, format_order_number, parse_order_number, Order, OrderInput, OrderItem, OrderStatus, PricingRules,
};
use serde::Deserialize;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::catalog::CatalogService;
use crate::customers::CustomerService;
use crate::errors::ServiceError;
use crate::pagination::{Page, Pagination};
use crate::storage::{keys, JsonMapStore};

#[derive(Clone, Debug, Default, Deserialize)]
pub struct OrderFilter {
    #[serde(default)]
    pub status: Option<OrderStatus>,
    #[serde(default)]
    pub customer_id: Option<Uuid>,
}

#[derive(Clone)]
pub struct OrderService {
    store: Arc<JsonMapStore<Uuid, Order>>,
    catalog: CatalogService,
    customers: CustomerService,
    pricing: PricingRules,
}

impl OrderService {
    pub async fn open(
        data_dir: &Path,
        catalog: CatalogService,
        customers: CustomerService,
        pricing: PricingRules,
    ) -> Result<Self, ServiceError> {
        let store = JsonMapStore::new(data_dir.join(keys::ORDERS)).await?;
        Ok(Self { store, catalog, customers, pricing })
    }

    /// All orders, newest first.
    pub async fn all(&self) -> Vec<Order> {
        let mut items = self.store.values().await;
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.order_number.cmp(&a.order_number)));
        items
    }

    pub async fn list(&self, filter: &OrderFilter, page: Pagination) -> Page<Order> {
        let items = self
            .all()
            .await
            .into_iter()
            .filter(|o| filter.status.map_or(true, |s| o.status == s))
            .filter(|o| filter.customer_id.map_or(true, |c| o.customer_id == c))
            .collect();
        page.paginate(items)
    }

    pub async fn get(&self, id: Uuid) -> Result<Order, ServiceError> {
        self.store.get(&id).await.ok_or_else(|| ServiceError::not_found("order"))
    }

    /// Place an order: reserve stock, snapshot prices, compute totals, then
    /// credit the customer. Stock is given back if the order cannot be stored.
    #[instrument(skip(self, input), fields(customer_id = %input.customer_id))]
    pub async fn create(&self, input: OrderInput) -> Result<Order, ServiceError> {
        input.validate()?;
        if !self.customers.exists(input.customer_id).await {
            return Err(ServiceError::not_found("customer"));
        }

        let lines: Vec<(Uuid, u32)> = input.items.iter().map(|l| (l.product_id, l.quantity)).collect();
        let snapshots = self.catalog.reserve(&lines).await?;
        let items: Vec<OrderItem> = snapshots
            .into_iter()
            .zip(&lines)
            .map(|(p, (_, qty))| OrderItem::new(p.id, p.sku, p.name, *qty, p.price))
            .collect();
        let totals = compute_totals(&items, &self.pricing);

        let now = Utc::now();
        let customer_id = input.customer_id;
        let stored = self
            .store
            .update_map(|map| {
                let seq = map.values().filter_map(|o| parse_order_number(&o.order_number)).max().unwrap_or(0) + 1;
                let order = Order {
                    id: Uuid::new_v4(),
                    order_number: format_order_number(seq),
                    customer_id,
                    items,
                    subtotal: totals.subtotal,
                    tax: totals.tax,
                    shipping: totals.shipping,
                    total: totals.total,
                    status: OrderStatus::Pending,
                    shipping_address: models::non_blank(input.shipping_address),
                    notes: models::non_blank(input.notes),
                    created_at: now,
                    updated_at: now,
                };
                map.insert(order.id, order.clone());
                Ok(order)
            })
            .await;

        let order = match stored {
            Ok(order) => order,
            Err(e) => {
                if let Err(restock_err) = self.catalog.restock(&lines).await {
                    error!(error = %restock_err, "failed to return reserved stock");
                }
                return Err(e);
            }
        };

        if let Err(e) = self.customers.record_order(customer_id, order.total, now).await {
            warn!(error = %e, order_id = %order.id, "customer stats not updated");
        }
        ORDERS_CREATED_TOTAL.inc();
        info!(order_id = %order.id, order_number = %order.order_number, total = order.total, "order created");
        Ok(order)
    }

    /// Move an order along its lifecycle. Cancelling returns stock and customer
    /// spend; refunding returns customer spend.
    pub async fn update_status(&self, id: Uuid, next: OrderStatus) -> Result<Order, ServiceError> {
        let (order, previous) = self
            .store
            .update(&id, "order", |o| {
                let previous = o.status;
                o.status = previous.transition(next)?;
                o.updated_at = Utc::now();
                Ok((o.clone(), previous))
            })
            .await?;

        if next == OrderStatus::Cancelled {
            let lines: Vec<(Uuid, u32)> = order.items.iter().map(|i| (i.product_id, i.quantity)).collect();
            self.catalog.restock(&lines).await?;
        }
        if !next.counts_as_revenue() {
            self.customers.reverse_order(order.customer_id, order.total).await?;
        }
        info!(order_id = %id, from = previous.as_str(), to = next.as_str(), "order status changed");
        Ok(order)
    }

    /// Only cancelled or refunded orders may be deleted. Live orders still
    /// hold stock and count towards customer spend.
    pub async fn delete(&self, id: Uuid) -> Result<bool, ServiceError> {
        self.store
            .update_map(|map| {
                let (status, number) = match map.get(&id) {
                    Some(o) => (o.status, o.order_number.clone()),
                    None => return Ok(false),
                };
                if status.counts_as_revenue() {
                    return Err(ServiceError::Conflict(format!(
                        "order {number} is {}; cancel or refund it before deleting",
                        status.as_str()
                    )));
                }
                map.remove(&id);
                Ok(true)
            })
            .await
    }
}
