use std::collections::{BTreeMap, HashMap, HashSet};
use std::{path::Path, sync::Arc};

use chrono::{DateTime, Duration, Utc};
use common::metrics::EVENTS_TRACKED_TOTAL;
use models::analytics::{AnalyticsEvent, DailyPoint, DashboardSummary, EventInput, EventKind, TopProduct};
use models::customer::Segment;
use models::order::Order;
use models::round_cents;
use serde::Deserialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::customers::CustomerService;
use crate::errors::ServiceError;
use crate::orders::OrderService;
use crate::pagination::{Page, Pagination};
use crate::storage::{keys, JsonMapStore};

pub const MAX_DASHBOARD_DAYS: u32 = 365;
const TOP_PRODUCTS: usize = 5;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct EventFilter {
    #[serde(default)]
    pub kind: Option<EventKind>,
    #[serde(default)]
    pub since: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct AnalyticsService {
    store: Arc<JsonMapStore<Uuid, AnalyticsEvent>>,
    orders: OrderService,
    customers: CustomerService,
    retention: Duration,
}

impl AnalyticsService {
    pub async fn open(
        data_dir: &Path,
        orders: OrderService,
        customers: CustomerService,
        retention_days: u32,
    ) -> Result<Self, ServiceError> {
        let store = JsonMapStore::new(data_dir.join(keys::ANALYTICS_EVENTS)).await?;
        Ok(Self { store, orders, customers, retention: Duration::days(i64::from(retention_days.max(1))) })
    }

    pub async fn track(&self, input: EventInput) -> Result<AnalyticsEvent, ServiceError> {
        input.validate()?;
        let event = input.into_event(Utc::now());
        self.store.insert(event.id, event.clone()).await?;
        EVENTS_TRACKED_TOTAL.with_label_values(&[event.kind.as_str()]).inc();
        debug!(kind = event.kind.as_str(), "event tracked");
        Ok(event)
    }

    /// Newest first.
    pub async fn list(&self, filter: &EventFilter, page: Pagination) -> Page<AnalyticsEvent> {
        let mut items: Vec<AnalyticsEvent> = self
            .store
            .values()
            .await
            .into_iter()
            .filter(|e| filter.kind.map_or(true, |k| e.kind == k))
            .filter(|e| filter.since.map_or(true, |since| e.at >= since))
            .collect();
        items.sort_by(|a, b| b.at.cmp(&a.at));
        page.paginate(items)
    }

    /// Drop events older than the retention window; returns how many went.
    pub async fn prune(&self, now: DateTime<Utc>) -> Result<usize, ServiceError> {
        let cutoff = now - self.retention;
        let removed = self.store.retain(|e| e.at >= cutoff).await?;
        if removed > 0 {
            info!(removed, %cutoff, "analytics events pruned");
        }
        Ok(removed)
    }

    pub async fn dashboard(&self, days: u32) -> DashboardSummary {
        let orders = self.orders.all().await;
        let segments = self.customers.segment_summary().await;
        let events = self.store.values().await;
        build_dashboard(&orders, segments, &events, days, Utc::now())
    }
}

fn rate(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        (part as f64 / whole as f64 * 10_000.0).round() / 10_000.0
    }
}

/// Distinct sessions that produced at least one `kind` event.
fn sessions<'a>(events: &[&'a AnalyticsEvent], kind: EventKind) -> HashSet<&'a str> {
    events.iter().filter(|e| e.kind == kind).filter_map(|e| e.session_id.as_deref()).collect()
}

/// Aggregate the trailing `days` (1..=365, today included) into dashboard figures.
pub fn build_dashboard(
    orders: &[Order],
    segments: BTreeMap<Segment, u64>,
    events: &[AnalyticsEvent],
    days: u32,
    now: DateTime<Utc>,
) -> DashboardSummary {
    let days = days.clamp(1, MAX_DASHBOARD_DAYS);
    let first_day = (now - Duration::days(i64::from(days) - 1)).date_naive();
    let in_window = |at: DateTime<Utc>| at.date_naive() >= first_day && at <= now;

    let counted: Vec<&Order> =
        orders.iter().filter(|o| o.status.counts_as_revenue() && in_window(o.created_at)).collect();
    let revenue = round_cents(counted.iter().map(|o| o.total).sum());
    let order_count = counted.len() as u64;
    let average_order_value = if order_count == 0 { 0.0 } else { round_cents(revenue / order_count as f64) };

    let mut by_product: HashMap<Uuid, TopProduct> = HashMap::new();
    for item in counted.iter().flat_map(|o| &o.items) {
        let entry = by_product.entry(item.product_id).or_insert_with(|| TopProduct {
            product_id: item.product_id,
            name: item.name.clone(),
            units: 0,
            revenue: 0.0,
        });
        entry.units += u64::from(item.quantity);
        entry.revenue = round_cents(entry.revenue + item.line_total);
    }
    let mut top_products: Vec<TopProduct> = by_product.into_values().collect();
    top_products.sort_by(|a, b| {
        b.revenue.partial_cmp(&a.revenue).unwrap_or(std::cmp::Ordering::Equal).then(b.units.cmp(&a.units))
    });
    top_products.truncate(TOP_PRODUCTS);

    let mut daily: BTreeMap<_, DailyPoint> = first_day
        .iter_days()
        .take(days as usize)
        .map(|date| (date, DailyPoint { date, revenue: 0.0, orders: 0 }))
        .collect();
    for order in &counted {
        if let Some(point) = daily.get_mut(&order.created_at.date_naive()) {
            point.revenue = round_cents(point.revenue + order.total);
            point.orders += 1;
        }
    }

    let windowed: Vec<&AnalyticsEvent> = events.iter().filter(|e| in_window(e.at)).collect();
    let mut events_by_kind: BTreeMap<String, u64> = BTreeMap::new();
    for event in &windowed {
        *events_by_kind.entry(event.kind.as_str().to_string()).or_default() += 1;
    }
    let conversion_rate =
        rate(sessions(&windowed, EventKind::Purchase).len(), sessions(&windowed, EventKind::PageView).len());

    DashboardSummary {
        days,
        revenue,
        order_count,
        average_order_value,
        customer_count: segments.values().sum(),
        segments,
        top_products,
        daily_revenue: daily.into_values().collect(),
        events_by_kind,
        conversion_rate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::temp_dir;
    use models::order::{OrderItem, OrderStatus};

    fn order(at: DateTime<Utc>, status: OrderStatus, items: Vec<OrderItem>) -> Order {
        let total = round_cents(items.iter().map(|i| i.line_total).sum());
        Order {
            id: Uuid::new_v4(),
            order_number: "ORD-000001".into(),
            customer_id: Uuid::new_v4(),
            items,
            subtotal: total,
            tax: 0.0,
            shipping: 0.0,
            total,
            status,
            shipping_address: None,
            notes: None,
            created_at: at,
            updated_at: at,
        }
    }

    fn event(kind: EventKind, session: &str, at: DateTime<Utc>) -> AnalyticsEvent {
        AnalyticsEvent { id: Uuid::new_v4(), kind, session_id: Some(session.into()), path: None, product_id: None, value: None, at }
    }

    #[test]
    fn dashboard_windows_and_excludes_cancelled() {
        let now = Utc::now();
        let tee = Uuid::new_v4();
        let mug = Uuid::new_v4();
        let line = |id: Uuid, name: &str, qty: u32, price: f64| OrderItem::new(id, name.into(), name.into(), qty, price);
        let orders = vec![
            order(now, OrderStatus::Pending, vec![line(tee, "Tee", 2, 20.0)]),
            order(now - Duration::days(1), OrderStatus::Delivered, vec![line(mug, "Mug", 1, 10.0), line(tee, "Tee", 1, 20.0)]),
            order(now, OrderStatus::Cancelled, vec![line(mug, "Mug", 5, 10.0)]),
            order(now - Duration::days(30), OrderStatus::Delivered, vec![line(mug, "Mug", 9, 10.0)]),
        ];
        let segments: BTreeMap<Segment, u64> = Segment::ALL.iter().map(|s| (*s, 1)).collect();
        let events = vec![
            event(EventKind::PageView, "s1", now),
            event(EventKind::PageView, "s1", now),
            event(EventKind::PageView, "s2", now),
            event(EventKind::Purchase, "s1", now),
            event(EventKind::PageView, "old", now - Duration::days(40)),
        ];

        let d = build_dashboard(&orders, segments, &events, 7, now);
        assert_eq!(d.order_count, 2);
        assert_eq!(d.revenue, 70.0);
        assert_eq!(d.average_order_value, 35.0);
        assert_eq!(d.customer_count, 5);
        assert_eq!(d.top_products[0].name, "Tee");
        assert_eq!(d.top_products[0].units, 3);
        assert_eq!(d.top_products[0].revenue, 60.0);
        assert_eq!(d.daily_revenue.len(), 7);
        assert_eq!(d.daily_revenue.last().map(|p| p.revenue), Some(40.0));
        assert_eq!(d.events_by_kind.get("page_view"), Some(&3));
        assert_eq!(d.conversion_rate, 0.5);
    }

    #[test]
    fn empty_store_gives_zeroes() {
        let d = build_dashboard(&[], BTreeMap::new(), &[], 0, Utc::now());
        assert_eq!(d.days, 1);
        assert_eq!(d.average_order_value, 0.0);
        assert_eq!(d.conversion_rate, 0.0);
        assert_eq!(d.daily_revenue.len(), 1);
    }

    #[tokio::test]
    async fn track_validates_and_filters() -> anyhow::Result<()> {
        let dir = temp_dir();
        let catalog = crate::catalog::CatalogService::open(&dir).await?;
        let customers = CustomerService::open(&dir, Default::default()).await?;
        let rules = models::order::PricingRules { tax_rate: 0.0, free_shipping_threshold: 0.0, flat_shipping: 0.0 };
        let orders = OrderService::open(&dir, catalog, customers.clone(), rules).await?;
        let svc = AnalyticsService::open(&dir, orders, customers, 400).await?;

        let base = EventInput { kind: EventKind::PageView, session_id: Some("s".into()), path: Some("/".into()), product_id: None, value: None, at: None };
        svc.track(base.clone()).await?;
        svc.track(EventInput { kind: EventKind::AddToCart, ..base.clone() }).await?;
        assert!(svc.track(EventInput { value: Some(-5.0), ..base }).await.is_err());

        let filter = EventFilter { kind: Some(EventKind::AddToCart), since: None };
        assert_eq!(svc.list(&filter, Pagination::default()).await.total, 1);
        let d = svc.dashboard(30).await;
        assert_eq!(d.events_by_kind.values().sum::<u64>(), 2);
        assert_eq!(d.segments.len(), 5);
        Ok(())
    }

    #[tokio::test]
    async fn prune_drops_events_past_retention() -> anyhow::Result<()> {
        let dir = temp_dir();
        let catalog = crate::catalog::CatalogService::open(&dir).await?;
        let customers = CustomerService::open(&dir, Default::default()).await?;
        let rules = models::order::PricingRules { tax_rate: 0.0, free_shipping_threshold: 0.0, flat_shipping: 0.0 };
        let orders = OrderService::open(&dir, catalog, customers.clone(), rules).await?;
        let svc = AnalyticsService::open(&dir, orders, customers, 30).await?;

        let now = Utc::now();
        for age in [0, 29, 31, 90] {
            let at = Some(now - Duration::days(age));
            svc.track(EventInput { kind: EventKind::PageView, session_id: None, path: None, product_id: None, value: None, at })
                .await?;
        }
        assert_eq!(svc.prune(now).await?, 2);
        assert_eq!(svc.prune(now).await?, 0);
        let left = svc.list(&EventFilter::default(), Pagination::default()).await;
        assert_eq!(left.total, 2);
        assert!(left.items.iter().all(|e| e.at >= now - Duration::days(30)));
        Ok(())
    }
}
