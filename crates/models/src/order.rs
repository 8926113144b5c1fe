use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ModelError;
use crate::round_cents;

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
        }
    }

    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Processing, Shipped)
                | (Shipped, Delivered)
                | (Pending, Cancelled)
                | (Processing, Cancelled)
                | (Delivered, Refunded)
        )
    }

    /// Cancelled and refunded orders do not count towards revenue or customer spend.
    pub fn counts_as_revenue(self) -> bool {
        !matches!(self, OrderStatus::Cancelled | OrderStatus::Refunded)
    }

    pub fn transition(self, next: OrderStatus) -> Result<OrderStatus, ModelError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(ModelError::InvalidTransition { from: self.as_str().into(), to: next.as_str().into() })
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    pub product_id: Uuid,
    pub sku: String,
    pub name: String,
    pub quantity: u32,
    pub unit_price: f64,
    pub line_total: f64,
}

impl OrderItem {
    pub fn new(product_id: Uuid, sku: String, name: String, quantity: u32, unit_price: f64) -> Self {
        let line_total = round_cents(unit_price * f64::from(quantity));
        Self { product_id, sku, name, quantity, unit_price, line_total }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub customer_id: Uuid,
    pub items: Vec<OrderItem>,
    pub subtotal: f64,
    pub tax: f64,
    pub shipping: f64,
    pub total: f64,
    pub status: OrderStatus,
    pub shipping_address: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct OrderLineInput {
    pub product_id: Uuid,
    pub quantity: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct OrderInput {
    pub customer_id: Uuid,
    pub items: Vec<OrderLineInput>,
    #[serde(default)]
    pub shipping_address: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl OrderInput {
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.items.is_empty() {
            return Err(ModelError::validation("order must contain at least one item"));
        }
        if self.items.iter().any(|line| line.quantity == 0) {
            return Err(ModelError::validation("item quantity must be >= 1"));
        }
        Ok(())
    }
}

/// Tax and shipping rules applied at checkout.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PricingRules {
    pub tax_rate: f64,
    pub free_shipping_threshold: f64,
    pub flat_shipping: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Totals {
    pub subtotal: f64,
    pub tax: f64,
    pub shipping: f64,
    pub total: f64,
}

pub fn compute_totals(items: &[OrderItem], rules: &PricingRules) -> Totals {
    let subtotal = round_cents(items.iter().map(|i| i.line_total).sum());
    let tax = round_cents(subtotal * rules.tax_rate);
    let shipping = if subtotal >= rules.free_shipping_threshold { 0.0 } else { rules.flat_shipping };
    let total = round_cents(subtotal + tax + shipping);
    Totals { subtotal, tax, shipping, total }
}

/// `ORD-000042` style display number.
pub fn format_order_number(seq: u64) -> String {
    format!("ORD-{seq:06}")
}

/// Sequence part of a formatted order number.
pub fn parse_order_number(number: &str) -> Option<u64> {
    number.strip_prefix("ORD-")?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const RULES: PricingRules = PricingRules { tax_rate: 0.08, free_shipping_threshold: 50.0, flat_shipping: 5.99 };

    fn item(qty: u32, price: f64) -> OrderItem {
        OrderItem::new(Uuid::new_v4(), "SKU".into(), "Thing".into(), qty, price)
    }

    #[test]
    fn small_orders_pay_flat_shipping() {
        let t = compute_totals(&[item(2, 10.0)], &RULES);
        assert_eq!(t.subtotal, 20.0);
        assert_eq!(t.tax, 1.6);
        assert_eq!(t.shipping, 5.99);
        assert_eq!(t.total, 27.59);
    }

    #[test]
    fn threshold_orders_ship_free() {
        let t = compute_totals(&[item(1, 30.0), item(2, 10.0)], &RULES);
        assert_eq!(t.subtotal, 50.0);
        assert_eq!(t.shipping, 0.0);
        assert_eq!(t.total, 54.0);
    }

    #[test]
    fn status_flow() {
        use OrderStatus::*;
        assert!(Pending.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Cancelled));
        assert!(Delivered.can_transition_to(Refunded));
        assert!(!Shipped.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Pending));
        assert!(matches!(Pending.transition(Delivered), Err(ModelError::InvalidTransition { .. })));
    }

    #[test]
    fn order_numbers_round_trip() {
        assert_eq!(format_order_number(42), "ORD-000042");
        assert_eq!(parse_order_number("ORD-000042"), Some(42));
        assert_eq!(parse_order_number("X-1"), None);
    }

    #[test]
    fn empty_or_zero_quantity_orders_rejected() {
        let empty = OrderInput { customer_id: Uuid::new_v4(), items: vec![], shipping_address: None, notes: None };
        assert!(empty.validate().is_err());
        let zero = OrderInput {
            customer_id: Uuid::new_v4(),
            items: vec![OrderLineInput { product_id: Uuid::new_v4(), quantity: 0 }],
            shipping_address: None,
            notes: None,
        };
        assert!(zero.validate().is_err());
    }
}
