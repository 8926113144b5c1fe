#![cfg(test)]
use std::path::PathBuf;

use models::customer::CustomerInput;
use models::product::{ProductInput, ProductStatus};

/// Fresh data directory for one test.
pub fn temp_dir() -> PathBuf {
    std::env::temp_dir().join(format!("shopdesk_test_{}", uuid::Uuid::new_v4()))
}

pub fn product_input(sku: &str, price: f64, stock: u32) -> ProductInput {
    ProductInput {
        sku: sku.into(),
        name: format!("Product {sku}"),
        description: String::new(),
        price,
        compare_at_price: None,
        category: Some("apparel".into()),
        tags: vec![],
        stock,
        status: ProductStatus::Active,
        image_urls: vec![],
    }
}

pub fn customer_input(name: &str, email: &str) -> CustomerInput {
    CustomerInput { name: name.into(), email: email.into(), phone: None, tags: vec![] }
}
