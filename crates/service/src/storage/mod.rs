//! Storage abstractions for the service layer
//!
//! Every collection is a JSON file holding the whole map, rewritten in full
//! on each mutation.

pub mod json_map_store;

pub use json_map_store::JsonMapStore;

/// Fixed file names, one per collection.
pub mod keys {
    pub const PRODUCTS: &str = "products.json";
    pub const ORDERS: &str = "orders.json";
    pub const CUSTOMERS: &str = "customers.json";
    pub const AFFILIATE_LINKS: &str = "affiliate_links.json";
    pub const POSTS: &str = "posts.json";
    pub const WORKFLOW_TASKS: &str = "workflow_tasks.json";
    pub const CAMPAIGNS: &str = "campaigns.json";
    pub const AB_TESTS: &str = "ab_tests.json";
    pub const ANALYTICS_EVENTS: &str = "analytics_events.json";

    pub const ALL: [&str; 9] =
        [PRODUCTS, ORDERS, CUSTOMERS, AFFILIATE_LINKS, POSTS, WORKFLOW_TASKS, CAMPAIGNS, AB_TESTS, ANALYTICS_EVENTS];
}
