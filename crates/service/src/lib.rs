//! Service layer: persistence, business rules that span records, and the
//! stubbed external providers.
//! - Every collection lives in a `JsonMapStore` under the data directory.
//! - Validation and entity definitions come from the `models` crate.
//! - All fallible operations return `ServiceError`.

pub mod ab_testing;
pub mod affiliate;
pub mod analytics;
pub mod campaigns;
pub mod catalog;
pub mod customers;
pub mod errors;
pub mod orders;
pub mod content;
pub mod pagination;
pub mod runtime;
pub mod scheduler;
pub mod storage;
#[cfg(test)]
pub mod test_support;

pub use errors::ServiceError;
pub use runtime::Services;
