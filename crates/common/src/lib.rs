//! Shared building blocks for the shopdesk crates: logging setup, runtime
//! directory checks, Prometheus metrics and small wire types.

pub mod env;
pub mod metrics;
pub mod types;
pub mod utils;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_type_ok() {
        let h = types::Health { status: "ok", version: "0.1.0" };
        assert_eq!(h.status, "ok");
    }
}
