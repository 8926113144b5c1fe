use once_cell::sync::Lazy;
use prometheus::{register_int_counter, register_int_counter_vec, Encoder, IntCounter, IntCounterVec, TextEncoder};

// Prometheus metrics (default registry)
pub static ORDERS_CREATED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("shopdesk_orders_created_total", "Total orders created")
        .expect("register orders_created_total")
});

pub static EMAILS_SENT_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "shopdesk_emails_sent_total",
        "Total campaign emails handed to a provider"
    )
    .expect("register emails_sent_total")
});

pub static AFFILIATE_CLICKS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "shopdesk_affiliate_clicks_total",
        "Total affiliate link redirects"
    )
    .expect("register affiliate_clicks_total")
});

pub static CONTENT_PUBLISHED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "shopdesk_content_published_total",
        "Total posts moved to published"
    )
    .expect("register content_published_total")
});

pub static EVENTS_TRACKED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "shopdesk_events_tracked_total",
        "Analytics events tracked, by kind",
        &["kind"]
    )
    .expect("register events_tracked_total")
});

pub fn encode_metrics() -> (axum::http::StatusCode, String) {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            format!("metrics encode error: {e}"),
        );
    }
    (
        axum::http::StatusCode::OK,
        String::from_utf8(buffer).unwrap_or_default(),
    )
}
