pub mod affiliate;
pub mod analytics;
pub mod campaigns;
pub mod catalog;
pub mod content;
pub mod customers;
pub mod orders;
pub mod seo;

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use common::types::Health;
use service::Services;
use tower_http::{
    cors::CorsLayer,
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;
use uuid::Uuid;

use crate::auth;
use crate::errors::ApiResult;
use crate::extract::ApiPath;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub services: Services,
    /// `None` leaves `/api` open.
    pub admin_key: Option<Arc<str>>,
}

impl AppState {
    pub fn new(services: Services, admin_key: Option<String>) -> Self {
        Self { services, admin_key: admin_key.map(Arc::from) }
    }
}

pub async fn health() -> Json<Health> {
    Json(Health { status: "ok", version: env!("CARGO_PKG_VERSION") })
}

async fn metrics() -> impl IntoResponse {
    common::metrics::encode_metrics()
}

/// Public affiliate redirect: counts the click, then 302s to the tagged URL.
async fn affiliate_redirect(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> ApiResult<impl IntoResponse> {
    let url = state.services.affiliate.record_click(id).await?;
    Ok((StatusCode::FOUND, [(header::LOCATION, url)]))
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(catalog::list).post(catalog::create))
        .route("/products/:id", get(catalog::get).put(catalog::update).delete(catalog::delete))
        .route("/products/:id/stock", post(catalog::adjust_stock))
        .route("/inventory/low-stock", get(catalog::low_stock))
        .route("/orders", get(orders::list).post(orders::create))
        .route("/orders/:id", get(orders::get).delete(orders::delete))
        .route("/orders/:id/status", put(orders::update_status))
        .route("/customers", get(customers::list).post(customers::create))
        .route("/customers/:id", get(customers::get).put(customers::update).delete(customers::delete))
        .route("/segments", get(customers::segments))
        .route("/affiliate-links", get(affiliate::list).post(affiliate::create))
        .route("/affiliate-links/:id", get(affiliate::get).put(affiliate::update).delete(affiliate::delete))
        .route("/affiliate-links/:id/stats", get(affiliate::stats))
        .route("/affiliate-links/:id/conversions", post(affiliate::record_conversion))
        .route("/amazon/search", get(affiliate::search_catalog))
        .route("/amazon/items/:asin", get(affiliate::catalog_item))
        .route("/posts", get(content::list).post(content::create))
        .route("/posts/:id", get(content::get).put(content::update).delete(content::delete))
        .route("/posts/:id/transitions", post(content::transition))
        .route("/posts/:id/seo", get(content::seo_report))
        .route("/posts/:id/tasks", get(content::list_tasks).post(content::create_task))
        .route("/tasks/:id", axum::routing::delete(content::delete_task))
        .route("/tasks/:id/complete", post(content::complete_task))
        .route("/seo/analyze", post(seo::analyze))
        .route("/seo/slugify", post(seo::slugify))
        .route("/campaigns", get(campaigns::list).post(campaigns::create))
        .route("/campaigns/:id", get(campaigns::get).put(campaigns::update).delete(campaigns::delete))
        .route("/campaigns/:id/schedule", post(campaigns::schedule))
        .route("/campaigns/:id/unschedule", post(campaigns::unschedule))
        .route("/campaigns/:id/send", post(campaigns::send_now))
        .route("/campaigns/:id/metrics", get(campaigns::metrics))
        .route("/ab-tests", get(ab_tests::list).post(ab_tests::create))
        .route("/ab-tests/:id", get(ab_tests::get).delete(ab_tests::delete))
        .route("/ab-tests/:id/start", post(ab_tests::start))
        .route("/ab-tests/:id/impressions", post(ab_tests::record_impression))
        .route("/ab-tests/:id/conversions", post(ab_tests::record_conversion))
        .route("/ab-tests/:id/results", get(ab_tests::results))
        .route("/ab-tests/:id/complete", post(ab_tests::complete))
        .route("/ab-tests/:id/assign", get(ab_tests::assign))
        .route("/events", get(analytics::list).post(analytics::track))
        .route("/dashboard", get(analytics::dashboard))
}

/// Build the full application router: public health/metrics/redirects, the
/// key-guarded `/api`, and the dashboard's static files when configured.
pub fn build_router(state: AppState, cors: CorsLayer, static_dir: Option<&str>) -> Router {
    let api = api_routes().route_layer(middleware::from_fn_with_state(state.clone(), auth::require_admin_key));

    let mut app = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/r/:id", get(affiliate_redirect))
        .nest("/api", api)
        .with_state(state);

    if let Some(dir) = static_dir {
        let index = format!("{dir}/index.html");
        app = app.fallback_service(ServeDir::new(dir).fallback(ServeFile::new(index)));
    } else {
        app = app.fallback(|| async { StatusCode::NOT_FOUND });
    }

    app.layer(cors).layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO).include_headers(false))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO).include_headers(false))
            .on_failure(DefaultOnFailure::new().level(Level::ERROR)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use configs::AppConfig;
    use tower::ServiceExt;

    async fn app(admin_key: Option<&str>) -> anyhow::Result<Router> {
        let mut cfg = AppConfig::default();
        cfg.storage.data_dir = std::env::temp_dir().join(format!("shopdesk_routes_{}", Uuid::new_v4())).to_string_lossy().into_owned();
        tokio::fs::create_dir_all(&cfg.storage.data_dir).await?;
        let services = Services::open(&cfg).await?;
        Ok(build_router(AppState::new(services, admin_key.map(str::to_string)), CorsLayer::very_permissive(), None))
    }

    #[tokio::test]
    async fn api_requires_key_but_health_does_not() -> anyhow::Result<()> {
        let app = app(Some("k")).await?;
        let res = app.clone().oneshot(Request::get("/health").body(Body::empty())?).await?;
        assert_eq!(res.status(), StatusCode::OK);

        let res = app.clone().oneshot(Request::get("/api/orders").body(Body::empty())?).await?;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = serde_json::from_slice(&to_bytes(res.into_body(), usize::MAX).await?)?;
        assert_eq!(body["detail"], "missing api key");

        let res = app.oneshot(Request::get("/api/orders").header("X-API-Key", "k").body(Body::empty())?).await?;
        assert_eq!(res.status(), StatusCode::OK);
        Ok(())
    }

    #[tokio::test]
    async fn unknown_paths_fall_back_to_404() -> anyhow::Result<()> {
        let res = app(None).await?.oneshot(Request::get("/nope").body(Body::empty())?).await?;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        Ok(())
    }

    async fn json_body(res: axum::response::Response) -> anyhow::Result<serde_json::Value> {
        Ok(serde_json::from_slice(&to_bytes(res.into_body(), usize::MAX).await?)?)
    }

    #[tokio::test]
    async fn malformed_requests_get_json_400s() -> anyhow::Result<()> {
        let app = app(None).await?;
        let post = |body: &'static str| {
            Request::post("/api/products").header("content-type", "application/json").body(Body::from(body))
        };
        let requests = [
            post(r#"{"name":"x","price":1}"#)?,
            post("{not json")?,
            Request::get("/api/orders?status=bogus").body(Body::empty())?,
            Request::get("/api/products/not-a-uuid").body(Body::empty())?,
        ];
        for req in requests {
            let uri = req.uri().to_string();
            let res = app.clone().oneshot(req).await?;
            assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{uri}");
            let body = json_body(res).await?;
            assert_eq!(body["error"], "Validation Error", "{uri}");
            assert!(body["detail"].as_str().map_or(false, |d| !d.is_empty()), "{uri}");
        }
        Ok(())
    }
}
