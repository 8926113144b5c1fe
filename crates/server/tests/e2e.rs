use std::net::SocketAddr;

use configs::AppConfig;
use reqwest::StatusCode as HttpStatusCode;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use uuid::Uuid;

const ADMIN_KEY: &str = "test-admin-key";

struct TestApp {
    base_url: String,
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn test_config(admin_key: Option<&str>) -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.storage.data_dir = format!("target/test-data/{}", Uuid::new_v4());
    cfg.admin.api_key = admin_key.map(str::to_string);
    cfg.email.seed = Some(7);
    cfg.scheduler.enabled = false;
    cfg
}

async fn start_server(cfg: AppConfig) -> anyhow::Result<TestApp> {
    let (app, _services) = server::startup::build_app(&cfg).await?;
    let listener = TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0)).await?;
    let addr: SocketAddr = listener.local_addr()?;
    let base_url = format!("http://{}:{}", addr.ip(), addr.port());

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            eprintln!("server error: {}", e);
        }
    });

    Ok(TestApp { base_url })
}

fn client() -> reqwest::Client {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert("X-API-Key", reqwest::header::HeaderValue::from_static(ADMIN_KEY));
    reqwest::Client::builder()
        .default_headers(headers)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("reqwest client")
}

async fn post_json(app: &TestApp, path: &str, body: Value) -> anyhow::Result<(HttpStatusCode, Value)> {
    let res = client().post(app.url(path)).json(&body).send().await?;
    let status = res.status();
    Ok((status, res.json().await?))
}

#[tokio::test]
async fn e2e_public_health_and_metrics() -> anyhow::Result<()> {
    let app = start_server(test_config(Some(ADMIN_KEY))).await?;

    let res = reqwest::get(app.url("/health")).await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());

    let res = reqwest::get(app.url("/metrics")).await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn e2e_admin_key_guards_api() -> anyhow::Result<()> {
    let app = start_server(test_config(Some(ADMIN_KEY))).await?;

    let res = reqwest::get(app.url("/api/products")).await?;
    assert_eq!(res.status(), HttpStatusCode::UNAUTHORIZED);
    let body: Value = res.json().await?;
    assert_eq!(body["error"], "Unauthorized");

    let res = reqwest::Client::new().get(app.url("/api/products")).header("X-API-Key", "wrong").send().await?;
    assert_eq!(res.status(), HttpStatusCode::UNAUTHORIZED);

    let res = reqwest::get(app.url(&format!("/api/products?api_key={ADMIN_KEY}"))).await?;
    assert_eq!(res.status(), HttpStatusCode::OK);

    let res = client().get(app.url("/api/products")).send().await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["total"], 0);
    Ok(())
}

#[tokio::test]
async fn e2e_open_api_without_key() -> anyhow::Result<()> {
    let app = start_server(test_config(None)).await?;
    let res = reqwest::get(app.url("/api/segments")).await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["vip"], 0);
    Ok(())
}

#[tokio::test]
async fn e2e_order_flow_reserves_stock_and_updates_customer() -> anyhow::Result<()> {
    let app = start_server(test_config(Some(ADMIN_KEY))).await?;

    let (status, product) =
        post_json(&app, "/api/products", json!({"sku": "MUG-1", "name": "Mug", "price": 12.5, "stock": 5})).await?;
    assert_eq!(status, HttpStatusCode::CREATED);
    let product_id = product["id"].as_str().unwrap().to_string();

    let (status, customer) =
        post_json(&app, "/api/customers", json!({"name": "Ana", "email": "ana@example.com"})).await?;
    assert_eq!(status, HttpStatusCode::CREATED);
    assert_eq!(customer["segment"], "new");
    let customer_id = customer["id"].as_str().unwrap().to_string();

    let (status, dup) = post_json(&app, "/api/customers", json!({"name": "Ana 2", "email": "ANA@example.com"})).await?;
    assert_eq!(status, HttpStatusCode::CONFLICT);
    assert_eq!(dup["error"], "Conflict");

    let order_body = json!({
        "customer_id": customer_id,
        "items": [{"product_id": product_id, "quantity": 2}]
    });
    let (status, order) = post_json(&app, "/api/orders", order_body).await?;
    assert_eq!(status, HttpStatusCode::CREATED);
    assert_eq!(order["order_number"], "ORD-000001");
    assert_eq!(order["status"], "pending");
    assert_eq!(order["subtotal"], 25.0);

    let product: Value = client().get(app.url(&format!("/api/products/{product_id}"))).send().await?.json().await?;
    assert_eq!(product["stock"], 3);

    let customer: Value = client().get(app.url(&format!("/api/customers/{customer_id}"))).send().await?.json().await?;
    assert_eq!(customer["order_count"], 1);

    // more than is left
    let (status, body) = post_json(
        &app,
        "/api/orders",
        json!({"customer_id": customer_id, "items": [{"product_id": product_id, "quantity": 9}]}),
    )
    .await?;
    assert_eq!(status, HttpStatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap_or_default().contains("insufficient stock"));

    let order_id = order["id"].as_str().unwrap();
    let res = client()
        .put(app.url(&format!("/api/orders/{order_id}/status")))
        .json(&json!({"status": "delivered"}))
        .send()
        .await?;
    assert_eq!(res.status(), HttpStatusCode::CONFLICT);

    let res = client()
        .put(app.url(&format!("/api/orders/{order_id}/status")))
        .json(&json!({"status": "cancelled"}))
        .send()
        .await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    let product: Value = client().get(app.url(&format!("/api/products/{product_id}"))).send().await?.json().await?;
    assert_eq!(product["stock"], 5);
    Ok(())
}

#[tokio::test]
async fn e2e_errors_use_json_body() -> anyhow::Result<()> {
    let app = start_server(test_config(Some(ADMIN_KEY))).await?;

    let res = client().get(app.url(&format!("/api/orders/{}", Uuid::new_v4()))).send().await?;
    assert_eq!(res.status(), HttpStatusCode::NOT_FOUND);
    let body: Value = res.json().await?;
    assert_eq!(body["error"], "Not Found");
    assert!(body["detail"].is_string());

    let (status, body) = post_json(&app, "/api/products", json!({"sku": "", "name": "Nope", "price": -1.0})).await?;
    assert_eq!(status, HttpStatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Validation Error");
    Ok(())
}

#[tokio::test]
async fn e2e_affiliate_redirect_counts_click() -> anyhow::Result<()> {
    let app = start_server(test_config(Some(ADMIN_KEY))).await?;

    let (status, link) = post_json(
        &app,
        "/api/affiliate-links",
        json!({"name": "Desk lamp", "destination_url": "https://www.amazon.com/dp/B000000001", "tracking_tag": "shop-20"}),
    )
    .await?;
    assert_eq!(status, HttpStatusCode::CREATED);
    let id = link["id"].as_str().unwrap();

    // public route, no key needed
    let res = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()?
        .get(app.url(&format!("/r/{id}")))
        .send()
        .await?;
    assert_eq!(res.status(), HttpStatusCode::FOUND);
    let location = res.headers().get("location").and_then(|v| v.to_str().ok()).unwrap_or_default().to_string();
    assert_eq!(location, "https://www.amazon.com/dp/B000000001?tag=shop-20");

    let stats: Value = client().get(app.url(&format!("/api/affiliate-links/{id}/stats"))).send().await?.json().await?;
    assert_eq!(stats["clicks"], 1);

    let res = client().get(app.url(&format!("/r/{}", Uuid::new_v4()))).send().await?;
    assert_eq!(res.status(), HttpStatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn e2e_seo_analyze_and_slugify() -> anyhow::Result<()> {
    let app = start_server(test_config(Some(ADMIN_KEY))).await?;

    let (status, report) = post_json(
        &app,
        "/api/seo/analyze",
        json!({"title": "Best Coffee Mugs for Winter", "body": "Coffee mugs keep drinks warm.", "focus_keyword": "coffee mugs"}),
    )
    .await?;
    assert_eq!(status, HttpStatusCode::OK);
    assert!(report["score"].as_u64().is_some());
    assert_eq!(report["suggested_slug"], "best-coffee-mugs-for-winter");
    assert!(report["checks"].as_array().map_or(false, |c| !c.is_empty()));

    let (status, body) = post_json(&app, "/api/seo/slugify", json!({"text": "Hello, World!"})).await?;
    assert_eq!(status, HttpStatusCode::OK);
    assert_eq!(body["slug"], "hello-world");
    Ok(())
}

#[tokio::test]
async fn e2e_campaign_send_reports_metrics() -> anyhow::Result<()> {
    let app = start_server(test_config(Some(ADMIN_KEY))).await?;

    for (name, email) in [("A", "a@example.com"), ("B", "b@example.com")] {
        let (status, _) = post_json(&app, "/api/customers", json!({"name": name, "email": email})).await?;
        assert_eq!(status, HttpStatusCode::CREATED);
    }
    let (status, campaign) = post_json(
        &app,
        "/api/campaigns",
        json!({"name": "Launch", "subject": "New mugs", "from_name": "Shop", "html_body": "<p>hi</p>"}),
    )
    .await?;
    assert_eq!(status, HttpStatusCode::CREATED);
    assert_eq!(campaign["status"], "draft");
    let id = campaign["id"].as_str().unwrap();

    let (status, sent) = post_json(&app, &format!("/api/campaigns/{id}/send"), json!({})).await?;
    assert_eq!(status, HttpStatusCode::OK);
    assert_eq!(sent["status"], "sent");
    assert_eq!(sent["stats"]["recipients"], 2);

    let metrics: Value = client().get(app.url(&format!("/api/campaigns/{id}/metrics"))).send().await?.json().await?;
    assert!(metrics["open_rate"].is_number());

    // sent campaigns are frozen
    let res = client().delete(app.url(&format!("/api/campaigns/{id}"))).send().await?;
    assert_eq!(res.status(), HttpStatusCode::CONFLICT);
    Ok(())
}
