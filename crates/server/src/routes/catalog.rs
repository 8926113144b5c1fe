use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use models::product::{Product, ProductInput};
use serde::Deserialize;
use service::catalog::ProductFilter;
use service::pagination::{Page, Pagination};
use uuid::Uuid;

use super::AppState;
use crate::errors::{ApiResult, JsonApiError};
use crate::extract::{ApiJson, ApiPath, ApiQuery};

#[derive(Debug, Deserialize)]
pub struct StockAdjustment {
    pub delta: i64,
}

#[derive(Debug, Deserialize)]
pub struct LowStockQuery {
    #[serde(default)]
    pub threshold: Option<u32>,
}

pub async fn list(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<ProductFilter>,
    ApiQuery(page): ApiQuery<Pagination>,
) -> Json<Page<Product>> {
    Json(state.services.catalog.list(&filter, page).await)
}

pub async fn get(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> ApiResult<Json<Product>> {
    Ok(Json(state.services.catalog.get(id).await?))
}

pub async fn create(State(state): State<AppState>, ApiJson(input): ApiJson<ProductInput>) -> ApiResult<(StatusCode, Json<Product>)> {
    Ok((StatusCode::CREATED, Json(state.services.catalog.create(input).await?)))
}

pub async fn update(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(input): ApiJson<ProductInput>,
) -> ApiResult<Json<Product>> {
    Ok(Json(state.services.catalog.update(id, input).await?))
}

pub async fn delete(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> ApiResult<StatusCode> {
    if state.services.catalog.delete(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(JsonApiError::new(StatusCode::NOT_FOUND, "Not Found", Some("product not found".into())))
    }
}

pub async fn adjust_stock(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<StockAdjustment>,
) -> ApiResult<Json<Product>> {
    Ok(Json(state.services.catalog.adjust_stock(id, body.delta).await?))
}

/// Defaults to the configured shop threshold.
pub async fn low_stock(State(state): State<AppState>, ApiQuery(q): ApiQuery<LowStockQuery>) -> Json<Vec<Product>> {
    let threshold = q.threshold.unwrap_or(state.services.low_stock_threshold);
    Json(state.services.catalog.low_stock(threshold).await)
}
