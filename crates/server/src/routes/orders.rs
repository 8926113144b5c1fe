use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use models::order::{Order, OrderInput, OrderStatus};
use serde::Deserialize;
use service::orders::OrderFilter;
use service::pagination::{Page, Pagination};
use uuid::Uuid;

use super::AppState;
use crate::errors::{ApiResult, JsonApiError};
use crate::extract::{ApiJson, ApiPath, ApiQuery};

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: OrderStatus,
}

pub async fn list(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<OrderFilter>,
    ApiQuery(page): ApiQuery<Pagination>,
) -> Json<Page<Order>> {
    Json(state.services.orders.list(&filter, page).await)
}

pub async fn get(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> ApiResult<Json<Order>> {
    Ok(Json(state.services.orders.get(id).await?))
}

pub async fn create(State(state): State<AppState>, ApiJson(input): ApiJson<OrderInput>) -> ApiResult<(StatusCode, Json<Order>)> {
    Ok((StatusCode::CREATED, Json(state.services.orders.create(input).await?)))
}

pub async fn update_status(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<StatusUpdate>,
) -> ApiResult<Json<Order>> {
    Ok(Json(state.services.orders.update_status(id, body.status).await?))
}

pub async fn delete(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> ApiResult<StatusCode> {
    if state.services.orders.delete(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(JsonApiError::new(StatusCode::NOT_FOUND, "Not Found", Some("order not found".into())))
    }
}
