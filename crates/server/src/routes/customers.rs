use std::collections::BTreeMap;

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use models::customer::{CustomerInput, CustomerView, Segment};
use service::customers::CustomerFilter;
use service::pagination::{Page, Pagination};
use uuid::Uuid;

use super::AppState;
use crate::errors::{ApiResult, JsonApiError};
use crate::extract::{ApiJson, ApiPath, ApiQuery};

pub async fn list(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<CustomerFilter>,
    ApiQuery(page): ApiQuery<Pagination>,
) -> Json<Page<CustomerView>> {
    Json(state.services.customers.list(&filter, page).await)
}

pub async fn get(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> ApiResult<Json<CustomerView>> {
    Ok(Json(state.services.customers.get(id).await?))
}

pub async fn create(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<CustomerInput>,
) -> ApiResult<(StatusCode, Json<CustomerView>)> {
    Ok((StatusCode::CREATED, Json(state.services.customers.create(input).await?)))
}

pub async fn update(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(input): ApiJson<CustomerInput>,
) -> ApiResult<Json<CustomerView>> {
    Ok(Json(state.services.customers.update(id, input).await?))
}

pub async fn delete(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> ApiResult<StatusCode> {
    if state.services.customers.delete(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(JsonApiError::new(StatusCode::NOT_FOUND, "Not Found", Some("customer not found".into())))
    }
}

pub async fn segments(State(state): State<AppState>) -> Json<BTreeMap<Segment, u64>> {
    Json(state.services.customers.segment_summary().await)
}
