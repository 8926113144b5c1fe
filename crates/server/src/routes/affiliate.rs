use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use models::affiliate::{AffiliateLinkInput, AffiliateLinkView, LinkStats};
use serde::Deserialize;
use service::affiliate::amazon::CatalogItem;
use service::pagination::{Page, Pagination};
use uuid::Uuid;

use super::AppState;
use crate::errors::{ApiResult, JsonApiError};
use crate::extract::{ApiJson, ApiPath, ApiQuery};

#[derive(Debug, Deserialize)]
pub struct ConversionBody {
    pub amount: f64,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub keywords: String,
}

pub async fn list(State(state): State<AppState>, ApiQuery(page): ApiQuery<Pagination>) -> Json<Page<AffiliateLinkView>> {
    Json(state.services.affiliate.list(page).await)
}

pub async fn get(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> ApiResult<Json<AffiliateLinkView>> {
    Ok(Json(state.services.affiliate.get(id).await?))
}

pub async fn create(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<AffiliateLinkInput>,
) -> ApiResult<(StatusCode, Json<AffiliateLinkView>)> {
    Ok((StatusCode::CREATED, Json(state.services.affiliate.create(input).await?)))
}

pub async fn update(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(input): ApiJson<AffiliateLinkInput>,
) -> ApiResult<Json<AffiliateLinkView>> {
    Ok(Json(state.services.affiliate.update(id, input).await?))
}

pub async fn delete(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> ApiResult<StatusCode> {
    if state.services.affiliate.delete(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(JsonApiError::new(StatusCode::NOT_FOUND, "Not Found", Some("affiliate link not found".into())))
    }
}

pub async fn stats(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> ApiResult<Json<LinkStats>> {
    Ok(Json(state.services.affiliate.stats(id).await?))
}

pub async fn record_conversion(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<ConversionBody>,
) -> ApiResult<Json<LinkStats>> {
    Ok(Json(state.services.affiliate.record_conversion(id, body.amount).await?))
}

pub async fn search_catalog(State(state): State<AppState>, ApiQuery(q): ApiQuery<SearchQuery>) -> ApiResult<Json<Vec<CatalogItem>>> {
    if q.keywords.trim().is_empty() {
        return Err(JsonApiError::bad_request("keywords is required"));
    }
    Ok(Json(state.services.affiliate.search_catalog(&q.keywords).await?))
}

pub async fn catalog_item(State(state): State<AppState>, ApiPath(asin): ApiPath<String>) -> ApiResult<Json<CatalogItem>> {
    Ok(Json(state.services.affiliate.catalog_item(&asin).await?))
}
