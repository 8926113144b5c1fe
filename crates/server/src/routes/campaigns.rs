use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use models::campaign::{CampaignInput, CampaignMetrics, EmailCampaign};
use serde::Deserialize;
use service::campaigns::CampaignFilter;
use service::pagination::{Page, Pagination};
use uuid::Uuid;

use super::AppState;
use crate::errors::{ApiResult, JsonApiError};
use crate::extract::{ApiJson, ApiPath, ApiQuery};

#[derive(Debug, Deserialize)]
pub struct ScheduleBody {
    pub at: DateTime<Utc>,
}

pub async fn list(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<CampaignFilter>,
    ApiQuery(page): ApiQuery<Pagination>,
) -> Json<Page<EmailCampaign>> {
    Json(state.services.campaigns.list(&filter, page).await)
}

pub async fn get(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> ApiResult<Json<EmailCampaign>> {
    Ok(Json(state.services.campaigns.get(id).await?))
}

pub async fn create(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<CampaignInput>,
) -> ApiResult<(StatusCode, Json<EmailCampaign>)> {
    Ok((StatusCode::CREATED, Json(state.services.campaigns.create(input).await?)))
}

pub async fn update(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(input): ApiJson<CampaignInput>,
) -> ApiResult<Json<EmailCampaign>> {
    Ok(Json(state.services.campaigns.update(id, input).await?))
}

pub async fn delete(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> ApiResult<StatusCode> {
    if state.services.campaigns.delete(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(JsonApiError::new(StatusCode::NOT_FOUND, "Not Found", Some("campaign not found".into())))
    }
}

pub async fn schedule(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<ScheduleBody>,
) -> ApiResult<Json<EmailCampaign>> {
    Ok(Json(state.services.campaigns.schedule(id, body.at).await?))
}

pub async fn unschedule(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> ApiResult<Json<EmailCampaign>> {
    Ok(Json(state.services.campaigns.unschedule(id).await?))
}

/// Delivery failures come back as a `failed` campaign, not an error status.
pub async fn send_now(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> ApiResult<Json<EmailCampaign>> {
    Ok(Json(state.services.campaigns.send_now(id).await?))
}

pub async fn metrics(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> ApiResult<Json<CampaignMetrics>> {
    Ok(Json(state.services.campaigns.metrics(id).await?))
}
