use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use models::analytics::{AnalyticsEvent, DashboardSummary, EventInput};
use serde::Deserialize;
use service::analytics::EventFilter;
use service::pagination::{Page, Pagination};

use super::AppState;
use crate::errors::ApiResult;
use crate::extract::{ApiJson, ApiQuery};

#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    #[serde(default = "default_days")]
    pub days: u32,
}

fn default_days() -> u32 {
    30
}

pub async fn list(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<EventFilter>,
    ApiQuery(page): ApiQuery<Pagination>,
) -> Json<Page<AnalyticsEvent>> {
    Json(state.services.analytics.list(&filter, page).await)
}

pub async fn track(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<EventInput>,
) -> ApiResult<(StatusCode, Json<AnalyticsEvent>)> {
    Ok((StatusCode::CREATED, Json(state.services.analytics.track(input).await?)))
}

pub async fn dashboard(State(state): State<AppState>, ApiQuery(q): ApiQuery<DashboardQuery>) -> Json<DashboardSummary> {
    Json(state.services.analytics.dashboard(q.days).await)
}
