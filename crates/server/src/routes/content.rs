use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use models::content::{Post, PostInput, TaskInput, WorkflowTask};
use models::seo::SeoReport;
use service::content::{PostFilter, TransitionRequest};
use service::pagination::{Page, Pagination};
use uuid::Uuid;

use super::AppState;
use crate::errors::{ApiResult, JsonApiError};
use crate::extract::{ApiJson, ApiPath, ApiQuery};

pub async fn list(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<PostFilter>,
    ApiQuery(page): ApiQuery<Pagination>,
) -> Json<Page<Post>> {
    Json(state.services.content.list(&filter, page).await)
}

pub async fn get(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> ApiResult<Json<Post>> {
    Ok(Json(state.services.content.get(id).await?))
}

pub async fn create(State(state): State<AppState>, ApiJson(input): ApiJson<PostInput>) -> ApiResult<(StatusCode, Json<Post>)> {
    Ok((StatusCode::CREATED, Json(state.services.content.create(input).await?)))
}

pub async fn update(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>, ApiJson(input): ApiJson<PostInput>) -> ApiResult<Json<Post>> {
    Ok(Json(state.services.content.update(id, input).await?))
}

pub async fn delete(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> ApiResult<StatusCode> {
    if state.services.content.delete(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(JsonApiError::new(StatusCode::NOT_FOUND, "Not Found", Some("post not found".into())))
    }
}

pub async fn transition(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<TransitionRequest>,
) -> ApiResult<Json<Post>> {
    Ok(Json(state.services.content.transition(id, req).await?))
}

pub async fn seo_report(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> ApiResult<Json<SeoReport>> {
    Ok(Json(state.services.content.seo_report(id).await?))
}

pub async fn list_tasks(State(state): State<AppState>, ApiPath(post_id): ApiPath<Uuid>) -> ApiResult<Json<Vec<WorkflowTask>>> {
    // 404 for an unknown post rather than an empty list
    state.services.content.get(post_id).await?;
    Ok(Json(state.services.content.list_tasks(post_id).await))
}

pub async fn create_task(
    State(state): State<AppState>,
    ApiPath(post_id): ApiPath<Uuid>,
    ApiJson(input): ApiJson<TaskInput>,
) -> ApiResult<(StatusCode, Json<WorkflowTask>)> {
    Ok((StatusCode::CREATED, Json(state.services.content.create_task(post_id, input).await?)))
}

pub async fn complete_task(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> ApiResult<Json<WorkflowTask>> {
    Ok(Json(state.services.content.complete_task(id).await?))
}

pub async fn delete_task(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> ApiResult<StatusCode> {
    if state.services.content.delete_task(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(JsonApiError::new(StatusCode::NOT_FOUND, "Not Found", Some("task not found".into())))
    }
}
