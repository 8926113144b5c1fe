//! Stateless SEO helpers for drafts that are not stored yet.

use axum::Json;
use models::seo::{self, SeoInput, SeoReport};
use serde::{Deserialize, Serialize};

use crate::errors::{ApiResult, JsonApiError};
use crate::extract::ApiJson;

#[derive(Debug, Deserialize)]
pub struct SlugRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct SlugResponse {
    pub slug: String,
}

pub async fn analyze(ApiJson(input): ApiJson<SeoInput>) -> Json<SeoReport> {
    Json(seo::analyze(&input))
}

pub async fn slugify(ApiJson(req): ApiJson<SlugRequest>) -> ApiResult<Json<SlugResponse>> {
    let slug = seo::slugify(&req.text);
    if slug.is_empty() {
        return Err(JsonApiError::bad_request("text has no sluggable characters"));
    }
    Ok(Json(SlugResponse { slug }))
}
