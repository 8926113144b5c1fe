use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::errors::JsonApiError;
use crate::routes::AppState;

/// Key sent in the `X-API-Key` header, or the `api_key` query parameter as a fallback.
fn presented_key(req: &Request) -> Option<String> {
    let from_header = req.headers().get("X-API-Key").and_then(|v| v.to_str().ok()).map(str::to_string);
    from_header.or_else(|| {
        req.uri().query().and_then(|q| {
            q.split('&').find_map(|pair| {
                let mut it = pair.splitn(2, '=');
                match (it.next(), it.next()) {
                    (Some("api_key"), Some(v)) => Some(v.to_string()),
                    _ => None,
                }
            })
        })
    })
}

/// Middleware: when an admin key is configured, `/api` requests must present it.
pub async fn require_admin_key(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let Some(expected) = state.admin_key.as_deref() else {
        return next.run(req).await;
    };
    match presented_key(&req) {
        Some(key) if key == expected => next.run(req).await,
        Some(_) => JsonApiError::new(StatusCode::UNAUTHORIZED, "Unauthorized", Some("invalid api key".into())).into_response(),
        None => JsonApiError::new(StatusCode::UNAUTHORIZED, "Unauthorized", Some("missing api key".into())).into_response(),
    }
}
