use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};

use crate::http::request::request_id;
use crate::http::response::ApiError;
use crate::http::server::AppState;

pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let api_key = &state.config.admin.api_key;
    if api_key.is_empty() {
        return Ok(next.run(request).await);
    }

    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    if let Some(auth_val) = auth_header {
        if auth_val == format!("Bearer {}", api_key) {
            return Ok(next.run(request).await);
        }
    }

    tracing::warn!(
        request_id = %request_id(request.headers()),
        path = %request.uri().path(),
        "Rejected request without a valid API key"
    );
    Err(ApiError::unauthorized())
}
