use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::Response;

use crate::app_state::AppState;

/// Applied to every route except `/health` and `/metrics`. A missing header
/// is 401 (not authenticated); a present-but-wrong token is 403 (forbidden),
/// matching the distinction the API surface promises callers.
pub async fn require_bearer_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if !state.is_auth_required() {
        return Ok(next.run(request).await);
    }
    let Some(expected) = state.api_key() else {
        return Ok(next.run(request).await);
    };

    let token = extract_bearer_token(&request).ok_or(StatusCode::UNAUTHORIZED)?;
    if token != expected {
        return Err(StatusCode::FORBIDDEN);
    }
    Ok(next.run(request).await)
}

fn extract_bearer_token(request: &Request) -> Option<String> {
    let value = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())?;
    value.strip_prefix("Bearer ").map(|s| s.to_string())
}
