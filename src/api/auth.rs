//! Shared-secret authentication middleware.

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use secrecy::ExposeSecret;
use tracing::warn;

use crate::api::{ApiError, AppState};

/// Paths served without the shared secret.
const EXEMPT_PATHS: &[&str] = &["/", "/health"];

/// Require a matching `x-api-key` header on every non-exempt path.
///
/// Missing key → 401, wrong key → 403. Runs before any handler, so a
/// rejected request never touches a session.
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let path = request.uri().path();
    if EXEMPT_PATHS.contains(&path) {
        return Ok(next.run(request).await);
    }

    let Some(provided) = request
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
    else {
        warn!(path, "missing API key");
        return Err(ApiError::Unauthorized(
            "Missing API key. Include 'x-api-key' header.".to_string(),
        ));
    };

    if provided != state.api_key.expose_secret() {
        warn!(path, "invalid API key");
        return Err(ApiError::Forbidden("Invalid API key.".to_string()));
    }

    Ok(next.run(request).await)
}
