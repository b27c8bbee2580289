//! HTTP interface — thin plumbing over the engine.

mod auth;
mod routes;
pub mod types;

pub use routes::router;

use std::sync::Arc;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use secrecy::SecretString;

use crate::api::types::ErrorBody;
use crate::engine::Engine;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub api_key: SecretString,
    pub model_name: String,
}

/// Client-visible request failures.
#[derive(Debug)]
pub enum ApiError {
    Unauthorized(String),
    Forbidden(String),
    NotFound,
    /// Internal detail is logged at the failure site, never sent to the
    /// client.
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Unauthorized(message) => (StatusCode::UNAUTHORIZED, message),
            Self::Forbidden(message) => (StatusCode::FORBIDDEN, message),
            Self::NotFound => (StatusCode::NOT_FOUND, "Session not found".to_string()),
            Self::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error processing message".to_string(),
            ),
        };

        (
            status,
            Json(ErrorBody {
                status: "error",
                message,
            }),
        )
            .into_response()
    }
}
