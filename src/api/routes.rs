//! HTTP route handlers.

use axum::extract::{Path, State};
use axum::middleware;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::api::auth::require_api_key;
use crate::api::types::{
    AnalyzeRequest, AnalyzeResponse, EndSessionResponse, HealthResponse, SessionDetail,
};
use crate::api::{ApiError, AppState};
use crate::callback::CallbackPayload;
use crate::detect::ScamType;
use crate::intel::IntelligenceRecord;

/// Build the service router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/analyze", post(analyze))
        .route(
            "/api/session/{session_id}",
            get(get_session).delete(end_session),
        )
        .route("/api/callback/test", post(test_callback))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Service banner. Unauthenticated.
async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "Honeypot API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
    }))
}

/// Liveness probe. Unauthenticated.
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        model: state.model_name.clone(),
    })
}

/// The turn endpoint: analyze one inbound message and reply in character.
async fn analyze(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let session_id = request.session_id.clone();
    info!(%session_id, "received message");

    let outcome = state
        .engine
        .handle_turn(request.into_turn_request())
        .await
        .map_err(|e| {
            error!(%session_id, error = %e, "turn processing failed");
            ApiError::Internal
        })?;

    Ok(Json(AnalyzeResponse::from(outcome)))
}

/// Inspect a live session.
async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionDetail>, ApiError> {
    let session = state
        .engine
        .inspect(&session_id)
        .await
        .map_err(|e| {
            error!(%session_id, error = %e, "session lookup failed");
            ApiError::Internal
        })?
        .ok_or(ApiError::NotFound)?;

    Ok(Json(SessionDetail::from(session)))
}

/// Terminate a session, issuing the final callback when one is still owed.
async fn end_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<EndSessionResponse>, ApiError> {
    let outcome = state
        .engine
        .terminate(&session_id)
        .await
        .map_err(|e| {
            error!(%session_id, error = %e, "session termination failed");
            ApiError::Internal
        })?
        .ok_or(ApiError::NotFound)?;

    Ok(Json(EndSessionResponse {
        status: "success",
        message: format!("Session {session_id} ended"),
        callback_sent: outcome.callback_sent,
    }))
}

/// Send a probe payload to the scoring endpoint and report the result.
async fn test_callback(State(state): State<AppState>) -> Json<serde_json::Value> {
    let mut intelligence = IntelligenceRecord::default();
    intelligence.bank_accounts.insert("TEST-ACCOUNT".to_string());
    intelligence.upi_ids.insert("test@upi".to_string());
    intelligence.suspicious_keywords.insert("test".to_string());

    let payload = CallbackPayload {
        session_id: "test-session".to_string(),
        scam_detected: true,
        total_messages_exchanged: 1,
        engagement_duration_seconds: 0,
        extracted_intelligence: intelligence,
        agent_notes: "Test callback".to_string(),
        scam_type: ScamType::Unknown,
        confidence_level: 0.95,
    };

    match state.engine.callbacks().dispatch(&payload).await {
        Ok(()) => Json(serde_json::json!({
            "status": "success",
            "message": "Callback test completed",
        })),
        Err(e) => Json(serde_json::json!({
            "status": "error",
            "message": e.to_string(),
        })),
    }
}
