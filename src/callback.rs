//! Outbound reporting to the external scoring endpoint.
//!
//! Dispatch is fire-and-forget: the request path spawns a task and moves
//! on. Failures are logged, never retried synchronously, and never fail the
//! parent turn.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{error, info};

use crate::detect::ScamType;
use crate::error::CallbackError;
use crate::intel::IntelligenceRecord;
use crate::session::Session;

/// Snapshot payload for the scoring endpoint. The scorer reads only the
/// latest callback per session, so re-sending on every turn after detection
/// is safe and intended.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackPayload {
    pub session_id: String,
    pub scam_detected: bool,
    pub total_messages_exchanged: usize,
    pub engagement_duration_seconds: i64,
    pub extracted_intelligence: IntelligenceRecord,
    pub agent_notes: String,
    pub scam_type: ScamType,
    pub confidence_level: f32,
}

impl CallbackPayload {
    /// Snapshot the current session state.
    pub fn from_session(session: &Session) -> Self {
        Self {
            session_id: session.id.clone(),
            scam_detected: session.scam_detected,
            total_messages_exchanged: session.message_count(),
            engagement_duration_seconds: session.duration_seconds(),
            extracted_intelligence: session.intelligence.clone(),
            agent_notes: session.notes.clone(),
            scam_type: session.scam_type,
            confidence_level: session.confidence,
        }
    }
}

/// Reporter for the external scoring endpoint.
pub struct CallbackDispatcher {
    http: reqwest::Client,
    url: String,
}

impl CallbackDispatcher {
    pub fn new(url: String, timeout: Duration) -> Result<Self, CallbackError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CallbackError::RequestFailed(e.to_string()))?;
        Ok(Self { http, url })
    }

    /// POST the payload once, bounded by the client timeout.
    pub async fn dispatch(&self, payload: &CallbackPayload) -> Result<(), CallbackError> {
        let response = self
            .http
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .map_err(|e| CallbackError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            info!(session_id = %payload.session_id, "callback delivered");
            Ok(())
        } else {
            Err(CallbackError::BadStatus(status.as_u16()))
        }
    }

    /// Fire-and-forget dispatch on a detached task.
    pub fn spawn_dispatch(self: &Arc<Self>, payload: CallbackPayload) {
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move {
            let session_id = payload.session_id.clone();
            if let Err(e) = dispatcher.dispatch(&payload).await {
                error!(%session_id, error = %e, "callback dispatch failed");
            }
        });
    }
}
