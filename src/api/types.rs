//! Wire types for the HTTP interface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::detect::ScamType;
use crate::engine::{TurnOutcome, TurnRequest, TurnSeed};
use crate::intel::IntelligenceRecord;
use crate::session::{Sender, Session};

// ── Requests ────────────────────────────────────────────────────────────

/// One inbound message timestamp: epoch milliseconds or ISO-8601.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
    Millis(i64),
    Instant(DateTime<Utc>),
}

impl Timestamp {
    pub fn to_utc(self) -> Option<DateTime<Utc>> {
        match self {
            Self::Millis(ms) => DateTime::<Utc>::from_timestamp_millis(ms),
            Self::Instant(dt) => Some(dt),
        }
    }
}

/// A single message in the conversation.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageBody {
    pub sender: MessageSender,
    pub text: String,
    #[serde(default)]
    pub timestamp: Option<Timestamp>,
}

/// Wire sender labels. The platform historically used "user" for the
/// honeypot's own side.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageSender {
    Scammer,
    #[serde(alias = "user")]
    Agent,
}

impl From<MessageSender> for Sender {
    fn from(value: MessageSender) -> Self {
        match value {
            MessageSender::Scammer => Sender::Scammer,
            MessageSender::Agent => Sender::Agent,
        }
    }
}

/// Advisory conversation metadata; not used by the core logic.
#[derive(Debug, Clone, Default, Deserialize)]
#[allow(dead_code)]
pub struct Metadata {
    pub channel: Option<String>,
    pub language: Option<String>,
    pub locale: Option<String>,
}

/// The analyze request — one conversational turn.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    pub session_id: String,
    pub message: MessageBody,
    #[serde(default)]
    pub conversation_history: Vec<MessageBody>,
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

impl AnalyzeRequest {
    pub fn into_turn_request(self) -> TurnRequest {
        TurnRequest {
            session_id: self.session_id,
            sender: self.message.sender.into(),
            text: self.message.text,
            timestamp: self.message.timestamp.and_then(Timestamp::to_utc),
            history: self
                .conversation_history
                .into_iter()
                .map(|m| TurnSeed {
                    sender: m.sender.into(),
                    text: m.text,
                    timestamp: m.timestamp.and_then(Timestamp::to_utc),
                })
                .collect(),
        }
    }
}

// ── Responses ───────────────────────────────────────────────────────────

/// Engagement statistics, kept as a nested alias for older consumers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementMetrics {
    pub engagement_duration_seconds: i64,
    pub total_messages_exchanged: usize,
}

/// Response to the analyze endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResponse {
    pub status: &'static str,
    pub reply: String,
    /// Compatibility alias for `reply`.
    pub agent_response: String,
    pub scam_detected: bool,
    pub extracted_intelligence: IntelligenceRecord,
    pub total_messages_exchanged: usize,
    pub engagement_duration_seconds: i64,
    pub engagement_metrics: EngagementMetrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_notes: Option<String>,
    pub scam_type: ScamType,
    pub confidence_level: f32,
}

impl From<TurnOutcome> for AnalyzeResponse {
    fn from(outcome: TurnOutcome) -> Self {
        Self {
            status: "success",
            reply: outcome.reply.clone(),
            agent_response: outcome.reply,
            scam_detected: outcome.scam_detected,
            extracted_intelligence: outcome.intelligence,
            total_messages_exchanged: outcome.message_count,
            engagement_duration_seconds: outcome.duration_seconds,
            engagement_metrics: EngagementMetrics {
                engagement_duration_seconds: outcome.duration_seconds,
                total_messages_exchanged: outcome.message_count,
            },
            agent_notes: if outcome.scam_detected {
                Some(outcome.notes)
            } else {
                None
            },
            scam_type: outcome.scam_type,
            confidence_level: outcome.confidence,
        }
    }
}

/// Session inspection payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDetail {
    pub session_id: String,
    pub message_count: usize,
    pub duration_seconds: i64,
    pub scam_detected: bool,
    pub scam_type: ScamType,
    pub callback_sent: bool,
    pub intelligence: IntelligenceRecord,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Session> for SessionDetail {
    fn from(session: Session) -> Self {
        Self {
            session_id: session.id.clone(),
            message_count: session.message_count(),
            duration_seconds: session.duration_seconds(),
            scam_detected: session.scam_detected,
            scam_type: session.scam_type,
            callback_sent: session.callback_sent,
            intelligence: session.intelligence,
            created_at: session.created_at,
            updated_at: session.last_active_at,
        }
    }
}

/// Session termination acknowledgment.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndSessionResponse {
    pub status: &'static str,
    pub message: String,
    pub callback_sent: bool,
}

/// Health probe payload.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub model: String,
}

/// Structured error body.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub status: &'static str,
    pub message: String,
}
