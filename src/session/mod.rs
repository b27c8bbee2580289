//! Conversation sessions — the central mutable aggregate.

mod locks;
mod memory;
mod redis_store;
mod store;

pub use locks::SessionLocks;
pub use memory::MemoryStore;
pub use redis_store::RedisStore;
pub use store::SessionStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::detect::ScamType;
use crate::intel::IntelligenceRecord;
use crate::persona::{Archetype, PersonaKey};

/// Who authored a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    Scammer,
    Agent,
}

/// One message in a session's transcript. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub sender: Sender,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Durable state of one ongoing conversation.
///
/// Monotonic invariants: `scam_detected` only ever flips false→true,
/// `intelligence` only grows by merge, and `turns` is append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub turns: Vec<ConversationTurn>,
    pub scam_detected: bool,
    pub scam_type: ScamType,
    pub confidence: f32,
    pub intelligence: IntelligenceRecord,
    pub notes: String,
    pub callback_sent: bool,
    pub persona_key: PersonaKey,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    /// Write-generation counter, used by the Redis store's compare-and-swap.
    pub version: u64,
}

impl Session {
    /// Create a fresh session. The persona is fixed here for the session's
    /// whole lifetime.
    pub fn new(id: impl Into<String>, archetype: Archetype) -> Self {
        let id = id.into();
        let now = Utc::now();
        Self {
            persona_key: PersonaKey::for_session(&id, archetype),
            id,
            turns: Vec::new(),
            scam_detected: false,
            scam_type: ScamType::Unknown,
            confidence: 0.0,
            intelligence: IntelligenceRecord::default(),
            notes: String::new(),
            callback_sent: false,
            created_at: now,
            last_active_at: now,
            version: 0,
        }
    }

    /// Append a turn and refresh the activity timestamp.
    pub fn push_turn(&mut self, sender: Sender, text: impl Into<String>, timestamp: Option<DateTime<Utc>>) {
        self.turns.push(ConversationTurn {
            sender,
            text: text.into(),
            timestamp: timestamp.unwrap_or_else(Utc::now),
        });
        self.last_active_at = Utc::now();
    }

    /// Record a classification result. The scam flag is sticky: once true it
    /// can never be unset, and type/confidence freeze with it.
    pub fn apply_classification(&mut self, is_scam: bool, scam_type: ScamType, confidence: f32) {
        if !self.scam_detected {
            self.scam_type = scam_type;
            self.confidence = confidence.clamp(0.0, 1.0);
            self.scam_detected = is_scam;
        }
    }

    pub fn message_count(&self) -> usize {
        self.turns.len()
    }

    /// Engagement duration in seconds; never negative.
    pub fn duration_seconds(&self) -> i64 {
        (self.last_active_at - self.created_at).num_seconds().max(0)
    }

    /// Whether the session has been idle past `timeout`.
    pub fn is_expired(&self, timeout: std::time::Duration) -> bool {
        let idle = Utc::now() - self.last_active_at;
        idle.num_milliseconds() > timeout.as_millis() as i64
    }

    /// Full transcript as `SENDER: text` lines for classifier context.
    pub fn transcript(&self) -> String {
        self.turns
            .iter()
            .map(|t| {
                let who = match t.sender {
                    Sender::Scammer => "SCAMMER",
                    Sender::Agent => "USER",
                };
                format!("{who}: {}", t.text)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// All turn texts joined for the extractor.
    pub fn combined_text(&self) -> String {
        self.turns
            .iter()
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
