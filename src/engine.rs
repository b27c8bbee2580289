//! Turn orchestration — the per-session state machine.
//!
//! One inbound message drives one pass: load/create the session, classify
//! (only until scam is confirmed), generate the reply and extract
//! intelligence concurrently, merge, regenerate notes, report, persist.
//! Failures in the classify/engage/extract stages are absorbed by their
//! fallbacks; a turn always produces a reply.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::callback::{CallbackDispatcher, CallbackPayload};
use crate::detect::{ScamClassifier, ScamType};
use crate::error::Result;
use crate::intel::{IntelExtractor, IntelligenceRecord};
use crate::persona::PersonaResponder;
use crate::session::{Sender, Session, SessionLocks, SessionStore};

/// Notes are capped; anything longer is cut with an ellipsis.
const NOTES_MAX_CHARS: usize = 400;

/// One inbound message for one session.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub session_id: String,
    pub sender: Sender,
    pub text: String,
    pub timestamp: Option<DateTime<Utc>>,
    /// Prior transcript supplied by the platform; only consulted when the
    /// session does not exist yet.
    pub history: Vec<TurnSeed>,
}

/// A historical message used to seed a newly created session.
#[derive(Debug, Clone)]
pub struct TurnSeed {
    pub sender: Sender,
    pub text: String,
    pub timestamp: Option<DateTime<Utc>>,
}

/// What a completed turn reports back to the caller.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub reply: String,
    pub scam_detected: bool,
    pub scam_type: ScamType,
    pub confidence: f32,
    pub intelligence: IntelligenceRecord,
    pub notes: String,
    pub message_count: usize,
    pub duration_seconds: i64,
}

/// Outcome of an explicit session termination.
#[derive(Debug, Clone)]
pub struct TerminationOutcome {
    pub callback_sent: bool,
}

/// The orchestrator. Owns the only path that mutates sessions.
pub struct Engine {
    store: Arc<dyn SessionStore>,
    locks: SessionLocks,
    classifier: ScamClassifier,
    responder: PersonaResponder,
    extractor: IntelExtractor,
    callbacks: Arc<CallbackDispatcher>,
}

impl Engine {
    pub fn new(
        store: Arc<dyn SessionStore>,
        classifier: ScamClassifier,
        responder: PersonaResponder,
        extractor: IntelExtractor,
        callbacks: Arc<CallbackDispatcher>,
    ) -> Self {
        Self {
            store,
            locks: SessionLocks::new(),
            classifier,
            responder,
            extractor,
            callbacks,
        }
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn callbacks(&self) -> &Arc<CallbackDispatcher> {
        &self.callbacks
    }

    /// Process one inbound message. The whole Load→Persist cycle runs under
    /// the session's lock so concurrent requests for one id serialize.
    pub async fn handle_turn(&self, request: TurnRequest) -> Result<TurnOutcome> {
        let turn_id = Uuid::new_v4();
        let _guard = self.locks.acquire(&request.session_id).await;

        let (mut session, created) = self.store.get_or_create(&request.session_id).await?;

        if created {
            for seed in &request.history {
                session.push_turn(seed.sender, seed.text.clone(), seed.timestamp);
            }
        }
        session.push_turn(request.sender, request.text.clone(), request.timestamp);

        // Classification is a paid call and the flag is sticky, so a
        // confirmed session never pays for it again.
        if !session.scam_detected {
            let analysis = self
                .classifier
                .classify(&request.text, &session.transcript())
                .await;
            session.apply_classification(analysis.is_scam, analysis.scam_type, analysis.confidence);
            info!(
                session_id = %session.id,
                %turn_id,
                scam_detected = session.scam_detected,
                confidence = session.confidence,
                scam_type = %session.scam_type,
                "classification complete"
            );
        } else {
            debug!(session_id = %session.id, %turn_id, "scam already confirmed, skipping classification");
        }

        // Reply generation and extraction are independent; run them
        // together. Both absorb their own failures.
        let prior_turns = &session.turns[..session.turns.len().saturating_sub(1)];
        let combined_text = session.combined_text();
        let (reply, extracted) = tokio::join!(
            self.responder
                .respond(&request.text, prior_turns, session.persona_key, &session.id),
            self.extractor.extract(&combined_text),
        );

        session.push_turn(Sender::Agent, reply.clone(), None);
        session.intelligence.merge(extracted);

        if session.scam_detected {
            session.notes = build_notes(session.scam_type, &session.intelligence);
            // The scorer keeps only the latest callback per session, so
            // every post-detection turn re-sends the full snapshot.
            self.callbacks
                .spawn_dispatch(CallbackPayload::from_session(&session));
            session.callback_sent = true;
        }

        let outcome = TurnOutcome {
            reply,
            scam_detected: session.scam_detected,
            scam_type: session.scam_type,
            confidence: session.confidence,
            intelligence: session.intelligence.clone(),
            notes: session.notes.clone(),
            message_count: session.message_count(),
            duration_seconds: session.duration_seconds(),
        };

        self.store.update(session).await?;

        info!(
            session_id = %request.session_id,
            %turn_id,
            messages = outcome.message_count,
            "turn complete"
        );
        Ok(outcome)
    }

    /// Look up a session without mutating it.
    pub async fn inspect(&self, id: &str) -> Result<Option<Session>> {
        Ok(self.store.get(id).await?)
    }

    /// End a session: issue the final callback if one is still owed, then
    /// delete. Returns `None` for an unknown id.
    pub async fn terminate(&self, id: &str) -> Result<Option<TerminationOutcome>> {
        let _guard = self.locks.acquire(id).await;

        let Some(mut session) = self.store.get(id).await? else {
            return Ok(None);
        };

        if session.scam_detected && !session.callback_sent {
            self.callbacks
                .spawn_dispatch(CallbackPayload::from_session(&session));
            session.callback_sent = true;
        }

        let callback_sent = session.callback_sent;
        self.store.delete(id).await?;
        info!(session_id = id, callback_sent, "session terminated");

        Ok(Some(TerminationOutcome { callback_sent }))
    }

    /// Drop expired sessions and idle locks. Driven by the periodic sweep
    /// task in `main`.
    pub async fn sweep(&self) {
        match self.store.sweep_expired().await {
            Ok(dropped) if dropped > 0 => info!(dropped, "expired sessions swept"),
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "session sweep failed"),
        }
        self.locks.prune().await;
    }
}

/// Deterministic notes: scam-type label, tactic labels inferred from which
/// categories are populated, and the intelligence summary.
fn build_notes(scam_type: ScamType, record: &IntelligenceRecord) -> String {
    let mut tactics = Vec::new();
    if record.suspicious_keywords.contains("urgent")
        || record.suspicious_keywords.contains("immediately")
    {
        tactics.push("urgency tactics");
    }
    if !record.bank_accounts.is_empty() {
        tactics.push("account harvesting");
    }
    if !record.upi_ids.is_empty() {
        tactics.push("payment redirection");
    }
    if !record.phishing_links.is_empty() {
        tactics.push("phishing links");
    }
    if !record.phone_numbers.is_empty() {
        tactics.push("callback numbers");
    }
    if tactics.is_empty() {
        tactics.push("social engineering");
    }

    let notes = format!(
        "{} using {}. Intelligence gathered: {}.",
        scam_type.label(),
        tactics.join(", "),
        record.summary()
    );
    truncate_chars(&notes, NOTES_MAX_CHARS)
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let cut: String = s.chars().take(max.saturating_sub(3)).collect();
    format!("{cut}...")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::error::LlmError;
    use crate::llm::{LlmProvider, TextRequest};
    use crate::persona::Archetype;
    use crate::session::MemoryStore;

    /// Stub provider: every call fails, pushing each component onto its
    /// deterministic fallback path. Counts structured calls so tests can
    /// assert the classification skip.
    struct FailingLlm {
        json_calls: AtomicUsize,
    }

    impl FailingLlm {
        fn new() -> Self {
            Self {
                json_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for FailingLlm {
        fn model_name(&self) -> &str {
            "stub-down"
        }

        async fn generate_text(&self, _request: TextRequest) -> std::result::Result<String, LlmError> {
            Err(LlmError::RequestFailed {
                provider: "stub".to_string(),
                reason: "offline".to_string(),
            })
        }

        async fn generate_json(
            &self,
            _request: TextRequest,
        ) -> std::result::Result<serde_json::Value, LlmError> {
            self.json_calls.fetch_add(1, Ordering::SeqCst);
            Err(LlmError::RequestFailed {
                provider: "stub".to_string(),
                reason: "offline".to_string(),
            })
        }
    }

    fn engine_with(llm: Arc<FailingLlm>) -> (Engine, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new(
            Duration::from_secs(3600),
            Archetype::Elderly,
        ));
        let provider: Arc<dyn LlmProvider> = llm;
        let timeout = Duration::from_millis(200);
        let engine = Engine::new(
            Arc::clone(&store) as Arc<dyn SessionStore>,
            ScamClassifier::new(Arc::clone(&provider), timeout),
            PersonaResponder::new(Arc::clone(&provider), timeout, 0.85),
            IntelExtractor::new(vec!["google.com".to_string()]),
            // Closed port: background dispatches fail and are logged only.
            Arc::new(CallbackDispatcher::new("http://127.0.0.1:9/cb".to_string(), timeout).unwrap()),
        );
        (engine, store)
    }

    fn scam_request(session_id: &str, text: &str) -> TurnRequest {
        TurnRequest {
            session_id: session_id.to_string(),
            sender: Sender::Scammer,
            text: text.to_string(),
            timestamp: None,
            history: Vec::new(),
        }
    }

    #[tokio::test]
    async fn full_turn_under_total_model_outage() {
        let llm = Arc::new(FailingLlm::new());
        let (engine, _store) = engine_with(Arc::clone(&llm));

        let outcome = engine
            .handle_turn(scam_request(
                "S1",
                "URGENT: your bank account is blocked, verify with OTP, call 9876543210",
            ))
            .await
            .unwrap();

        // Keyword fallback confirms the scam and the canned reply engages.
        assert!(outcome.scam_detected);
        assert!(!outcome.reply.is_empty());
        assert!(outcome.intelligence.phone_numbers.contains("+919876543210"));
        assert!(!outcome.notes.is_empty());
        assert_eq!(outcome.message_count, 2);
        assert!(outcome.duration_seconds >= 0);
    }

    #[tokio::test]
    async fn classification_skipped_once_confirmed() {
        let llm = Arc::new(FailingLlm::new());
        let (engine, _store) = engine_with(Arc::clone(&llm));

        engine
            .handle_turn(scam_request("S1", "verify your bank account with OTP now"))
            .await
            .unwrap();
        assert_eq!(llm.json_calls.load(Ordering::SeqCst), 1);

        let outcome = engine
            .handle_turn(scam_request("S1", "hello again"))
            .await
            .unwrap();

        // Still flagged, no second classifier call.
        assert!(outcome.scam_detected);
        assert_eq!(llm.json_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn intelligence_accumulates_across_turns() {
        let llm = Arc::new(FailingLlm::new());
        let (engine, _store) = engine_with(llm);

        engine
            .handle_turn(scam_request("S1", "send money to scammer@ybl"))
            .await
            .unwrap();
        let outcome = engine
            .handle_turn(scam_request("S1", "or transfer to account 123456789012"))
            .await
            .unwrap();

        assert!(outcome.intelligence.upi_ids.contains("scammer@ybl"));
        assert!(outcome.intelligence.bank_accounts.contains("123456789012"));
    }

    #[tokio::test]
    async fn history_seeds_only_new_sessions() {
        let llm = Arc::new(FailingLlm::new());
        let (engine, store) = engine_with(llm);

        let mut request = scam_request("S1", "now verify your bank account");
        request.history = vec![TurnSeed {
            sender: Sender::Scammer,
            text: "hello, this is your bank".to_string(),
            timestamp: None,
        }];
        engine.handle_turn(request.clone()).await.unwrap();

        // 1 seeded + 1 inbound + 1 reply.
        let session = store.get("S1").await.unwrap().unwrap();
        assert_eq!(session.message_count(), 3);

        // Re-sending history on an existing session must not duplicate it.
        engine.handle_turn(request).await.unwrap();
        let session = store.get("S1").await.unwrap().unwrap();
        assert_eq!(session.message_count(), 5);
    }

    #[tokio::test]
    async fn terminate_unknown_session_is_none() {
        let llm = Arc::new(FailingLlm::new());
        let (engine, _store) = engine_with(llm);
        assert!(engine.terminate("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn terminate_marks_callback_and_deletes() {
        let llm = Arc::new(FailingLlm::new());
        let (engine, store) = engine_with(llm);

        engine
            .handle_turn(scam_request("S1", "verify your bank account with OTP"))
            .await
            .unwrap();
        let outcome = engine.terminate("S1").await.unwrap().unwrap();
        assert!(outcome.callback_sent);
        assert!(store.get("S1").await.unwrap().is_none());
    }

    #[test]
    fn notes_name_type_and_tactics() {
        let mut record = IntelligenceRecord::default();
        record.upi_ids.insert("scammer@ybl".to_string());
        record.suspicious_keywords.insert("urgent".to_string());

        let notes = build_notes(ScamType::UpiFraud, &record);
        assert!(notes.starts_with("UPI fraud"));
        assert!(notes.contains("urgency tactics"));
        assert!(notes.contains("payment redirection"));
        assert!(notes.contains("1 UPI id"));
    }

    #[test]
    fn notes_default_to_social_engineering() {
        let notes = build_notes(ScamType::Unknown, &IntelligenceRecord::default());
        assert!(notes.contains("social engineering"));
    }

    #[test]
    fn overlong_notes_get_ellipsis() {
        let long = "x".repeat(NOTES_MAX_CHARS + 100);
        let cut = truncate_chars(&long, NOTES_MAX_CHARS);
        assert_eq!(cut.chars().count(), NOTES_MAX_CHARS);
        assert!(cut.ends_with("..."));
    }
}
