//! Integration tests for the honeypot HTTP API.
//!
//! Each test spins up the real axum server on a random port with a stub
//! LLM provider and drives it over HTTP. A second throwaway server acts as
//! the callback sink so fire-and-forget dispatch can be observed.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use honeypot::api::{self, AppState};
use honeypot::callback::CallbackDispatcher;
use honeypot::detect::ScamClassifier;
use honeypot::engine::Engine;
use honeypot::error::LlmError;
use honeypot::intel::IntelExtractor;
use honeypot::llm::{LlmProvider, TextRequest};
use honeypot::persona::{Archetype, PersonaResponder};
use honeypot::session::{MemoryStore, SessionStore};

const API_KEY: &str = "test-secret";
const STUB_TIMEOUT: Duration = Duration::from_millis(500);

/// Stub provider with fixed classification output and reply text.
struct ScriptedLlm {
    detection: Value,
    reply: String,
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    fn model_name(&self) -> &str {
        "stub"
    }

    async fn generate_text(&self, _request: TextRequest) -> Result<String, LlmError> {
        Ok(self.reply.clone())
    }

    async fn generate_json(&self, _request: TextRequest) -> Result<Value, LlmError> {
        Ok(self.detection.clone())
    }
}

fn scam_llm() -> Arc<dyn LlmProvider> {
    Arc::new(ScriptedLlm {
        detection: json!({
            "is_scam": true,
            "confidence": 0.92,
            "scam_type": "bank_fraud",
            "indicators": ["urgency", "financial-request"]
        }),
        reply: "Oh no, which account do you mean? Please tell me what to do.".to_string(),
    })
}

fn benign_llm() -> Arc<dyn LlmProvider> {
    Arc::new(ScriptedLlm {
        detection: json!({
            "is_scam": false,
            "confidence": 0.1,
            "scam_type": "not_scam",
            "indicators": []
        }),
        reply: "Hello! Nice to hear from you.".to_string(),
    })
}

/// Capture server for outbound callbacks.
async fn start_callback_sink() -> (String, Arc<Mutex<Vec<Value>>>) {
    let received: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));

    async fn capture(
        State(received): State<Arc<Mutex<Vec<Value>>>>,
        Json(payload): Json<Value>,
    ) -> Json<Value> {
        received.lock().await.push(payload);
        Json(json!({"status": "ok"}))
    }

    let app = Router::new()
        .route("/cb", post(capture))
        .with_state(Arc::clone(&received));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://127.0.0.1:{port}/cb"), received)
}

/// Start the honeypot server. Returns its port and a handle on the store.
async fn start_server(
    llm: Arc<dyn LlmProvider>,
    callback_url: String,
    session_timeout: Duration,
) -> (u16, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new(session_timeout, Archetype::Elderly));

    let engine = Arc::new(Engine::new(
        Arc::clone(&store) as Arc<dyn SessionStore>,
        ScamClassifier::new(Arc::clone(&llm), STUB_TIMEOUT),
        PersonaResponder::new(Arc::clone(&llm), STUB_TIMEOUT, 0.85),
        IntelExtractor::new(vec!["google.com".to_string()]),
        Arc::new(CallbackDispatcher::new(callback_url, STUB_TIMEOUT).unwrap()),
    ));

    let state = AppState {
        engine,
        api_key: SecretString::from(API_KEY),
        model_name: "stub".to_string(),
    };

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, api::router(state)).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    (port, store)
}

fn analyze_body(session_id: &str, text: &str) -> Value {
    json!({
        "sessionId": session_id,
        "message": {
            "sender": "scammer",
            "text": text,
            "timestamp": 1737455730000i64
        },
        "conversationHistory": [],
        "metadata": {"channel": "SMS", "language": "English", "locale": "IN"}
    })
}

const SCAM_TEXT: &str =
    "URGENT: Your SBI account will be blocked today! Verify immediately, call +919876543210";

#[tokio::test]
async fn health_is_unauthenticated() {
    let (sink_url, _) = start_callback_sink().await;
    let (port, _store) = start_server(scam_llm(), sink_url, Duration::from_secs(3600)).await;

    let response = reqwest::get(format!("http://127.0.0.1:{port}/health"))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["model"], "stub");
}

#[tokio::test]
async fn missing_api_key_creates_no_session() {
    let (sink_url, _) = start_callback_sink().await;
    let (port, store) = start_server(scam_llm(), sink_url, Duration::from_secs(3600)).await;

    let response = reqwest::Client::new()
        .post(format!("http://127.0.0.1:{port}/api/analyze"))
        .json(&analyze_body("S-auth", SCAM_TEXT))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 401);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "error");
    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn wrong_api_key_is_forbidden() {
    let (sink_url, _) = start_callback_sink().await;
    let (port, store) = start_server(scam_llm(), sink_url, Duration::from_secs(3600)).await;

    let response = reqwest::Client::new()
        .post(format!("http://127.0.0.1:{port}/api/analyze"))
        .header("x-api-key", "not-the-key")
        .json(&analyze_body("S-auth", SCAM_TEXT))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 403);
    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn malformed_request_is_rejected() {
    let (sink_url, _) = start_callback_sink().await;
    let (port, store) = start_server(scam_llm(), sink_url, Duration::from_secs(3600)).await;

    let response = reqwest::Client::new()
        .post(format!("http://127.0.0.1:{port}/api/analyze"))
        .header("x-api-key", API_KEY)
        .json(&json!({"sessionId": "S-invalid"}))
        .send()
        .await
        .unwrap();

    assert!(response.status().is_client_error());
    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn analyze_scam_message_end_to_end() {
    let (sink_url, received) = start_callback_sink().await;
    let (port, _store) = start_server(scam_llm(), sink_url, Duration::from_secs(3600)).await;

    let response = reqwest::Client::new()
        .post(format!("http://127.0.0.1:{port}/api/analyze"))
        .header("x-api-key", API_KEY)
        .json(&analyze_body("S-e2e", SCAM_TEXT))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "success");
    assert_eq!(body["scamDetected"], true);
    assert!(!body["reply"].as_str().unwrap().is_empty());
    assert_eq!(body["scamType"], "bank_fraud");
    assert_eq!(body["totalMessagesExchanged"], 2);
    assert!(body["engagementDurationSeconds"].as_i64().unwrap() >= 0);

    // The message carried a phone number, so at least that category is
    // populated.
    let phones = body["extractedIntelligence"]["phoneNumbers"]
        .as_array()
        .unwrap();
    assert!(phones.contains(&json!("+919876543210")));
    assert!(body["agentNotes"].is_string());

    // The callback is fire-and-forget; give the spawned dispatch a moment.
    tokio::time::sleep(Duration::from_millis(200)).await;
    let callbacks = received.lock().await;
    assert!(!callbacks.is_empty());
    assert_eq!(callbacks[0]["sessionId"], "S-e2e");
    assert_eq!(callbacks[0]["scamDetected"], true);
}

#[tokio::test]
async fn benign_message_has_no_notes_or_callback() {
    let (sink_url, received) = start_callback_sink().await;
    let (port, _store) = start_server(benign_llm(), sink_url, Duration::from_secs(3600)).await;

    let response = reqwest::Client::new()
        .post(format!("http://127.0.0.1:{port}/api/analyze"))
        .header("x-api-key", API_KEY)
        .json(&analyze_body("S-benign", "Hi, are we still on for lunch tomorrow?"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["scamDetected"], false);
    assert!(body.get("agentNotes").is_none());

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(received.lock().await.is_empty());
}

#[tokio::test]
async fn session_inspection_and_termination() {
    let (sink_url, _received) = start_callback_sink().await;
    let (port, _store) = start_server(scam_llm(), sink_url, Duration::from_secs(3600)).await;
    let client = reqwest::Client::new();

    client
        .post(format!("http://127.0.0.1:{port}/api/analyze"))
        .header("x-api-key", API_KEY)
        .json(&analyze_body("S-life", SCAM_TEXT))
        .send()
        .await
        .unwrap();

    // Inspect.
    let response = client
        .get(format!("http://127.0.0.1:{port}/api/session/S-life"))
        .header("x-api-key", API_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["sessionId"], "S-life");
    assert_eq!(body["messageCount"], 2);
    assert_eq!(body["scamDetected"], true);
    assert_eq!(body["callbackSent"], true);

    // Terminate.
    let response = client
        .delete(format!("http://127.0.0.1:{port}/api/session/S-life"))
        .header("x-api-key", API_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "success");

    // Gone now.
    let response = client
        .get(format!("http://127.0.0.1:{port}/api/session/S-life"))
        .header("x-api-key", API_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    let response = client
        .delete(format!("http://127.0.0.1:{port}/api/session/S-life"))
        .header("x-api-key", API_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn unknown_session_is_not_found() {
    let (sink_url, _) = start_callback_sink().await;
    let (port, _store) = start_server(scam_llm(), sink_url, Duration::from_secs(3600)).await;

    let response = reqwest::Client::new()
        .get(format!("http://127.0.0.1:{port}/api/session/nope"))
        .header("x-api-key", API_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn idle_session_expires_and_id_is_reusable() {
    let (sink_url, _) = start_callback_sink().await;
    let (port, store) = start_server(scam_llm(), sink_url, Duration::from_millis(100)).await;
    let client = reqwest::Client::new();

    client
        .post(format!("http://127.0.0.1:{port}/api/analyze"))
        .header("x-api-key", API_KEY)
        .json(&analyze_body("S-idle", SCAM_TEXT))
        .send()
        .await
        .unwrap();
    assert_eq!(store.count().await.unwrap(), 1);

    tokio::time::sleep(Duration::from_millis(200)).await;

    // The expired session reads as absent, and the same id starts fresh
    // without an error.
    let response = client
        .get(format!("http://127.0.0.1:{port}/api/session/S-idle"))
        .header("x-api-key", API_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    let response = client
        .post(format!("http://127.0.0.1:{port}/api/analyze"))
        .header("x-api-key", API_KEY)
        .json(&analyze_body("S-idle", SCAM_TEXT))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["totalMessagesExchanged"], 2);
}
