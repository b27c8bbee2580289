//! Provider trait — the seam between the orchestration core and any LLM.
//!
//! Two capabilities: free text (persona replies) and structured JSON
//! (classification, extraction enrichment). Everything above this trait is
//! testable with a stub implementation.

use async_trait::async_trait;

use crate::error::LlmError;

/// A single text-generation request.
#[derive(Debug, Clone)]
pub struct TextRequest {
    /// User prompt.
    pub prompt: String,
    /// Optional system instruction.
    pub system: Option<String>,
    /// Sampling temperature.
    pub temperature: f32,
    /// Response length cap.
    pub max_tokens: u32,
}

impl TextRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
            temperature: 0.7,
            max_tokens: 1024,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Backend-agnostic LLM provider.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Model identifier, for logs and the health endpoint.
    fn model_name(&self) -> &str;

    /// Generate free-form text.
    async fn generate_text(&self, request: TextRequest) -> Result<String, LlmError>;

    /// Generate a JSON value. The prompt must ask for JSON output; the
    /// implementation strips markdown fences before parsing.
    async fn generate_json(&self, request: TextRequest) -> Result<serde_json::Value, LlmError>;
}

/// Strip a wrapping markdown code fence from a model response.
///
/// Models routinely wrap JSON in ```json ... ``` despite instructions not to.
pub(crate) fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let inner = if let Some(rest) = trimmed.strip_prefix("```json") {
        rest
    } else if let Some(rest) = trimmed.strip_prefix("```") {
        rest
    } else {
        return trimmed;
    };
    inner.strip_suffix("```").unwrap_or(inner).trim()
}
