//! LLM integration.
//!
//! All model access goes through the [`LlmProvider`] trait so the
//! orchestration core never touches a concrete client. The only production
//! backend is Gemini; tests supply stubs.

mod gemini;
pub mod provider;

pub use gemini::GeminiProvider;
pub use provider::{LlmProvider, TextRequest};

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::LlmError;

/// Configuration for creating an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: SecretString,
    pub model: String,
    pub timeout: Duration,
}

/// Create the production provider from configuration.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    let provider = GeminiProvider::new(
        config.api_key.clone(),
        config.model.clone(),
        config.timeout,
    )?;
    tracing::info!(model = %config.model, "Using Gemini");
    Ok(Arc::new(provider))
}
