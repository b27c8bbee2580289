use std::sync::Arc;
use std::time::Duration;

use honeypot::api::{self, AppState};
use honeypot::callback::CallbackDispatcher;
use honeypot::config::Config;
use honeypot::detect::ScamClassifier;
use honeypot::engine::Engine;
use honeypot::intel::IntelExtractor;
use honeypot::llm::{LlmConfig, create_provider};
use honeypot::persona::{Archetype, PersonaResponder};
use honeypot::session::{MemoryStore, RedisStore, SessionStore};

/// How often the expiry sweep runs.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = Config::from_env()?;

    eprintln!("🍯 Honeypot API v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", config.model_name);
    eprintln!("   Callback URL: {}", config.callback_url);
    eprintln!("   Listening on: http://0.0.0.0:{}\n", config.port);

    let llm = create_provider(&LlmConfig {
        api_key: config.gemini_api_key.clone(),
        model: config.model_name.clone(),
        timeout: config.llm_timeout,
    })?;

    // ── Session store ───────────────────────────────────────────────────
    let store: Arc<dyn SessionStore> = match &config.redis_url {
        Some(url) => {
            eprintln!("   Sessions: Redis");
            Arc::new(RedisStore::connect(url, config.session_timeout, Archetype::Elderly).await?)
        }
        None => {
            eprintln!("   Sessions: in-memory");
            Arc::new(MemoryStore::new(config.session_timeout, Archetype::Elderly))
        }
    };

    // ── Engine ──────────────────────────────────────────────────────────
    let mut extractor = IntelExtractor::new(config.link_denylist.clone());
    if config.extraction_enrichment {
        extractor = extractor.with_enrichment(Arc::clone(&llm), config.llm_timeout);
    }

    let engine = Arc::new(Engine::new(
        store,
        ScamClassifier::new(Arc::clone(&llm), config.llm_timeout),
        PersonaResponder::new(Arc::clone(&llm), config.llm_timeout, config.agent_temperature),
        extractor,
        Arc::new(CallbackDispatcher::new(
            config.callback_url.clone(),
            config.callback_timeout,
        )?),
    ));

    // Periodic lazy-expiry backstop.
    {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                ticker.tick().await;
                engine.sweep().await;
            }
        });
    }

    // ── HTTP server ─────────────────────────────────────────────────────
    let state = AppState {
        engine,
        api_key: config.api_key.clone(),
        model_name: config.model_name.clone(),
    };
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    tracing::info!(port = config.port, "Honeypot API started");
    axum::serve(listener, app).await?;

    Ok(())
}
