use axum::{Extension, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::assistant::Assistant;
use crate::cache::{CacheHook, ResponseCache};
use crate::config::Config;
use crate::llm::{ModelPipeline, OpenRouterBackend};
use crate::routes::create_routes;
use crate::search::{DuckDuckGoSearch, WebSearch};
use crate::session::SessionStore;

/// Shared handles given to every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub cache: Arc<ResponseCache>,
    pub sessions: Arc<SessionStore>,
    /// `None` when no model backend could be configured
    pub assistant: Option<Arc<Assistant>>,
}

/// Initialize tracing and logging for the application
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "beacon_svc=info,tower_http=debug,axum::rejection=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Builds the cache, the cached model pipeline and the assistant from config.
///
/// A missing `OPENROUTER_API_KEY` is not fatal: the server still starts and
/// reports itself unhealthy, and `/api/ask` answers 503.
pub fn build_state(config: Config) -> anyhow::Result<AppState> {
    let cache = Arc::new(ResponseCache::new(config.cache));
    info!(
        enabled = config.cache.enabled,
        ttl_seconds = config.cache.ttl_seconds,
        "Response cache ready"
    );
    let sessions = Arc::new(SessionStore::new());

    let assistant = match OpenRouterBackend::from_env() {
        Ok(backend) => {
            let pipeline = ModelPipeline::new(Arc::new(backend))
                .with_hook(Arc::new(CacheHook::new(cache.clone())));
            let search: Option<Arc<dyn WebSearch>> = if config.web_search_enabled {
                Some(Arc::new(DuckDuckGoSearch::new()?))
            } else {
                None
            };
            Some(Arc::new(Assistant::new(
                &config,
                Arc::new(pipeline),
                search,
                sessions.clone(),
            )))
        }
        Err(e) => {
            warn!("Model backend not configured: {}", e);
            None
        }
    };

    Ok(AppState {
        config: Arc::new(config),
        cache,
        sessions,
        assistant,
    })
}

/// Create and configure the Axum application with all routes and middleware
pub async fn create_app(config: Config) -> Result<Router, anyhow::Error> {
    info!("Initializing application router");

    let state = build_state(config)?;

    Ok(Router::new()
        .merge(create_routes())
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()))
}
